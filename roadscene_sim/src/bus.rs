//! In-process message broker with fault injection.

use async_trait::async_trait;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use roadscene_env::{BusController, ClientId, EnvError, Message, MessageBus};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Delivery counters of a broker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BrokerStats {
    pub published: u64,
    pub delivered: u64,
    pub dropped: u64,
}

/// Per-topic fault settings.
#[derive(Debug, Default)]
struct Faults {
    blocked: HashSet<String>,
    loss: HashMap<String, f64>,
}

/// Routes messages between [`LoopbackBus`] clients of one process.
///
/// Delivery is synchronous and in publish order per topic. Loss decisions
/// come from a seeded RNG so faulty runs repeat exactly.
pub struct LoopbackBroker {
    /// Topic -> (subscriber, inbox)
    subscribers: Mutex<HashMap<String, Vec<(ClientId, mpsc::UnboundedSender<Message>)>>>,
    
    faults: Mutex<Faults>,
    
    rng: Mutex<ChaCha8Rng>,
    
    closed: AtomicBool,
    
    published: AtomicU64,
    delivered: AtomicU64,
    dropped: AtomicU64,
}

impl LoopbackBroker {
    /// Creates a broker whose loss decisions derive from `seed`.
    pub fn new(seed: u64) -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
            faults: Mutex::new(Faults::default()),
            rng: Mutex::new(ChaCha8Rng::seed_from_u64(seed)),
            closed: AtomicBool::new(false),
            published: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }
    
    pub fn shared(seed: u64) -> Arc<Self> {
        Arc::new(Self::new(seed))
    }
    
    /// Creates a client attached to this broker.
    pub fn client(self: &Arc<Self>, client_id: ClientId) -> LoopbackBus {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        LoopbackBus {
            client_id,
            broker: Arc::clone(self),
            inbox_tx,
            inbox_rx: tokio::sync::Mutex::new(inbox_rx),
        }
    }
    
    /// Rejects every later publish, as if the router went away.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        lock(&self.subscribers).clear();
    }
    
    pub fn stats(&self) -> BrokerStats {
        BrokerStats {
            published: self.published.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
    
    fn add_subscriber(&self, topic: &str, client: ClientId, inbox: mpsc::UnboundedSender<Message>) -> Result<(), EnvError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(EnvError::subscribe(topic, "broker closed"));
        }
        let mut subscribers = lock(&self.subscribers);
        let entry = subscribers.entry(topic.to_string()).or_default();
        if !entry.iter().any(|(id, _)| *id == client) {
            entry.push((client, inbox));
        }
        Ok(())
    }
    
    /// Whether a message on `topic` is lost in transit.
    fn drops(&self, topic: &str) -> bool {
        let faults = lock(&self.faults);
        if faults.blocked.contains(topic) {
            return true;
        }
        match faults.loss.get(topic) {
            Some(&rate) if rate > 0.0 => lock(&self.rng).gen::<f64>() < rate,
            _ => false,
        }
    }
    
    fn route(&self, topic: &str, payload: Vec<u8>) -> Result<usize, EnvError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(EnvError::publish(topic, "broker closed"));
        }
        self.published.fetch_add(1, Ordering::Relaxed);
        
        if self.drops(topic) {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(topic, "message dropped by fault injection");
            return Ok(0);
        }
        
        let received_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        
        let mut subscribers = lock(&self.subscribers);
        let Some(inboxes) = subscribers.get_mut(topic) else {
            return Ok(0);
        };
        // Clients that went away are pruned on the way
        inboxes.retain(|(_, inbox)| inbox.send(Message::new(topic, payload.clone(), received_ms)).is_ok());
        self.delivered.fetch_add(inboxes.len() as u64, Ordering::Relaxed);
        Ok(inboxes.len())
    }
}

impl BusController for LoopbackBroker {
    fn block_topic(&self, topic: &str) {
        lock(&self.faults).blocked.insert(topic.to_string());
    }
    
    fn heal_all(&self) {
        let mut faults = lock(&self.faults);
        faults.blocked.clear();
        faults.loss.clear();
    }
    
    fn set_topic_loss(&self, topic: &str, loss_rate: f64) {
        lock(&self.faults)
            .loss
            .insert(topic.to_string(), loss_rate.clamp(0.0, 1.0));
    }
}

/// A client of a [`LoopbackBroker`].
pub struct LoopbackBus {
    client_id: ClientId,
    broker: Arc<LoopbackBroker>,
    inbox_tx: mpsc::UnboundedSender<Message>,
    inbox_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Message>>,
}

impl LoopbackBus {
    /// Takes a waiting message without blocking.
    pub fn try_recv(&self) -> Option<Message> {
        let mut rx = self.inbox_rx.try_lock().ok()?;
        rx.try_recv().ok()
    }
    
    /// Drains every waiting message.
    pub fn drain(&self) -> Vec<Message> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
    
    pub fn broker(&self) -> &Arc<LoopbackBroker> {
        &self.broker
    }
}

#[async_trait]
impl MessageBus for LoopbackBus {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), EnvError> {
        self.broker.route(topic, payload).map(|_| ())
    }
    
    async fn subscribe(&self, topic: &str) -> Result<(), EnvError> {
        self.broker
            .add_subscriber(topic, self.client_id, self.inbox_tx.clone())
    }
    
    async fn recv(&self) -> Option<Message> {
        let mut rx = self.inbox_rx.lock().await;
        rx.recv().await
    }
    
    fn client_id(&self) -> ClientId {
        self.client_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    
    fn pair(broker: &Arc<LoopbackBroker>) -> (LoopbackBus, LoopbackBus) {
        (
            broker.client(ClientId::from_seed(1)),
            broker.client(ClientId::from_seed(2)),
        )
    }
    
    #[tokio::test]
    async fn test_delivery_in_publish_order() {
        let broker = LoopbackBroker::shared(7);
        let (scene, consumer) = pair(&broker);
        consumer.subscribe("scene/positions").await.unwrap();
        
        for i in 0..5u8 {
            scene.publish("scene/positions", vec![i]).await.unwrap();
        }
        scene.publish("scene/other", vec![99]).await.unwrap();
        
        let payloads: Vec<u8> = consumer.drain().into_iter().map(|m| m.payload[0]).collect();
        assert_eq!(payloads, vec![0, 1, 2, 3, 4]);
        assert_eq!(broker.stats().delivered, 5);
    }
    
    #[tokio::test]
    async fn test_recv_awaits_message() {
        let broker = LoopbackBroker::shared(7);
        let (scene, consumer) = pair(&broker);
        consumer.subscribe("scene/detections").await.unwrap();
        scene.publish("scene/detections", b"{}".to_vec()).await.unwrap();
        
        let message = consumer.recv().await.unwrap();
        assert_eq!(message.topic, "scene/detections");
        assert_eq!(message.size(), 2);
    }
    
    #[tokio::test]
    async fn test_blocked_topic_drops_until_healed() {
        let broker = LoopbackBroker::shared(7);
        let (scene, consumer) = pair(&broker);
        consumer.subscribe("scene/screenshot").await.unwrap();
        
        broker.block_topic("scene/screenshot");
        scene.publish("scene/screenshot", vec![1]).await.unwrap();
        assert!(consumer.try_recv().is_none());
        
        broker.heal_all();
        scene.publish("scene/screenshot", vec![2]).await.unwrap();
        assert_eq!(consumer.try_recv().unwrap().payload, vec![2]);
        assert_eq!(broker.stats().dropped, 1);
    }
    
    #[tokio::test]
    async fn test_loss_is_deterministic_per_seed() {
        async fn survivors(seed: u64) -> Vec<u8> {
            let broker = LoopbackBroker::shared(seed);
            let (scene, consumer) = pair(&broker);
            consumer.subscribe("t").await.unwrap();
            broker.set_topic_loss("t", 0.5);
            for i in 0..64u8 {
                scene.publish("t", vec![i]).await.unwrap();
            }
            consumer.drain().into_iter().map(|m| m.payload[0]).collect()
        }
        
        let a = survivors(3).await;
        assert_eq!(a, survivors(3).await);
        assert!(!a.is_empty() && a.len() < 64);
    }
    
    #[tokio::test]
    async fn test_closed_broker_rejects_publish() {
        let broker = LoopbackBroker::shared(7);
        let (scene, _consumer) = pair(&broker);
        broker.close();
        
        let err = scene.publish("scene/positions", vec![]).await.unwrap_err();
        assert!(matches!(err, EnvError::Publish { .. }));
    }
    
    proptest::proptest! {
        #[test]
        fn prop_every_publish_is_delivered_or_dropped(seed in 0u64..1000, rate in 0.0f64..=1.0, count in 1usize..200) {
            let broker = LoopbackBroker::shared(seed);
            let (_scene, consumer) = pair(&broker);
            broker
                .add_subscriber("t", consumer.client_id, consumer.inbox_tx.clone())
                .unwrap();
            broker.set_topic_loss("t", rate);
            
            for i in 0..count {
                broker.route("t", vec![i as u8]).unwrap();
            }
            
            let stats = broker.stats();
            proptest::prop_assert_eq!(stats.published, count as u64);
            proptest::prop_assert_eq!(stats.delivered + stats.dropped, count as u64);
            proptest::prop_assert_eq!(consumer.drain().len() as u64, stats.delivered);
        }
    }
}
