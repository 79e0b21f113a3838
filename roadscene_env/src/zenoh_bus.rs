//! Zenoh-backed message bus for live runs.

use crate::bus::MessageBus;
use crate::error::EnvError;
use crate::types::{ClientId, Message};
use async_trait::async_trait;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;

/// Message bus connected to a Zenoh router (or peer mesh).
///
/// Each `subscribe` spawns a pump task that forwards samples into a single
/// inbox, so `recv()` sees all subscribed topics in arrival order.
pub struct ZenohBus {
    session: zenoh::Session,
    client_id: ClientId,
    inbox_tx: mpsc::Sender<Message>,
    inbox_rx: tokio::sync::Mutex<mpsc::Receiver<Message>>,
}

impl ZenohBus {
    /// Opens a session. With no endpoint, Zenoh's default discovery is used.
    pub async fn connect(endpoint: Option<&str>) -> Result<Self, EnvError> {
        let mut config = zenoh::Config::default();
        if let Some(endpoint) = endpoint {
            config
                .insert_json5("connect/endpoints", &format!("[\"{}\"]", endpoint))
                .map_err(|e| EnvError::Connect(e.to_string()))?;
        }
        
        let session = zenoh::open(config)
            .await
            .map_err(|e| EnvError::Connect(e.to_string()))?;
        
        let (inbox_tx, inbox_rx) = mpsc::channel(1000);
        let client_id = ClientId::new();
        tracing::info!(client = %client_id, endpoint = ?endpoint, "connected to zenoh");
        
        Ok(Self {
            session,
            client_id,
            inbox_tx,
            inbox_rx: tokio::sync::Mutex::new(inbox_rx),
        })
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[async_trait]
impl MessageBus for ZenohBus {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), EnvError> {
        self.session
            .put(topic.to_string(), payload)
            .await
            .map_err(|e| EnvError::publish(topic, e))
    }
    
    async fn subscribe(&self, topic: &str) -> Result<(), EnvError> {
        let subscriber = self
            .session
            .declare_subscriber(topic.to_string())
            .await
            .map_err(|e| EnvError::subscribe(topic, e))?;
        
        let tx = self.inbox_tx.clone();
        let topic = topic.to_string();
        tokio::spawn(async move {
            while let Ok(sample) = subscriber.recv_async().await {
                let payload = sample.payload().to_bytes().into_owned();
                let message = Message::new(sample.key_expr().as_str(), payload, now_ms());
                if tx.send(message).await.is_err() {
                    break;
                }
            }
            tracing::debug!(topic = %topic, "subscriber pump finished");
        });
        
        Ok(())
    }
    
    async fn recv(&self) -> Option<Message> {
        let mut rx = self.inbox_rx.lock().await;
        rx.recv().await
    }
    
    fn client_id(&self) -> ClientId {
        self.client_id
    }
}
