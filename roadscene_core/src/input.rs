//! User input events and the start form.

use crate::config::TravelBounds;
use crate::error::{Result, SceneError};
use crate::scenario::ScenarioId;
use crate::scenery::MapStyle;
use serde::{Deserialize, Serialize};

/// Keys the scene reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Key {
    Space,
    Char(char),
}

impl Key {
    fn parse(token: &str) -> Result<Self> {
        let token = token.trim().to_lowercase();
        if token == "space" || token == " " {
            return Ok(Key::Space);
        }
        let mut chars = token.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(Key::Char(c)),
            _ => Err(SceneError::InvalidInput(format!("unknown key '{}'", token))),
        }
    }
}

/// Values submitted with the start action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartForm {
    pub scenario: ScenarioId,
    
    /// Distance between the car and the two-wheeler at spawn
    pub distance: f64,
    
    pub map_style: MapStyle,
}

impl StartForm {
    pub fn new(scenario: ScenarioId, distance: f64, map_style: MapStyle) -> Self {
        Self {
            scenario,
            distance,
            map_style,
        }
    }
    
    /// Checks the partner distance against the spawn layout in `bounds`.
    pub fn validate(&self, bounds: &TravelBounds) -> Result<()> {
        let max = self.scenario.max_distance(bounds);
        if !self.distance.is_finite() || self.distance <= 0.0 || self.distance >= max {
            return Err(SceneError::InvalidForm(format!(
                "distance {} outside (0, {:.2}) for {}",
                self.distance, max, self.scenario
            )));
        }
        Ok(())
    }
}

/// An input event delivered to the scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InputEvent {
    KeyDown(Key),
    KeyUp(Key),
    MouseDown,
    MouseUp,
    Start(StartForm),
    Quit,
}

impl std::str::FromStr for InputEvent {
    type Err = SceneError;
    
    /// Parses a text command:
    ///
    /// ```text
    /// start <scenario> <distance> [map_style]
    /// key <k> | down <k>
    /// up <k>
    /// mouse down | mouse up
    /// quit
    /// ```
    fn from_str(line: &str) -> Result<Self> {
        let mut parts = line.split_whitespace();
        let command = parts
            .next()
            .ok_or_else(|| SceneError::InvalidInput("empty line".into()))?
            .to_lowercase();
        
        let event = match command.as_str() {
            "start" => {
                let scenario: ScenarioId = parts
                    .next()
                    .ok_or_else(|| SceneError::InvalidInput("start needs a scenario".into()))?
                    .parse()?;
                let distance = parts
                    .next()
                    .map(|d| {
                        d.parse::<f64>()
                            .map_err(|_| SceneError::InvalidInput(format!("bad distance '{}'", d)))
                    })
                    .transpose()?
                    .unwrap_or(10.0);
                let map_style = parts
                    .next()
                    .map(str::parse::<MapStyle>)
                    .transpose()?.unwrap_or_default();
                InputEvent::Start(StartForm::new(scenario, distance, map_style))
            }
            "key" | "down" => InputEvent::KeyDown(Key::parse(parts.next().unwrap_or("space"))?),
            "up" => InputEvent::KeyUp(Key::parse(parts.next().unwrap_or("space"))?),
            "mouse" => match parts.next().map(str::to_lowercase).as_deref() {
                Some("down") => InputEvent::MouseDown,
                Some("up") => InputEvent::MouseUp,
                other => {
                    return Err(SceneError::InvalidInput(format!("mouse {:?}", other)));
                }
            },
            "quit" | "exit" => InputEvent::Quit,
            other => return Err(SceneError::InvalidInput(other.to_string())),
        };
        Ok(event)
    }
}
