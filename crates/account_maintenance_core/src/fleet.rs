use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::contract::{DEFAULT_ENVIRONMENT_TAG_KEY, DEFAULT_ENVIRONMENT_TAG_VALUES};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FleetAction {
    Start,
    Stop,
}

impl FleetAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
        }
    }

    /// Reads `action` from an invocation payload. Anything other than the
    /// strings `"start"` or `"stop"` is rejected; an absent or null action is
    /// reported as `None`.
    pub fn from_event(event: &Value) -> Result<Self, InvalidAction> {
        match event.get("action") {
            Some(Value::String(text)) => text.parse(),
            None | Some(Value::Null) => Err(InvalidAction("None".to_string())),
            Some(other) => Err(InvalidAction(other.to_string())),
        }
    }
}

impl fmt::Display for FleetAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FleetAction {
    type Err = InvalidAction;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "start" => Ok(Self::Start),
            "stop" => Ok(Self::Stop),
            other => Err(InvalidAction(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid action: {0}")]
pub struct InvalidAction(pub String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstanceState {
    Running,
    Stopped,
    Other(String),
}

impl InstanceState {
    pub fn from_name(name: &str) -> Self {
        match name {
            "running" => Self::Running,
            "stopped" => Self::Stopped,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Other(name) => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceRecord {
    pub instance_id: String,
    pub state: InstanceState,
    pub tags: BTreeMap<String, String>,
}

/// Tag and power-state filter for the instances the controller may touch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceSelector {
    pub tag_key: String,
    pub tag_values: Vec<String>,
    pub states: Vec<InstanceState>,
}

impl Default for InstanceSelector {
    fn default() -> Self {
        Self {
            tag_key: DEFAULT_ENVIRONMENT_TAG_KEY.to_string(),
            tag_values: DEFAULT_ENVIRONMENT_TAG_VALUES
                .iter()
                .map(|value| value.to_string())
                .collect(),
            states: vec![InstanceState::Running, InstanceState::Stopped],
        }
    }
}

impl InstanceSelector {
    pub fn admits(&self, instance: &InstanceRecord) -> bool {
        let tag_matches = instance
            .tags
            .get(&self.tag_key)
            .map(|value| self.tag_values.iter().any(|allowed| allowed == value))
            .unwrap_or(false);
        tag_matches && self.states.contains(&instance.state)
    }

    pub fn state_names(&self) -> Vec<String> {
        self.states
            .iter()
            .map(|state| state.name().to_string())
            .collect()
    }
}
