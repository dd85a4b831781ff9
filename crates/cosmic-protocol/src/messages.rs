use serde::{Deserialize, Serialize};

use crate::constants::names;
use crate::error::ProtocolError;
use crate::types::*;

/// Wire envelope: a bare event name with a JSON payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub event: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl Frame {
    pub fn new(event: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(|e| ProtocolError::MalformedFrame(e.to_string()))
    }

    pub fn encode(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Client→server requests.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundEvent {
    GetAiStatus,
    GetSystemStatus,
    GetTopologyData,
    CreateTask(CreateTaskParams),
    SubmitAiTask(SubmitAiTaskParams),
    CreateAiAgent(CreateAiAgentParams),
    Ping { timestamp: Timestamp },
}

impl OutboundEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::GetAiStatus => names::GET_AI_STATUS,
            Self::GetSystemStatus => names::GET_SYSTEM_STATUS,
            Self::GetTopologyData => names::GET_TOPOLOGY_DATA,
            Self::CreateTask(_) => names::CREATE_TASK,
            Self::SubmitAiTask(_) => names::SUBMIT_AI_TASK,
            Self::CreateAiAgent(_) => names::CREATE_AI_AGENT,
            Self::Ping { .. } => names::PING,
        }
    }

    pub fn payload(&self) -> serde_json::Value {
        match self {
            Self::GetAiStatus | Self::GetSystemStatus | Self::GetTopologyData => {
                serde_json::json!({})
            }
            Self::CreateTask(p) => serde_json::to_value(p).unwrap_or_default(),
            Self::SubmitAiTask(p) => serde_json::to_value(p).unwrap_or_default(),
            Self::CreateAiAgent(p) => serde_json::to_value(p).unwrap_or_default(),
            Self::Ping { timestamp } => serde_json::json!({ "timestamp": timestamp }),
        }
    }

    pub fn into_frame(self) -> Frame {
        Frame::new(self.name(), self.payload())
    }
}
