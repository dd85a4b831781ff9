//! Inbound events validated into a tagged union.
//!
//! The client relays every socket event by name with an untyped payload;
//! [`InboundEvent::parse`] is the single place where those payloads are
//! checked and turned into typed values.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::constants::names;
use crate::error::ProtocolError;
use crate::types::*;

#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    Connected,
    Disconnected { reason: String },
    Error { message: String },
    ReconnectFailed,
    AiSystemStatus(AiSystemStatus),
    AgentUpdate(AgentInfo),
    TaskUpdate(TaskInfo),
    CollaborationUpdate(Collaboration),
    TopologyUpdate(TopologyUpdate),
    NetworkTopologyUpdate(TopologyUpdate),
    TcfUpdate(TcfUpdate),
    TaskChainExecutionStep(ExecutionStepEvent),
    TaskChainCompleted(TaskChain),
    AiAgentCreated(AgentInfo),
    AiTaskCompleted(AiTaskCompleted),
    AiTaskAcknowledged(AiTaskAcknowledged),
    AiTaskError(AiTaskError),
    ProfSmootAllocation(Allocation),
    FallbackAllocation(Allocation),
    CollaborationCompleted(CollaborationCompleted),
    Pong(Pong),
}

impl InboundEvent {
    /// Validate a relayed `(name, payload)` pair.
    pub fn parse(name: &str, data: &Value) -> Result<Self, ProtocolError> {
        let event = match name {
            names::CONNECTED => Self::Connected,
            names::DISCONNECTED => Self::Disconnected {
                reason: text_field(data, "reason"),
            },
            names::ERROR => Self::Error {
                message: text_field(data, "message"),
            },
            names::RECONNECT_FAILED => Self::ReconnectFailed,
            names::AI_SYSTEM_STATUS => Self::AiSystemStatus(decode(name, data)?),
            names::AGENT_UPDATE => Self::AgentUpdate(decode(name, data)?),
            names::TASK_UPDATE => Self::TaskUpdate(decode(name, data)?),
            names::COLLABORATION_UPDATE => Self::CollaborationUpdate(decode(name, data)?),
            names::TOPOLOGY_UPDATE => Self::TopologyUpdate(decode(name, data)?),
            names::NETWORK_TOPOLOGY_UPDATE => Self::NetworkTopologyUpdate(decode(name, data)?),
            names::TCF_UPDATE => Self::TcfUpdate(decode(name, data)?),
            names::TASK_CHAIN_EXECUTION_STEP => {
                Self::TaskChainExecutionStep(decode(name, data)?)
            }
            names::TASK_CHAIN_COMPLETED => Self::TaskChainCompleted(decode(name, data)?),
            names::AI_AGENT_CREATED => Self::AiAgentCreated(decode_agent(name, data)?),
            names::AI_TASK_COMPLETED => Self::AiTaskCompleted(decode(name, data)?),
            names::AI_TASK_ACKNOWLEDGED => Self::AiTaskAcknowledged(decode(name, data)?),
            names::AI_TASK_ERROR => Self::AiTaskError(decode(name, data)?),
            names::PROF_SMOOT_ALLOCATION => Self::ProfSmootAllocation(decode(name, data)?),
            names::FALLBACK_ALLOCATION => Self::FallbackAllocation(decode(name, data)?),
            names::COLLABORATION_COMPLETED => Self::CollaborationCompleted(decode(name, data)?),
            names::PONG => Self::Pong(if data.is_null() {
                Pong::default()
            } else {
                decode(name, data)?
            }),
            other => return Err(ProtocolError::UnknownEvent(other.to_string())),
        };
        Ok(event)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Connected => names::CONNECTED,
            Self::Disconnected { .. } => names::DISCONNECTED,
            Self::Error { .. } => names::ERROR,
            Self::ReconnectFailed => names::RECONNECT_FAILED,
            Self::AiSystemStatus(_) => names::AI_SYSTEM_STATUS,
            Self::AgentUpdate(_) => names::AGENT_UPDATE,
            Self::TaskUpdate(_) => names::TASK_UPDATE,
            Self::CollaborationUpdate(_) => names::COLLABORATION_UPDATE,
            Self::TopologyUpdate(_) => names::TOPOLOGY_UPDATE,
            Self::NetworkTopologyUpdate(_) => names::NETWORK_TOPOLOGY_UPDATE,
            Self::TcfUpdate(_) => names::TCF_UPDATE,
            Self::TaskChainExecutionStep(_) => names::TASK_CHAIN_EXECUTION_STEP,
            Self::TaskChainCompleted(_) => names::TASK_CHAIN_COMPLETED,
            Self::AiAgentCreated(_) => names::AI_AGENT_CREATED,
            Self::AiTaskCompleted(_) => names::AI_TASK_COMPLETED,
            Self::AiTaskAcknowledged(_) => names::AI_TASK_ACKNOWLEDGED,
            Self::AiTaskError(_) => names::AI_TASK_ERROR,
            Self::ProfSmootAllocation(_) => names::PROF_SMOOT_ALLOCATION,
            Self::FallbackAllocation(_) => names::FALLBACK_ALLOCATION,
            Self::CollaborationCompleted(_) => names::COLLABORATION_COMPLETED,
            Self::Pong(_) => names::PONG,
        }
    }
}

fn decode<T: DeserializeOwned>(event: &str, data: &Value) -> Result<T, ProtocolError> {
    T::deserialize(data).map_err(|source| ProtocolError::InvalidPayload {
        event: event.to_string(),
        source,
    })
}

/// `ai-agent-created` is sent both bare and wrapped as `{ "agent": {...} }`.
fn decode_agent(event: &str, data: &Value) -> Result<AgentInfo, ProtocolError> {
    match data.get("agent") {
        Some(inner) => decode(event, inner),
        None => decode(event, data),
    }
}

/// Lifecycle payloads are either a bare string or an object with `key`.
fn text_field(data: &Value, key: &str) -> String {
    match data {
        Value::String(s) => s.clone(),
        Value::Object(map) => map
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| data.to_string()),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
