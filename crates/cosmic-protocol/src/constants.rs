/// Reason carried by the synthetic `disconnected` event when the client
/// enters demo mode instead of opening a socket.
pub const DEMO_MODE_REASON: &str = "demo-mode";

/// Disconnect reasons reported by the transport layer itself.
pub const TRANSPORT_ERROR_REASON: &str = "transport error";
pub const TRANSPORT_CLOSE_REASON: &str = "transport close";
/// Disconnect reason reported after a locally requested close.
pub const CLIENT_DISCONNECT_REASON: &str = "io client disconnect";

/// HTTP path polled when the socket path is unavailable.
pub const AI_STATUS_PATH: &str = "/api/ai-status";

/// Event names emitted by the client itself (lifecycle) and by the backend.
pub mod names {
    // Lifecycle
    pub const CONNECTED: &str = "connected";
    pub const DISCONNECTED: &str = "disconnected";
    pub const ERROR: &str = "error";
    pub const RECONNECT_FAILED: &str = "reconnect-failed";

    // Outbound
    pub const GET_AI_STATUS: &str = "get-ai-status";
    pub const GET_SYSTEM_STATUS: &str = "get-system-status";
    pub const GET_TOPOLOGY_DATA: &str = "get-topology-data";
    pub const CREATE_TASK: &str = "create-task";
    pub const SUBMIT_AI_TASK: &str = "submit-ai-task";
    pub const CREATE_AI_AGENT: &str = "create-ai-agent";
    pub const PING: &str = "ping";

    // Inbound
    pub const AI_SYSTEM_STATUS: &str = "ai-system-status";
    pub const AGENT_UPDATE: &str = "agent-update";
    pub const TASK_UPDATE: &str = "task-update";
    pub const COLLABORATION_UPDATE: &str = "collaboration-update";
    pub const TOPOLOGY_UPDATE: &str = "topology-update";
    pub const NETWORK_TOPOLOGY_UPDATE: &str = "network-topology-update";
    pub const TCF_UPDATE: &str = "tcf-update";
    pub const TASK_CHAIN_EXECUTION_STEP: &str = "task-chain-execution-step";
    pub const TASK_CHAIN_COMPLETED: &str = "task-chain-completed";
    pub const AI_AGENT_CREATED: &str = "ai-agent-created";
    pub const AI_TASK_COMPLETED: &str = "ai-task-completed";
    pub const AI_TASK_ACKNOWLEDGED: &str = "ai-task-acknowledged";
    pub const AI_TASK_ERROR: &str = "ai-task-error";
    pub const PROF_SMOOT_ALLOCATION: &str = "prof-smoot-allocation";
    pub const FALLBACK_ALLOCATION: &str = "fallback-allocation";
    pub const COLLABORATION_COMPLETED: &str = "collaboration-completed";
    pub const PONG: &str = "pong";

    /// Every event the dashboard subscribes to on the client.
    pub const INBOUND: &[&str] = &[
        CONNECTED,
        DISCONNECTED,
        ERROR,
        RECONNECT_FAILED,
        AI_SYSTEM_STATUS,
        AGENT_UPDATE,
        TASK_UPDATE,
        COLLABORATION_UPDATE,
        TOPOLOGY_UPDATE,
        NETWORK_TOPOLOGY_UPDATE,
        TCF_UPDATE,
        TASK_CHAIN_EXECUTION_STEP,
        TASK_CHAIN_COMPLETED,
        AI_AGENT_CREATED,
        AI_TASK_COMPLETED,
        AI_TASK_ACKNOWLEDGED,
        AI_TASK_ERROR,
        PROF_SMOOT_ALLOCATION,
        FALLBACK_ALLOCATION,
        COLLABORATION_COMPLETED,
        PONG,
    ];
}
