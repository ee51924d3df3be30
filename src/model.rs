//! Snapshots of Swarm cluster state as returned by the Docker Engine API.
//!
//! Only the fields discovery reads are modelled. Every field defaults when
//! absent, and enum values this crate does not know map to `Unknown`, so a
//! newer daemon never breaks deserialization.

use serde::Deserialize;

/// A Swarm node (cluster member).
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Node {
    /// Node ID.
    #[serde(rename = "ID")]
    pub id: String,
    /// Desired node configuration.
    pub spec: NodeSpec,
    /// Properties reported by the node itself.
    pub description: NodeDescription,
    /// Observed node status.
    pub status: NodeStatus,
}

/// User-controlled node configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct NodeSpec {
    /// Manager or worker.
    pub role: NodeRole,
    /// Scheduling availability.
    pub availability: NodeAvailability,
}

/// Node self-description.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct NodeDescription {
    /// Machine hostname.
    pub hostname: String,
}

/// Observed node status.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct NodeStatus {
    /// Reported run state.
    pub state: NodeState,
    /// Human readable status detail.
    pub message: String,
    /// Advertised IP address, without port.
    pub addr: String,
}

/// Node role in the swarm.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    /// Participates in Raft and schedules work.
    Manager,
    /// Runs tasks only.
    Worker,
    #[default]
    #[serde(other)]
    /// Unset or unrecognized.
    Unknown,
}

/// Node scheduling availability.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeAvailability {
    /// Accepts new tasks.
    Active,
    /// Keeps running tasks but accepts no new ones.
    Pause,
    /// Tasks are being moved off the node.
    Drain,
    #[default]
    #[serde(other)]
    /// Unset or unrecognized.
    Unknown,
}

/// Node run state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeState {
    /// Healthy and connected.
    Ready,
    /// Not reachable.
    Down,
    /// Lost contact with the managers.
    Disconnected,
    #[default]
    #[serde(other)]
    /// Unknown or unrecognized.
    Unknown,
}

/// A Swarm task: one replica of a service.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Task {
    /// Task ID.
    #[serde(rename = "ID")]
    pub id: String,
    /// Owning service ID.
    #[serde(rename = "ServiceID")]
    pub service_id: String,
    /// Node the task is scheduled on; empty until assigned.
    #[serde(rename = "NodeID")]
    pub node_id: String,
    /// Replica slot; zero for global services.
    pub slot: u64,
    /// Observed task status.
    pub status: TaskStatus,
    /// State the orchestrator is driving the task to.
    pub desired_state: TaskState,
    /// Networks the task is attached to.
    pub networks_attachments: Vec<NetworkAttachment>,
}

impl Task {
    /// Name used in diagnostics: `{service}.{slot}.{id}`.
    #[must_use]
    pub fn display_name(&self, service: &str) -> String {
        format!("{service}.{}.{}", self.slot, self.id)
    }
}

/// Observed task status.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct TaskStatus {
    /// Current lifecycle state.
    pub state: TaskState,
    /// Human readable status detail.
    pub message: String,
}

/// Task lifecycle state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    /// Created, not yet processed by the orchestrator.
    New,
    /// Network and other resources allocated.
    Allocated,
    /// Waiting for a node to be scheduled on.
    Pending,
    /// Scheduled on a node.
    Assigned,
    /// Accepted by the node's agent.
    Accepted,
    /// The agent is preparing the container.
    Preparing,
    /// Prepared, ready to start.
    Ready,
    /// The container is starting.
    Starting,
    /// The container is running.
    Running,
    /// Exited successfully.
    Complete,
    /// Stopped by the orchestrator.
    Shutdown,
    /// Exited with an error.
    Failed,
    /// Refused by the node's agent.
    Rejected,
    /// Marked for removal.
    Remove,
    /// The node holding the task went away.
    Orphaned,
    /// Any state this crate does not know.
    #[default]
    #[serde(other)]
    Unknown,
}

/// Attachment of a task to a network.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct NetworkAttachment {
    /// The attached network.
    pub network: Network,
    /// Task addresses on this network in CIDR form (`10.0.0.5/24`).
    pub addresses: Vec<String>,
}

/// A Swarm network.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Network {
    /// Network ID.
    #[serde(rename = "ID")]
    pub id: String,
    /// Network configuration.
    pub spec: NetworkSpec,
}

/// Network configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct NetworkSpec {
    /// Network name, e.g. `ns_default` for a stack network.
    pub name: String,
}
