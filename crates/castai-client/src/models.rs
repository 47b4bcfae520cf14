//! CAST AI API models
//!
//! These models match the CAST AI REST API payloads used by the hibernate
//! controller: cluster policies, external-cluster details, node lifecycle
//! and long-running operations.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Cluster-scoped autoscaling policy document.
///
/// Only the top-level `enabled` flag is interpreted; every other field is
/// carried through untouched so a read-modify-write of the flag cannot
/// clobber unrelated policy settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterPolicies {
    /// Whether the autoscaler is enabled for the cluster
    pub enabled: bool,
    /// All remaining policy fields, passed through verbatim
    #[serde(flatten)]
    pub rest: serde_json::Map<String, serde_json::Value>,
}

/// Cluster details from the external-clusters endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterDetails {
    pub id: String,
    /// Cluster status, "ready" when healthy
    #[serde(default)]
    pub status: String,
    /// Cloud provider type as reported by CAST AI, e.g. "gke", "eks", "aks"
    #[serde(default)]
    pub provider_type: Option<String>,
}

/// Node list response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeList {
    pub items: Vec<Node>,
}

/// A node as reported by the CAST AI mothership.
///
/// `id` is the provider-assigned node id; `name` is the Kubernetes node
/// name. The two identifier spaces are cross-referenced on the Kubernetes
/// side via the `provisioner.cast.ai/node-id` label.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub instance_type: Option<String>,
    pub state: NodeState,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Node {
    /// Whether the mothership reports this node as ready
    pub fn is_ready(&self) -> bool {
        self.state.phase == "ready"
    }
}

/// Node lifecycle state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeState {
    /// Readiness phase, e.g. "pending", "creating", "ready", "deleting"
    pub phase: String,
}

/// Kubernetes taint attached to a node at creation time
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeTaint {
    pub key: String,
    pub value: String,
    pub effect: String,
}

/// Request body for creating a node through the mothership
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddNodeRequest {
    pub instance_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kubernetes_taints: Option<Vec<NodeTaint>>,
    pub kubernetes_labels: BTreeMap<String, String>,
}

/// Response from node creation: the operation to poll plus the tentative
/// id of the node being provisioned
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddNodeResponse {
    pub operation_id: String,
    pub node_id: String,
}

/// Long-running operation status, polled until `done`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operation {
    #[serde(default)]
    pub done: bool,
    /// Present when the operation finished unsuccessfully
    #[serde(default)]
    pub error: Option<OperationError>,
}

/// Error detail attached to a failed operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationError {
    #[serde(default)]
    pub message: Option<String>,
}
