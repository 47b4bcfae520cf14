//! Label and taint keys shared between the CAST AI and Kubernetes views of
//! a node.
//!
//! The same key doubles as the hibernation taint and the paused-cluster
//! scheduling label; the node-id label cross-references a Kubernetes Node
//! object to the mothership's node id.

/// Taint placed on the survivor node while the cluster is paused.
/// Only workloads that explicitly tolerate it are scheduled there.
pub const PAUSE_TAINT: &str = "scheduling.cast.ai/paused-cluster";

/// Scheduling label marking a node as part of a paused cluster
pub const PAUSED_CLUSTER_LABEL: &str = "scheduling.cast.ai/paused-cluster";

/// Label carrying the provider-assigned node id on the Kubernetes Node
pub const NODE_ID_LABEL: &str = "provisioner.cast.ai/node-id";

/// Nodes carrying this label are protected from cordon and deletion
/// when protection is honored
pub const REMOVAL_DISABLED_LABEL: &str = "autoscaling.cast.ai/removal-disabled";

/// Spot scheduling labels attached to nodes created for hibernation
pub const SPOT_LABEL: &str = "scheduling.cast.ai/spot";
/// See [`SPOT_LABEL`]
pub const SPOT_FALLBACK_LABEL: &str = "scheduling.cast.ai/spot-fallback";

/// Well-known Kubernetes label carrying a node's instance type
pub const INSTANCE_TYPE_LABEL: &str = "node.kubernetes.io/instance-type";
