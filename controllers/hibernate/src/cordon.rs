//! Cordoning of non-survivor nodes.
//!
//! Marks every node except the survivor unschedulable so displaced
//! workloads can only land on the survivor. The per-node skip decision is
//! pure; the pass over the cluster runs as one retryable unit, so a
//! failure anywhere re-runs the whole pass (cordoning is idempotent).

use k8s_openapi::api::core::v1::Node;
use tracing::info;

use crate::cluster::{node_id, node_label, node_name, ClusterOps};
use crate::error::HibernateError;
use crate::labels::REMOVAL_DISABLED_LABEL;
use crate::retry::{retry, RetryPolicy};

/// Whether the node should be cordoned: not the survivor, and not
/// protected (when protection is honored)
pub fn should_cordon(node: &Node, survivor_id: &str, honor_protection: bool) -> bool {
    if honor_protection && node_label(node, REMOVAL_DISABLED_LABEL) == Some("true") {
        return false;
    }
    node_id(node) != Some(survivor_id)
}

/// Cordon every node except the survivor
pub async fn cordon_all<K: ClusterOps + ?Sized>(
    ops: &K,
    policy: &RetryPolicy,
    survivor_id: &str,
    honor_protection: bool,
) -> Result<(), HibernateError> {
    retry(policy, "cordon_all", || async {
        let nodes = ops.list_nodes().await?;
        for node in &nodes {
            let name = node_name(node);
            if should_cordon(node, survivor_id, honor_protection) {
                info!("Cordoning: {}", name);
                ops.cordon_node(name).await?;
            } else {
                info!("skip cordoning node: {}", name);
            }
        }
        Ok(())
    })
    .await
}
