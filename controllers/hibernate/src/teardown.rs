//! Teardown of non-survivor nodes.
//!
//! Deletes every node the mothership knows about except the survivor, the
//! protected ones, and (until the rest of the workflow has finished) the
//! node the job itself runs on. The per-node skip decision is pure;
//! the pass runs as one retryable unit and deletion of an already-gone
//! node is treated as done.

use std::collections::HashSet;

use castai_client::{CastaiApi, CastaiError, Node};
use tracing::info;

use crate::cluster::{node_label, node_name, ClusterOps};
use crate::error::HibernateError;
use crate::inventory::DRAIN_TIMEOUT_SECS;
use crate::labels::REMOVAL_DISABLED_LABEL;
use crate::retry::{retry, RetryPolicy};

/// Whether the node should be deleted by this pass
pub fn should_delete(
    node: &Node,
    survivor_id: &str,
    deferred_id: Option<&str>,
    protected_names: &HashSet<String>,
    honor_protection: bool,
) -> bool {
    if node.id == survivor_id {
        return false;
    }
    if deferred_id == Some(node.id.as_str()) {
        return false;
    }
    if honor_protection && protected_names.contains(&node.name) {
        return false;
    }
    true
}

/// Delete every node except the survivor, deferred and protected ones
pub async fn delete_all_except<C, K>(
    api: &C,
    ops: &K,
    policy: &RetryPolicy,
    cluster_id: &str,
    survivor_id: &str,
    honor_protection: bool,
    deferred_id: Option<&str>,
) -> Result<(), HibernateError>
where
    C: CastaiApi + ?Sized,
    K: ClusterOps + ?Sized,
{
    retry(policy, "delete_all_except", || async {
        let nodes = api.list_nodes(cluster_id).await?;

        let protected_names: HashSet<String> = if honor_protection {
            ops.list_nodes()
                .await?
                .iter()
                .filter(|node| node_label(node, REMOVAL_DISABLED_LABEL) == Some("true"))
                .map(|node| node_name(node).to_string())
                .collect()
        } else {
            HashSet::new()
        };

        for node in &nodes {
            if !should_delete(node, survivor_id, deferred_id, &protected_names, honor_protection) {
                info!("Skipping node: {} with id: {}", node.name, node.id);
                continue;
            }
            info!("Deleting: {} with id: {}", node.name, node.id);
            match api
                .delete_node(cluster_id, &node.id, true, DRAIN_TIMEOUT_SECS)
                .await
            {
                Ok(()) => {}
                // A re-run of the pass may see nodes already gone
                Err(CastaiError::NotFound(_)) => {
                    info!("Node {} already deleted", node.id);
                }
                Err(err) => return Err(HibernateError::Castai(err)),
            }
        }
        Ok(())
    })
    .await
}
