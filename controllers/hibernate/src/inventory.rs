//! Node inventory against the CAST AI mothership.
//!
//! Wraps the client's node endpoints in the retry policy. Node creation is
//! asynchronous on the API side: the request returns an operation id and a
//! tentative node id, and the operation is polled at a fixed interval
//! until done. A done operation carrying an error is a failure of the
//! whole creation attempt, and the attempt (submit + poll) is what gets
//! retried.

use std::collections::BTreeMap;
use std::time::Duration;

use castai_client::{AddNodeRequest, CastaiApi, CastaiError, Node, NodeTaint};
use tracing::{debug, info};

use crate::error::HibernateError;
use crate::retry::{retry, RetryPolicy};

/// Drain timeout passed to node deletion, in seconds
pub const DRAIN_TIMEOUT_SECS: u32 = 60;

/// Retry-wrapped node lifecycle operations for one cluster
pub struct NodeInventory<'a, C: CastaiApi + ?Sized> {
    api: &'a C,
    cluster_id: &'a str,
    retry_policy: RetryPolicy,
    poll_interval: Duration,
}

impl<'a, C: CastaiApi + ?Sized> NodeInventory<'a, C> {
    /// Create an inventory over the given client and cluster
    pub fn new(
        api: &'a C,
        cluster_id: &'a str,
        retry_policy: RetryPolicy,
        poll_interval: Duration,
    ) -> Self {
        Self {
            api,
            cluster_id,
            retry_policy,
            poll_interval,
        }
    }

    /// List the cluster's nodes
    pub async fn list(&self) -> Result<Vec<Node>, HibernateError> {
        let nodes = retry(&self.retry_policy, "list_nodes", || {
            self.api.list_nodes(self.cluster_id)
        })
        .await?;
        Ok(nodes)
    }

    /// Resolve a node's Kubernetes name from its provider id
    pub async fn node_name_by_id(&self, node_id: &str) -> Result<Option<String>, HibernateError> {
        let nodes = self.list().await?;
        Ok(nodes
            .into_iter()
            .find(|node| node.id == node_id)
            .map(|node| node.name))
    }

    /// Create a node and wait for the provisioning operation to finish.
    ///
    /// Returns the provider id of the new node. The submit-and-poll cycle
    /// runs as one retryable unit, so an operation that completes with an
    /// error leads to a fresh creation request.
    pub async fn create_node_and_wait(
        &self,
        instance_type: &str,
        taint_key: Option<&str>,
        labels: BTreeMap<String, String>,
    ) -> Result<String, HibernateError> {
        let request = AddNodeRequest {
            instance_type: instance_type.to_string(),
            kubernetes_taints: taint_key.map(|key| {
                vec![NodeTaint {
                    key: key.to_string(),
                    value: "true".to_string(),
                    effect: "NoSchedule".to_string(),
                }]
            }),
            kubernetes_labels: labels,
        };

        let node_id = retry(&self.retry_policy, "create_node", || async {
            let added = self.api.add_node(self.cluster_id, &request).await?;
            info!(
                "Node creation submitted, node id {} operation {}",
                added.node_id, added.operation_id
            );

            loop {
                debug!("checking node creation operation ID: {}", added.operation_id);
                let operation = self.api.get_operation(&added.operation_id).await?;
                if operation.done {
                    if let Some(error) = operation.error {
                        return Err(CastaiError::Operation(
                            error
                                .message
                                .unwrap_or_else(|| "operation failed".to_string()),
                        ));
                    }
                    break;
                }
                tokio::time::sleep(self.poll_interval).await;
            }
            Ok(added.node_id)
        })
        .await?;

        Ok(node_id)
    }

    /// Drain and delete a node
    pub async fn delete(&self, node_id: &str) -> Result<(), HibernateError> {
        retry(&self.retry_policy, "delete_node", || {
            self.api
                .delete_node(self.cluster_id, node_id, true, DRAIN_TIMEOUT_SECS)
        })
        .await?;
        Ok(())
    }
}
