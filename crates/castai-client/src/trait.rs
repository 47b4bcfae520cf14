//! CastaiApi trait for mocking
//!
//! This trait abstracts the CAST AI client to enable mocking in unit tests.
//! The concrete CastaiClient implements this trait, and tests can use the
//! in-memory mock implementation.

use crate::error::CastaiError;
use crate::models::*;

/// Trait for CAST AI API operations
///
/// This trait enables mocking of CAST AI API calls for unit testing.
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait CastaiApi: Send + Sync {
    /// Get cluster details (status, provider type)
    async fn get_cluster(&self, cluster_id: &str) -> Result<ClusterDetails, CastaiError>;

    /// Get the cluster's autoscaling policy document
    async fn get_policies(&self, cluster_id: &str) -> Result<ClusterPolicies, CastaiError>;

    /// Replace the cluster's autoscaling policy document, echoing the applied value
    async fn put_policies(
        &self,
        cluster_id: &str,
        policies: &ClusterPolicies,
    ) -> Result<ClusterPolicies, CastaiError>;

    /// List the cluster's nodes as seen by the mothership
    async fn list_nodes(&self, cluster_id: &str) -> Result<Vec<Node>, CastaiError>;

    /// Submit an asynchronous node creation request
    async fn add_node(
        &self,
        cluster_id: &str,
        request: &AddNodeRequest,
    ) -> Result<AddNodeResponse, CastaiError>;

    /// Check the status of a long-running operation
    async fn get_operation(&self, operation_id: &str) -> Result<Operation, CastaiError>;

    /// Delete a node, draining it first
    async fn delete_node(
        &self,
        cluster_id: &str,
        node_id: &str,
        force_delete: bool,
        drain_timeout_secs: u32,
    ) -> Result<(), CastaiError>;
}
