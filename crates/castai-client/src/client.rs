//! CAST AI API client
//!
//! Implements the CAST AI REST API client for the endpoints the hibernate
//! controller needs: cluster details, autoscaling policies, external-cluster
//! node lifecycle and long-running operation polling.

use crate::castai_trait::CastaiApi;
use crate::error::CastaiError;
use crate::models::*;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// CAST AI API client
#[derive(Debug)]
pub struct CastaiClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl CastaiClient {
    /// Create a new CAST AI client
    ///
    /// # Arguments
    /// * `base_url` - API base URL (e.g., "https://api.cast.ai")
    /// * `api_key` - API key sent in the `X-API-Key` header
    pub fn new(base_url: String, api_key: String) -> Result<Self, CastaiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(CastaiError::Http)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn check(
        response: reqwest::Response,
        context: &str,
    ) -> Result<reqwest::Response, CastaiError> {
        let status = response.status();
        if status == 404 {
            let body = response.text().await.unwrap_or_default();
            return Err(CastaiError::NotFound(format!("{}: {}", context, body)));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CastaiError::Api(format!(
                "{}: {} - {}",
                context, status, body
            )));
        }
        Ok(response)
    }
}

#[async_trait::async_trait]
impl CastaiApi for CastaiClient {
    async fn get_cluster(&self, cluster_id: &str) -> Result<ClusterDetails, CastaiError> {
        let url = format!(
            "{}/v1/kubernetes/external-clusters/{}",
            self.base_url, cluster_id
        );
        debug!("Fetching cluster details for {}", cluster_id);

        let response = self
            .client
            .get(&url)
            .header("X-API-Key", &self.api_key)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(CastaiError::Http)?;

        let response =
            Self::check(response, &format!("Failed to get cluster {}", cluster_id)).await?;
        let details: ClusterDetails = response.json().await.map_err(CastaiError::Http)?;
        Ok(details)
    }

    async fn get_policies(&self, cluster_id: &str) -> Result<ClusterPolicies, CastaiError> {
        let url = format!(
            "{}/v1/kubernetes/clusters/{}/policies",
            self.base_url, cluster_id
        );
        debug!("Fetching autoscaling policies for cluster {}", cluster_id);

        let response = self
            .client
            .get(&url)
            .header("X-API-Key", &self.api_key)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(CastaiError::Http)?;

        let response = Self::check(
            response,
            &format!("Failed to get policies for cluster {}", cluster_id),
        )
        .await?;
        let policies: ClusterPolicies = response.json().await.map_err(CastaiError::Http)?;
        Ok(policies)
    }

    async fn put_policies(
        &self,
        cluster_id: &str,
        policies: &ClusterPolicies,
    ) -> Result<ClusterPolicies, CastaiError> {
        let url = format!(
            "{}/v1/kubernetes/clusters/{}/policies",
            self.base_url, cluster_id
        );
        debug!("Updating autoscaling policies for cluster {}", cluster_id);

        let response = self
            .client
            .put(&url)
            .header("X-API-Key", &self.api_key)
            .header("Accept", "application/json")
            .header("Content-Type", "application/json")
            .json(policies)
            .send()
            .await
            .map_err(CastaiError::Http)?;

        let response = Self::check(
            response,
            &format!("Failed to update policies for cluster {}", cluster_id),
        )
        .await?;
        let applied: ClusterPolicies = response.json().await.map_err(CastaiError::Http)?;
        Ok(applied)
    }

    async fn list_nodes(&self, cluster_id: &str) -> Result<Vec<Node>, CastaiError> {
        let url = format!(
            "{}/v1/kubernetes/external-clusters/{}/nodes",
            self.base_url, cluster_id
        );
        debug!("Listing nodes for cluster {}", cluster_id);

        let response = self
            .client
            .get(&url)
            .header("X-API-Key", &self.api_key)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(CastaiError::Http)?;

        let response = Self::check(
            response,
            &format!("Failed to list nodes for cluster {}", cluster_id),
        )
        .await?;
        let list: NodeList = response.json().await.map_err(CastaiError::Http)?;
        Ok(list.items)
    }

    async fn add_node(
        &self,
        cluster_id: &str,
        request: &AddNodeRequest,
    ) -> Result<AddNodeResponse, CastaiError> {
        let url = format!(
            "{}/v1/kubernetes/external-clusters/{}/nodes",
            self.base_url, cluster_id
        );
        debug!(
            "Adding {} node to cluster {}",
            request.instance_type, cluster_id
        );

        let response = self
            .client
            .post(&url)
            .header("X-API-Key", &self.api_key)
            .header("Accept", "application/json")
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(CastaiError::Http)?;

        let response = Self::check(
            response,
            &format!("Failed to add node to cluster {}", cluster_id),
        )
        .await?;
        let added: AddNodeResponse = response.json().await.map_err(CastaiError::Http)?;
        Ok(added)
    }

    async fn get_operation(&self, operation_id: &str) -> Result<Operation, CastaiError> {
        let url = format!(
            "{}/v1/kubernetes/external-clusters/operations/{}",
            self.base_url, operation_id
        );
        debug!("Checking operation {}", operation_id);

        let response = self
            .client
            .get(&url)
            .header("X-API-Key", &self.api_key)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(CastaiError::Http)?;

        let response = Self::check(
            response,
            &format!("Failed to get operation {}", operation_id),
        )
        .await?;
        let operation: Operation = response.json().await.map_err(CastaiError::Http)?;
        Ok(operation)
    }

    async fn delete_node(
        &self,
        cluster_id: &str,
        node_id: &str,
        force_delete: bool,
        drain_timeout_secs: u32,
    ) -> Result<(), CastaiError> {
        let url = format!(
            "{}/v1/kubernetes/external-clusters/{}/nodes/{}?forceDelete={}&drainTimeout={}",
            self.base_url, cluster_id, node_id, force_delete, drain_timeout_secs
        );
        debug!("Deleting node {} from cluster {}", node_id, cluster_id);

        let response = self
            .client
            .delete(&url)
            .header("X-API-Key", &self.api_key)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(CastaiError::Http)?;

        let response = Self::check(
            response,
            &format!("Failed to delete node {} from cluster {}", node_id, cluster_id),
        )
        .await?;
        let body = response.text().await.unwrap_or_default();
        debug!("Delete node {} response: {}", node_id, body);
        Ok(())
    }
}
