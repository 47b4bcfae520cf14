//! Kubernetes API surface.
//!
//! `ClusterOps` abstracts the handful of Kubernetes operations the job
//! needs (node list/patch, deployment list/patch, ConfigMap read/write) so
//! the orchestrator can be exercised against an in-memory mock. The real
//! implementation, `KubeCluster`, issues unconditional merge patches:
//! last write wins, per the single-writer assumption.

use std::collections::BTreeMap;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Node, Taint, Toleration};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, ListParams, Patch, PatchParams, PostParams};
use kube::Client;
use serde_json::json;
use tracing::debug;

use crate::error::HibernateError;
use crate::labels::NODE_ID_LABEL;

/// The Kubernetes operations used by the hibernate job
#[async_trait]
pub trait ClusterOps: Send + Sync {
    /// List all nodes in the cluster
    async fn list_nodes(&self) -> Result<Vec<Node>, HibernateError>;

    /// Fetch a single node by name, `None` if absent
    async fn get_node(&self, name: &str) -> Result<Option<Node>, HibernateError>;

    /// Mark a node unschedulable
    async fn cordon_node(&self, name: &str) -> Result<(), HibernateError>;

    /// Replace a node's taints and merge the given labels
    async fn patch_node_taints(
        &self,
        name: &str,
        taints: &[Taint],
        labels: &BTreeMap<String, String>,
    ) -> Result<(), HibernateError>;

    /// List deployments across all namespaces
    async fn list_deployments_all_namespaces(&self) -> Result<Vec<Deployment>, HibernateError>;

    /// List deployments in one namespace
    async fn list_deployments(&self, namespace: &str) -> Result<Vec<Deployment>, HibernateError>;

    /// Replace a deployment's pod-template toleration list
    async fn patch_deployment_tolerations(
        &self,
        namespace: &str,
        name: &str,
        tolerations: &[Toleration],
    ) -> Result<(), HibernateError>;

    /// Read a ConfigMap's data, `None` if the ConfigMap is absent
    async fn read_config_map(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<BTreeMap<String, String>>, HibernateError>;

    /// Create or update a ConfigMap's data
    async fn write_config_map(
        &self,
        namespace: &str,
        name: &str,
        data: &BTreeMap<String, String>,
    ) -> Result<(), HibernateError>;
}

/// Node name, empty when unset (never the case for server-returned objects)
pub fn node_name(node: &Node) -> &str {
    node.metadata.name.as_deref().unwrap_or("")
}

/// Look up a label value on a node
pub fn node_label<'a>(node: &'a Node, key: &str) -> Option<&'a str> {
    node.metadata
        .labels
        .as_ref()
        .and_then(|labels| labels.get(key))
        .map(String::as_str)
}

/// The provider-assigned node id, cross-referenced via the node-id label
pub fn node_id(node: &Node) -> Option<&str> {
    node_label(node, NODE_ID_LABEL)
}

/// Whether the node's Ready condition is true
pub fn node_is_ready(node: &Node) -> bool {
    node.status
        .as_ref()
        .and_then(|status| status.conditions.as_ref())
        .is_some_and(|conditions| {
            conditions
                .iter()
                .any(|c| c.type_ == "Ready" && c.status == "True")
        })
}

/// Whether the node is cordoned
pub fn node_unschedulable(node: &Node) -> bool {
    node.spec
        .as_ref()
        .and_then(|spec| spec.unschedulable)
        .unwrap_or(false)
}

/// The node's taints, empty when unset
pub fn node_taints(node: &Node) -> &[Taint] {
    node.spec
        .as_ref()
        .and_then(|spec| spec.taints.as_deref())
        .unwrap_or(&[])
}

/// Whole-core CPU capacity, `None` when unreported or not a plain integer
pub fn node_cpu_capacity(node: &Node) -> Option<u32> {
    node.status
        .as_ref()
        .and_then(|status| status.capacity.as_ref())
        .and_then(|capacity| capacity.get("cpu"))
        .and_then(|quantity| quantity.0.parse().ok())
}

/// `ClusterOps` implementation against a live Kubernetes API server
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
}

impl KubeCluster {
    /// Wrap a kube client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn nodes(&self) -> Api<Node> {
        Api::all(self.client.clone())
    }
}

#[async_trait]
impl ClusterOps for KubeCluster {
    async fn list_nodes(&self) -> Result<Vec<Node>, HibernateError> {
        let list = self.nodes().list(&ListParams::default()).await?;
        Ok(list.items)
    }

    async fn get_node(&self, name: &str) -> Result<Option<Node>, HibernateError> {
        Ok(self.nodes().get_opt(name).await?)
    }

    async fn cordon_node(&self, name: &str) -> Result<(), HibernateError> {
        let body = json!({
            "spec": {
                "unschedulable": true
            }
        });
        debug!("Cordoning node {}", name);
        self.nodes()
            .patch(name, &PatchParams::default(), &Patch::Merge(&body))
            .await?;
        Ok(())
    }

    async fn patch_node_taints(
        &self,
        name: &str,
        taints: &[Taint],
        labels: &BTreeMap<String, String>,
    ) -> Result<(), HibernateError> {
        let body = json!({
            "spec": {
                "taints": taints
            },
            "metadata": {
                "labels": labels
            }
        });
        debug!("Patching taints on node {}", name);
        self.nodes()
            .patch(name, &PatchParams::default(), &Patch::Merge(&body))
            .await?;
        Ok(())
    }

    async fn list_deployments_all_namespaces(&self) -> Result<Vec<Deployment>, HibernateError> {
        let api: Api<Deployment> = Api::all(self.client.clone());
        let list = api.list(&ListParams::default()).await?;
        Ok(list.items)
    }

    async fn list_deployments(&self, namespace: &str) -> Result<Vec<Deployment>, HibernateError> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        let list = api.list(&ListParams::default()).await?;
        Ok(list.items)
    }

    async fn patch_deployment_tolerations(
        &self,
        namespace: &str,
        name: &str,
        tolerations: &[Toleration],
    ) -> Result<(), HibernateError> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        let body = json!({
            "spec": {
                "template": {
                    "spec": {
                        "tolerations": tolerations
                    }
                }
            }
        });
        debug!("Patching tolerations on deployment {}/{}", namespace, name);
        api.patch(name, &PatchParams::default(), &Patch::Merge(&body))
            .await?;
        Ok(())
    }

    async fn read_config_map(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<BTreeMap<String, String>>, HibernateError> {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
        let cm = api.get_opt(name).await?;
        Ok(cm.map(|cm| cm.data.unwrap_or_default()))
    }

    async fn write_config_map(
        &self,
        namespace: &str,
        name: &str,
        data: &BTreeMap<String, String>,
    ) -> Result<(), HibernateError> {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
        if api.get_opt(name).await?.is_none() {
            let cm = ConfigMap {
                metadata: ObjectMeta {
                    name: Some(name.to_string()),
                    namespace: Some(namespace.to_string()),
                    ..Default::default()
                },
                data: Some(data.clone()),
                ..Default::default()
            };
            debug!("Creating ConfigMap {}/{}", namespace, name);
            api.create(&PostParams::default(), &cm).await?;
            return Ok(());
        }
        let body = json!({ "data": data });
        debug!("Patching ConfigMap {}/{}", namespace, name);
        api.patch(name, &PatchParams::default(), &Patch::Merge(&body))
            .await?;
        Ok(())
    }
}
