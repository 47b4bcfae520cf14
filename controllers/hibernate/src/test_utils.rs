//! Test utilities for unit testing the hibernate workflow.
//!
//! Provides an in-memory `ClusterOps` implementation plus builders for
//! Kubernetes and mothership node objects, so the orchestrator can run
//! end-to-end against mocks of both control planes.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use castai_client::{Node as FleetNode, NodeState};
use chrono::{TimeDelta, Utc};
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Node, NodeCondition, NodeSpec, NodeStatus, PodSpec, PodTemplateSpec, Taint, Toleration,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta, Time};

use crate::cluster::{node_name, ClusterOps};
use crate::error::HibernateError;
use crate::labels::{INSTANCE_TYPE_LABEL, NODE_ID_LABEL};

/// Builder for Kubernetes Node objects used in tests
pub struct NodeBuilder {
    name: String,
    labels: BTreeMap<String, String>,
    taints: Vec<Taint>,
    ready: bool,
    unschedulable: bool,
    cpu: Option<u32>,
    age_hours: i64,
}

impl NodeBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            labels: BTreeMap::new(),
            taints: Vec::new(),
            ready: false,
            unschedulable: false,
            cpu: None,
            age_hours: 0,
        }
    }

    pub fn label(mut self, key: &str, value: &str) -> Self {
        self.labels.insert(key.to_string(), value.to_string());
        self
    }

    pub fn node_id(self, id: &str) -> Self {
        self.label(NODE_ID_LABEL, id)
    }

    pub fn instance_type(self, instance_type: &str) -> Self {
        self.label(INSTANCE_TYPE_LABEL, instance_type)
    }

    pub fn taint(mut self, key: &str) -> Self {
        self.taints.push(Taint {
            key: key.to_string(),
            effect: "NoSchedule".to_string(),
            ..Default::default()
        });
        self
    }

    pub fn ready(mut self, ready: bool) -> Self {
        self.ready = ready;
        self
    }

    pub fn unschedulable(mut self) -> Self {
        self.unschedulable = true;
        self
    }

    pub fn cpu(mut self, cores: u32) -> Self {
        self.cpu = Some(cores);
        self
    }

    pub fn age_hours(mut self, hours: i64) -> Self {
        self.age_hours = hours;
        self
    }

    pub fn build(self) -> Node {
        let mut capacity = BTreeMap::new();
        if let Some(cores) = self.cpu {
            capacity.insert("cpu".to_string(), Quantity(cores.to_string()));
        }
        Node {
            metadata: ObjectMeta {
                name: Some(self.name),
                labels: Some(self.labels),
                creation_timestamp: Some(Time(Utc::now() - TimeDelta::hours(self.age_hours))),
                ..Default::default()
            },
            spec: Some(NodeSpec {
                taints: if self.taints.is_empty() {
                    None
                } else {
                    Some(self.taints)
                },
                unschedulable: Some(self.unschedulable),
                ..Default::default()
            }),
            status: Some(NodeStatus {
                conditions: Some(vec![NodeCondition {
                    type_: "Ready".to_string(),
                    status: if self.ready { "True" } else { "False" }.to_string(),
                    ..Default::default()
                }]),
                capacity: if capacity.is_empty() {
                    None
                } else {
                    Some(capacity)
                },
                ..Default::default()
            }),
        }
    }
}

/// A node as the mothership reports it
pub fn fleet_node(id: &str, name: &str, phase: &str) -> FleetNode {
    FleetNode {
        id: id.to_string(),
        name: name.to_string(),
        instance_type: None,
        state: NodeState {
            phase: phase.to_string(),
        },
        created_at: Some(Utc::now()),
    }
}

/// A deployment with an optional priority class and toleration keys
pub fn deployment(
    name: &str,
    namespace: &str,
    priority_class: Option<&str>,
    toleration_keys: &[&str],
) -> Deployment {
    let tolerations: Vec<Toleration> = toleration_keys
        .iter()
        .map(|key| Toleration {
            key: Some(key.to_string()),
            operator: Some("Exists".to_string()),
            effect: Some("NoSchedule".to_string()),
            ..Default::default()
        })
        .collect();
    Deployment {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            selector: LabelSelector::default(),
            template: PodTemplateSpec {
                metadata: None,
                spec: Some(PodSpec {
                    priority_class_name: priority_class.map(str::to_string),
                    tolerations: if tolerations.is_empty() {
                        None
                    } else {
                        Some(tolerations)
                    },
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        status: None,
    }
}

/// In-memory `ClusterOps` implementation.
///
/// Mutations are applied to stored objects and appended to a journal so
/// tests can assert on call ordering; share the journal with a
/// `MockCastaiClient` to order events across both control planes.
#[derive(Clone)]
pub struct MockCluster {
    nodes: Arc<Mutex<Vec<Node>>>,
    deployments: Arc<Mutex<Vec<Deployment>>>,
    config_maps: Arc<Mutex<HashMap<(String, String), BTreeMap<String, String>>>>,
    cordon_failures: Arc<Mutex<u32>>,
    journal: Arc<Mutex<Vec<String>>>,
}

impl MockCluster {
    pub fn new() -> Self {
        Self::with_journal(Arc::new(Mutex::new(Vec::new())))
    }

    pub fn with_journal(journal: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            nodes: Arc::new(Mutex::new(Vec::new())),
            deployments: Arc::new(Mutex::new(Vec::new())),
            config_maps: Arc::new(Mutex::new(HashMap::new())),
            cordon_failures: Arc::new(Mutex::new(0)),
            journal,
        }
    }

    pub fn insert_node(&self, node: Node) {
        self.nodes.lock().unwrap().push(node);
    }

    pub fn insert_deployment(&self, deployment: Deployment) {
        self.deployments.lock().unwrap().push(deployment);
    }

    /// Make the next `count` cordon calls fail
    pub fn inject_cordon_failures(&self, count: u32) {
        *self.cordon_failures.lock().unwrap() = count;
    }

    /// Fetch a stored node by name (for assertions)
    pub fn node(&self, name: &str) -> Option<Node> {
        self.nodes
            .lock()
            .unwrap()
            .iter()
            .find(|node| node_name(node) == name)
            .cloned()
    }

    pub fn journal(&self) -> Vec<String> {
        self.journal.lock().unwrap().clone()
    }

    fn record(&self, event: String) {
        self.journal.lock().unwrap().push(event);
    }
}

#[async_trait]
impl ClusterOps for MockCluster {
    async fn list_nodes(&self) -> Result<Vec<Node>, HibernateError> {
        Ok(self.nodes.lock().unwrap().clone())
    }

    async fn get_node(&self, name: &str) -> Result<Option<Node>, HibernateError> {
        Ok(self.node(name))
    }

    async fn cordon_node(&self, name: &str) -> Result<(), HibernateError> {
        {
            let mut failures = self.cordon_failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(HibernateError::InvalidConfig(
                    "injected cordon failure".to_string(),
                ));
            }
        }
        let mut nodes = self.nodes.lock().unwrap();
        let node = nodes
            .iter_mut()
            .find(|node| node_name(node) == name)
            .ok_or_else(|| HibernateError::InvalidConfig(format!("no such node: {}", name)))?;
        node.spec.get_or_insert_with(NodeSpec::default).unschedulable = Some(true);
        self.record(format!("cordon:{}", name));
        Ok(())
    }

    async fn patch_node_taints(
        &self,
        name: &str,
        taints: &[Taint],
        labels: &BTreeMap<String, String>,
    ) -> Result<(), HibernateError> {
        let mut nodes = self.nodes.lock().unwrap();
        let node = nodes
            .iter_mut()
            .find(|node| node_name(node) == name)
            .ok_or_else(|| HibernateError::InvalidConfig(format!("no such node: {}", name)))?;
        node.spec.get_or_insert_with(NodeSpec::default).taints = Some(taints.to_vec());
        node.metadata
            .labels
            .get_or_insert_with(BTreeMap::new)
            .extend(labels.clone());
        let keys: Vec<&str> = taints.iter().map(|taint| taint.key.as_str()).collect();
        self.record(format!("patch_taints:{}:[{}]", name, keys.join(",")));
        Ok(())
    }

    async fn list_deployments_all_namespaces(&self) -> Result<Vec<Deployment>, HibernateError> {
        Ok(self.deployments.lock().unwrap().clone())
    }

    async fn list_deployments(&self, namespace: &str) -> Result<Vec<Deployment>, HibernateError> {
        Ok(self
            .deployments
            .lock()
            .unwrap()
            .iter()
            .filter(|d| d.metadata.namespace.as_deref() == Some(namespace))
            .cloned()
            .collect())
    }

    async fn patch_deployment_tolerations(
        &self,
        namespace: &str,
        name: &str,
        tolerations: &[Toleration],
    ) -> Result<(), HibernateError> {
        let mut deployments = self.deployments.lock().unwrap();
        let deployment = deployments
            .iter_mut()
            .find(|d| {
                d.metadata.namespace.as_deref() == Some(namespace)
                    && d.metadata.name.as_deref() == Some(name)
            })
            .ok_or_else(|| {
                HibernateError::InvalidConfig(format!("no such deployment: {}/{}", namespace, name))
            })?;
        let spec = deployment
            .spec
            .get_or_insert_with(DeploymentSpec::default);
        spec.template
            .spec
            .get_or_insert_with(PodSpec::default)
            .tolerations = Some(tolerations.to_vec());
        self.record(format!("patch_tolerations:{}/{}", namespace, name));
        Ok(())
    }

    async fn read_config_map(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<BTreeMap<String, String>>, HibernateError> {
        Ok(self
            .config_maps
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }

    async fn write_config_map(
        &self,
        namespace: &str,
        name: &str,
        data: &BTreeMap<String, String>,
    ) -> Result<(), HibernateError> {
        self.config_maps
            .lock()
            .unwrap()
            .insert((namespace.to_string(), name.to_string()), data.clone());
        Ok(())
    }
}
