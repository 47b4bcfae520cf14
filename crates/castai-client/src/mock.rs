//! Mock CastaiClient for unit testing
//!
//! This module provides a mock implementation of CastaiApi that can be used
//! in unit tests without requiring a CAST AI account. The mock stores
//! cluster state in memory, records mutating calls, and can be configured
//! to inject transient failures or failed operations.

use crate::castai_trait::CastaiApi;
use crate::error::CastaiError;
use crate::models::*;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

type NodeCreatedHook = Arc<dyn Fn(&str, &str) + Send + Sync>;

struct MockOperation {
    remaining_polls: u32,
    error: Option<String>,
}

/// Mock CastaiClient for testing
///
/// Stores nodes, policies and operations in memory. Mutating calls are
/// recorded so tests can assert on what was (or was not) issued, and a
/// shared journal captures call ordering across collaborating mocks.
#[derive(Clone)]
pub struct MockCastaiClient {
    cluster: Arc<Mutex<ClusterDetails>>,
    policies: Arc<Mutex<ClusterPolicies>>,
    nodes: Arc<Mutex<Vec<Node>>>,
    operations: Arc<Mutex<HashMap<String, MockOperation>>>,
    put_policy_calls: Arc<Mutex<u32>>,
    deleted: Arc<Mutex<Vec<String>>>,
    injected_failures: Arc<Mutex<HashMap<String, u32>>>,
    journal: Arc<Mutex<Vec<String>>>,
    polls_until_done: Arc<Mutex<u32>>,
    fail_next_operation: Arc<Mutex<Option<String>>>,
    node_created_hook: Arc<Mutex<Option<NodeCreatedHook>>>,
    next_id: Arc<Mutex<u64>>,
}

impl MockCastaiClient {
    /// Create a new mock client for the given cluster id
    pub fn new(cluster_id: impl Into<String>) -> Self {
        Self {
            cluster: Arc::new(Mutex::new(ClusterDetails {
                id: cluster_id.into(),
                status: "ready".to_string(),
                provider_type: Some("gke".to_string()),
            })),
            policies: Arc::new(Mutex::new(ClusterPolicies {
                enabled: true,
                rest: serde_json::Map::new(),
            })),
            nodes: Arc::new(Mutex::new(Vec::new())),
            operations: Arc::new(Mutex::new(HashMap::new())),
            put_policy_calls: Arc::new(Mutex::new(0)),
            deleted: Arc::new(Mutex::new(Vec::new())),
            injected_failures: Arc::new(Mutex::new(HashMap::new())),
            journal: Arc::new(Mutex::new(Vec::new())),
            polls_until_done: Arc::new(Mutex::new(2)),
            fail_next_operation: Arc::new(Mutex::new(None)),
            node_created_hook: Arc::new(Mutex::new(None)),
            next_id: Arc::new(Mutex::new(1)),
        }
    }

    /// Set the cluster status and provider type reported by `get_cluster`
    pub fn set_cluster(&self, status: &str, provider_type: Option<&str>) {
        let mut cluster = self.cluster.lock().unwrap();
        cluster.status = status.to_string();
        cluster.provider_type = provider_type.map(|p| p.to_string());
    }

    /// Replace the stored policy document
    pub fn set_policies(&self, policies: ClusterPolicies) {
        *self.policies.lock().unwrap() = policies;
    }

    /// Set only the autoscaler enabled flag, keeping other fields
    pub fn set_autoscaler_enabled(&self, enabled: bool) {
        self.policies.lock().unwrap().enabled = enabled;
    }

    /// Current autoscaler enabled flag
    pub fn autoscaler_enabled(&self) -> bool {
        self.policies.lock().unwrap().enabled
    }

    /// Add a node to the mock store (for test setup)
    pub fn add_existing_node(&self, node: Node) {
        self.nodes.lock().unwrap().push(node);
    }

    /// Node ids deleted through `delete_node`, in call order
    pub fn deleted_nodes(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    /// Number of `put_policies` calls issued
    pub fn put_policy_call_count(&self) -> u32 {
        *self.put_policy_calls.lock().unwrap()
    }

    /// Number of polls an operation stays pending before reporting done
    pub fn set_polls_until_done(&self, polls: u32) {
        *self.polls_until_done.lock().unwrap() = polls;
    }

    /// Make the next submitted operation complete with the given error
    pub fn fail_next_operation(&self, message: &str) {
        *self.fail_next_operation.lock().unwrap() = Some(message.to_string());
    }

    /// Make the next `count` calls to `method` fail with an API error
    pub fn inject_failures(&self, method: &str, count: u32) {
        self.injected_failures
            .lock()
            .unwrap()
            .insert(method.to_string(), count);
    }

    /// Register a hook invoked with (node_id, node_name) when a node
    /// creation request is accepted, so a collaborating Kubernetes mock can
    /// materialize the matching Node object
    pub fn set_node_created_hook(&self, hook: NodeCreatedHook) {
        *self.node_created_hook.lock().unwrap() = Some(hook);
    }

    /// The mock's journal of mutating calls
    pub fn journal_handle(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.journal)
    }

    fn take_failure(&self, method: &str) -> bool {
        let mut failures = self.injected_failures.lock().unwrap();
        match failures.get_mut(method) {
            Some(count) if *count > 0 => {
                *count -= 1;
                true
            }
            _ => false,
        }
    }

    fn record(&self, event: String) {
        self.journal.lock().unwrap().push(event);
    }
}

#[async_trait::async_trait]
impl CastaiApi for MockCastaiClient {
    async fn get_cluster(&self, _cluster_id: &str) -> Result<ClusterDetails, CastaiError> {
        if self.take_failure("get_cluster") {
            return Err(CastaiError::Api("injected get_cluster failure".to_string()));
        }
        Ok(self.cluster.lock().unwrap().clone())
    }

    async fn get_policies(&self, _cluster_id: &str) -> Result<ClusterPolicies, CastaiError> {
        if self.take_failure("get_policies") {
            return Err(CastaiError::Api("injected get_policies failure".to_string()));
        }
        Ok(self.policies.lock().unwrap().clone())
    }

    async fn put_policies(
        &self,
        _cluster_id: &str,
        policies: &ClusterPolicies,
    ) -> Result<ClusterPolicies, CastaiError> {
        if self.take_failure("put_policies") {
            return Err(CastaiError::Api("injected put_policies failure".to_string()));
        }
        *self.put_policy_calls.lock().unwrap() += 1;
        self.record(format!("put_policies:enabled={}", policies.enabled));
        *self.policies.lock().unwrap() = policies.clone();
        Ok(policies.clone())
    }

    async fn list_nodes(&self, _cluster_id: &str) -> Result<Vec<Node>, CastaiError> {
        if self.take_failure("list_nodes") {
            return Err(CastaiError::Api("injected list_nodes failure".to_string()));
        }
        Ok(self.nodes.lock().unwrap().clone())
    }

    async fn add_node(
        &self,
        _cluster_id: &str,
        request: &AddNodeRequest,
    ) -> Result<AddNodeResponse, CastaiError> {
        if self.take_failure("add_node") {
            return Err(CastaiError::Api("injected add_node failure".to_string()));
        }

        let n = {
            let mut next = self.next_id.lock().unwrap();
            let n = *next;
            *next += 1;
            n
        };
        let node_id = format!("node-id-{}", n);
        let node_name = format!("node-{}", n);
        let operation_id = format!("op-{}", n);

        self.operations.lock().unwrap().insert(
            operation_id.clone(),
            MockOperation {
                remaining_polls: *self.polls_until_done.lock().unwrap(),
                error: self.fail_next_operation.lock().unwrap().take(),
            },
        );

        self.nodes.lock().unwrap().push(Node {
            id: node_id.clone(),
            name: node_name.clone(),
            instance_type: Some(request.instance_type.clone()),
            state: NodeState {
                phase: "ready".to_string(),
            },
            created_at: Some(chrono::Utc::now()),
        });

        self.record(format!("add_node:{}", request.instance_type));

        let hook = self.node_created_hook.lock().unwrap().clone();
        if let Some(hook) = hook {
            hook(&node_id, &node_name);
        }

        Ok(AddNodeResponse {
            operation_id,
            node_id,
        })
    }

    async fn get_operation(&self, operation_id: &str) -> Result<Operation, CastaiError> {
        if self.take_failure("get_operation") {
            return Err(CastaiError::Api(
                "injected get_operation failure".to_string(),
            ));
        }
        let mut operations = self.operations.lock().unwrap();
        let op = operations
            .get_mut(operation_id)
            .ok_or_else(|| CastaiError::NotFound(format!("operation {}", operation_id)))?;
        if op.remaining_polls > 0 {
            op.remaining_polls -= 1;
            return Ok(Operation {
                done: false,
                error: None,
            });
        }
        Ok(Operation {
            done: true,
            error: op.error.clone().map(|message| OperationError {
                message: Some(message),
            }),
        })
    }

    async fn delete_node(
        &self,
        _cluster_id: &str,
        node_id: &str,
        _force_delete: bool,
        _drain_timeout_secs: u32,
    ) -> Result<(), CastaiError> {
        if self.take_failure("delete_node") {
            return Err(CastaiError::Api("injected delete_node failure".to_string()));
        }
        self.deleted.lock().unwrap().push(node_id.to_string());
        self.record(format!("delete_node:{}", node_id));
        self.nodes.lock().unwrap().retain(|n| n.id != node_id);
        Ok(())
    }
}
