//! Suspend/resume orchestration.
//!
//! One invocation runs one action to completion, issuing every remote
//! call sequentially. The ordering here is the correctness guard: the
//! autoscaler is silenced before any node is touched, workloads get their
//! tolerations before their nodes disappear, the survivor's taint comes
//! off only after teardown, and the job's own node goes last. Any failure
//! after the autoscaler was disabled triggers a compensating resume so
//! the cluster is never left half-paused.

use std::collections::BTreeMap;
use std::fmt;

use castai_client::CastaiApi;
use chrono::Utc;
use k8s_openapi::api::core::v1::Taint;
use tracing::{error, info, warn};

use crate::cluster::{node_id, node_name, node_taints, ClusterOps};
use crate::config::{Action, Config};
use crate::cordon;
use crate::error::HibernateError;
use crate::inventory::NodeInventory;
use crate::labels::PAUSE_TAINT;
use crate::policy;
use crate::provider::CloudProvider;
use crate::retry::{retry, RetryPolicy};
use crate::selector;
use crate::state::{self, RunStatus};
use crate::teardown;
use crate::tolerations;

/// Workflow phases, logged on each transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    PolicyChecked,
    NodeSelected,
    Cordoned,
    Tolerated,
    Deleting,
    Untainted,
    Done,
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::PolicyChecked => "policy-checked",
            Phase::NodeSelected => "node-selected",
            Phase::Cordoned => "cordoned",
            Phase::Tolerated => "tolerated",
            Phase::Deleting => "deleting",
            Phase::Untainted => "untainted",
            Phase::Done => "done",
            Phase::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Suspend completed and the cluster reports ready
    Suspended,
    /// Autoscaling was already disabled; treated as a completed idle pause
    AlreadyPaused,
    /// The survivor is the job's own node and the only ready node;
    /// a previous pause already converged
    Converged,
    /// Suspend completed but the cluster does not report ready
    ClusterNotReady,
    /// Resume completed and the policy echo confirmed it
    Resumed,
}

/// The suspend/resume workflow over both control planes
pub struct Orchestrator<'a, C: CastaiApi, K: ClusterOps> {
    api: &'a C,
    ops: &'a K,
    config: &'a Config,
    retry_policy: RetryPolicy,
}

impl<'a, C: CastaiApi, K: ClusterOps> Orchestrator<'a, C, K> {
    /// Build the orchestrator over a CAST AI client and a Kubernetes surface
    pub fn new(api: &'a C, ops: &'a K, config: &'a Config) -> Self {
        Self {
            api,
            ops,
            config,
            retry_policy: RetryPolicy::default(),
        }
    }

    /// Override the retry policy applied to remote passes
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    fn phase(&self, phase: Phase) {
        info!("phase: {}", phase);
    }

    fn inventory(&self) -> NodeInventory<'_, C> {
        NodeInventory::new(
            self.api,
            &self.config.cluster_id,
            self.retry_policy,
            self.config.timings.operation_poll_interval,
        )
    }

    /// Run the configured action to completion
    pub async fn run(&self) -> Result<RunOutcome, HibernateError> {
        self.phase(Phase::Idle);
        match self.config.action {
            Action::Resume => self.resume().await,
            Action::Suspend => self.suspend().await,
        }
    }

    /// Enable autoscaling again. The policy echo must confirm the flag.
    pub async fn resume(&self) -> Result<RunOutcome, HibernateError> {
        info!("Resuming cluster, autoscaling will be enabled");
        let confirmed = policy::set_autoscaler_enabled(
            self.api,
            &self.retry_policy,
            &self.config.cluster_id,
            true,
        )
        .await?;
        if !confirmed {
            return Err(HibernateError::PolicyNotConfirmed);
        }
        info!("Resume operation completed");
        Ok(RunOutcome::Resumed)
    }

    /// Disable autoscaling and consolidate onto one surviving node.
    ///
    /// Failures before any state was mutated abort without compensation;
    /// once the autoscaler has been touched, a failure resumes the
    /// cluster and records an exception.
    pub async fn suspend(&self) -> Result<RunOutcome, HibernateError> {
        let provider = self.resolve_provider().await?;
        info!(
            "Hibernation input parameters clusterId: {}, cloud: {}",
            self.config.cluster_id, provider
        );

        if let Some(outcome) = self.already_paused().await? {
            return Ok(outcome);
        }

        match self.pause(provider).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                self.phase(Phase::Failed);
                error!("Hibernation failed, resuming cluster: {}", err);
                if let Err(resume_err) = self.resume().await {
                    error!("Compensating resume failed: {}", resume_err);
                }
                if let Err(state_err) =
                    state::record_status(self.ops, RunStatus::Exception).await
                {
                    error!("Failed to record run status: {}", state_err);
                }
                Err(err)
            }
        }
    }

    /// Detect the cloud provider from the API, falling back to the
    /// configured value. Undeterminable is fatal.
    async fn resolve_provider(&self) -> Result<CloudProvider, HibernateError> {
        let reported = retry(&self.retry_policy, "get_cluster", || {
            self.api.get_cluster(&self.config.cluster_id)
        })
        .await
        .map_err(|err| {
            error!(
                "could not detect cloud provider, check API key or network problems: {}",
                err
            );
            HibernateError::ProviderUndetectable
        })?
        .provider_type;

        let name = match reported {
            Some(name) => {
                info!("Cloud {} auto-detected from cluster details", name);
                name
            }
            None => match &self.config.cloud_fallback {
                Some(name) => {
                    warn!("Cloud NOT detected, falling back to configured value");
                    name.clone()
                }
                None => return Err(HibernateError::ProviderUndetectable),
            },
        };
        name.parse()
            .map_err(|_| HibernateError::ProviderUndetectable)
    }

    /// When autoscaling is already disabled, the cluster is paused or a
    /// pause died recently. Dirty recent state is fatal; otherwise this
    /// run is a no-op.
    async fn already_paused(&self) -> Result<Option<RunOutcome>, HibernateError> {
        let policies = retry(&self.retry_policy, "get_policies", || {
            self.api.get_policies(&self.config.cluster_id)
        })
        .await?;
        if policies.enabled {
            return Ok(None);
        }

        info!("Cluster already has autoscaler policies disabled, checking for dirty state");
        let record = state::last_run(self.ops).await?;
        if record.is_dirty(Utc::now()) {
            return Err(HibernateError::DirtyState);
        }

        // Settle so a concurrent run that just finished is not raced
        tokio::time::sleep(self.config.timings.double_run_settle).await;
        let nodes = self.inventory().list().await?;
        info!("Number of nodes found in the cluster: {}", nodes.len());
        info!("Cluster already has autoscaler policies disabled, exiting");
        Ok(Some(RunOutcome::AlreadyPaused))
    }

    /// The provider node id of the node this job pod runs on, if known
    async fn own_node_id(&self) -> Result<Option<String>, HibernateError> {
        let Some(name) = &self.config.my_node_name else {
            return Ok(None);
        };
        info!("Job pod node name found: {}", name);
        match self.ops.get_node(name).await? {
            Some(node) => Ok(node_id(&node).map(str::to_string)),
            None => {
                warn!("Job pod node {} not found in the cluster", name);
                Ok(None)
            }
        }
    }

    async fn pause(&self, provider: CloudProvider) -> Result<RunOutcome, HibernateError> {
        let confirmed = policy::set_autoscaler_enabled(
            self.api,
            &self.retry_policy,
            &self.config.cluster_id,
            false,
        )
        .await?;
        if !confirmed {
            warn!("Autoscaler disable was not confirmed by the policy echo, continuing");
        }
        self.phase(Phase::PolicyChecked);

        let my_node_id = self.own_node_id().await?;
        let instance_type = self
            .config
            .instance_type_override
            .clone()
            .unwrap_or_else(|| provider.default_instance_type().to_string());
        let inventory = self.inventory();

        let k8s_nodes = self.ops.list_nodes().await?;
        let selected = match selector::choose_candidate(&k8s_nodes, provider, &instance_type) {
            Some(candidate) => {
                info!(
                    "Found suitable hibernation candidate node: {}",
                    candidate.node_name
                );
                selector::apply_candidate(self.ops, &candidate).await?
            }
            None => None,
        };

        // The pause may already have converged: this job pod sits on the
        // survivor and nothing else is ready.
        if let (Some(mine), Some(survivor)) = (my_node_id.as_deref(), selected.as_deref()) {
            if mine == survivor {
                let ready = inventory
                    .list()
                    .await?
                    .iter()
                    .filter(|node| node.is_ready())
                    .count();
                info!("Number of READY nodes found in the cluster: {}", ready);
                if ready == 1 {
                    info!("Hibernation node is the same as job pod node, pause just ran, exiting");
                    return Ok(RunOutcome::Converged);
                }
            }
        }

        let survivor_id = match selected {
            Some(id) => id,
            None => {
                info!("No suitable hibernation node found, creating one");
                selector::create_survivor(&inventory, provider, &instance_type).await?
            }
        };
        self.phase(Phase::NodeSelected);

        // Mandatory readiness re-check before anything destructive
        let survivor_name = inventory
            .node_name_by_id(&survivor_id)
            .await?
            .ok_or(HibernateError::NoReadyHibernationNode)?;
        let survivor = self
            .ops
            .get_node(&survivor_name)
            .await?
            .ok_or(HibernateError::NoReadyHibernationNode)?;
        if !selector::hibernation_ready(&survivor) {
            return Err(HibernateError::NoReadyHibernationNode);
        }
        info!("Hibernation node exists: {}", survivor_id);

        cordon::cordon_all(
            self.ops,
            &self.retry_policy,
            &survivor_id,
            self.config.protect_removal_disabled,
        )
        .await?;
        self.phase(Phase::Cordoned);
        tokio::time::sleep(self.config.timings.cordon_settle).await;

        tolerations::patch_critical_workloads(
            self.ops,
            &self.retry_policy,
            &self.config.extra_namespaces,
        )
        .await?;
        self.phase(Phase::Tolerated);
        // Let CoreDNS and the other critical pods land on the survivor
        // before their current nodes disappear
        tokio::time::sleep(self.config.timings.toleration_settle).await;

        self.phase(Phase::Deleting);
        let deferred = my_node_id
            .as_deref()
            .filter(|mine| *mine != survivor_id.as_str());
        if deferred.is_some() {
            info!("Job pod node and hibernation node are not the same, deferring its deletion");
        }
        teardown::delete_all_except(
            self.api,
            self.ops,
            &self.retry_policy,
            &self.config.cluster_id,
            &survivor_id,
            self.config.protect_removal_disabled,
            deferred,
        )
        .await?;

        self.remove_pause_taint(&survivor_id).await?;
        self.phase(Phase::Untainted);

        if let Some(own) = deferred {
            info!("Deleting the job's own node with id {}", own);
            inventory.delete(own).await?;
        }

        let details = retry(&self.retry_policy, "get_cluster", || {
            self.api.get_cluster(&self.config.cluster_id)
        })
        .await?;
        if details.status == "ready" {
            info!("cluster ready, updating last run status to success");
            state::record_status(self.ops, RunStatus::Success).await?;
            self.phase(Phase::Done);
            info!("Pause operation completed");
            Ok(RunOutcome::Suspended)
        } else {
            state::record_status(self.ops, RunStatus::ClusterNotReady).await?;
            warn!("Pause finished, but cluster is not ready");
            Ok(RunOutcome::ClusterNotReady)
        }
    }

    /// Lift the hibernation taint from the survivor so normal scheduling
    /// resumes there
    async fn remove_pause_taint(&self, survivor_id: &str) -> Result<(), HibernateError> {
        let nodes = self.ops.list_nodes().await?;
        let Some(node) = nodes.iter().find(|node| node_id(node) == Some(survivor_id)) else {
            error!("Survivor node {} not found while removing taint", survivor_id);
            return Err(HibernateError::NoReadyHibernationNode);
        };
        let name = node_name(node);
        let remaining: Vec<Taint> = node_taints(node)
            .iter()
            .filter(|taint| taint.key != PAUSE_TAINT)
            .cloned()
            .collect();
        info!("Removing hibernation taint from node {}", name);
        self.ops
            .patch_node_taints(name, &remaining, &BTreeMap::new())
            .await
    }
}
