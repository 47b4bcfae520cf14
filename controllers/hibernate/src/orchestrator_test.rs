//! End-to-end tests for the suspend/resume workflow.
//!
//! The orchestrator runs against in-memory mocks of both control planes;
//! a shared journal records mutating calls so cross-plane ordering is
//! assertable. The paused tokio clock makes the settle delays and
//! operation polls elapse instantly.

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::time::Duration;

    use castai_client::{CastaiApi, MockCastaiClient};
    use chrono::{TimeDelta, Utc};

    use crate::cluster::{node_taints, ClusterOps};
    use crate::config::{Action, Config, Timings};
    use crate::error::HibernateError;
    use crate::labels::{NODE_ID_LABEL, PAUSED_CLUSTER_LABEL, PAUSE_TAINT};
    use crate::orchestrator::{Orchestrator, RunOutcome};
    use crate::retry::RetryPolicy;
    use crate::state::{STATE_CONFIGMAP, STATE_NAMESPACE};
    use crate::test_utils::{fleet_node, MockCluster, NodeBuilder};

    fn test_config(action: Action) -> Config {
        Config {
            api_url: "https://api.cast.ai".to_string(),
            api_key: "test-key".to_string(),
            cluster_id: "c-1".to_string(),
            action,
            cloud_fallback: None,
            instance_type_override: None,
            extra_namespaces: Vec::new(),
            protect_removal_disabled: false,
            my_node_name: None,
            timings: Timings {
                double_run_settle: Duration::ZERO,
                cordon_settle: Duration::ZERO,
                toleration_settle: Duration::ZERO,
                operation_poll_interval: Duration::from_millis(10),
            },
        }
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            delay: Duration::from_millis(10),
        }
    }

    async fn run(
        api: &MockCastaiClient,
        ops: &MockCluster,
        config: &Config,
    ) -> Result<RunOutcome, HibernateError> {
        Orchestrator::new(api, ops, config)
            .with_retry_policy(fast_retry())
            .run()
            .await
    }

    async fn write_run_state(ops: &MockCluster, status: &str, age: TimeDelta) {
        let mut data = BTreeMap::new();
        data.insert("last_run_status".to_string(), status.to_string());
        data.insert(
            "last_run_time".to_string(),
            (Utc::now() - age).format("%Y-%m-%d %H:%M:%S").to_string(),
        );
        ops.write_config_map(STATE_NAMESPACE, STATE_CONFIGMAP, &data)
            .await
            .unwrap();
    }

    async fn run_status(ops: &MockCluster) -> Option<String> {
        ops.read_config_map(STATE_NAMESPACE, STATE_CONFIGMAP)
            .await
            .unwrap()
            .and_then(|data| data.get("last_run_status").cloned())
    }

    /// Scenario A: three ready nodes, autoscaling enabled, nothing tainted
    /// yet. The run must create a survivor, end with exactly one fleet
    /// node carrying no hibernation taint, autoscaling disabled, and a
    /// success record.
    #[tokio::test(start_paused = true)]
    async fn test_suspend_creates_survivor_and_tears_down() {
        let api = MockCastaiClient::new("c-1");
        let ops = MockCluster::with_journal(api.journal_handle());
        for i in 1..=3 {
            let id = format!("id-{}", i);
            let name = format!("worker-{}", i);
            api.add_existing_node(fleet_node(&id, &name, "ready"));
            ops.insert_node(NodeBuilder::new(&name).node_id(&id).ready(true).build());
        }
        let hook_ops = ops.clone();
        api.set_node_created_hook(Arc::new(move |id, name| {
            hook_ops.insert_node(
                NodeBuilder::new(name)
                    .node_id(id)
                    .label(PAUSED_CLUSTER_LABEL, "true")
                    .taint(PAUSE_TAINT)
                    .ready(true)
                    .build(),
            );
        }));

        let config = test_config(Action::Suspend);
        let outcome = run(&api, &ops, &config).await.unwrap();

        assert_eq!(outcome, RunOutcome::Suspended);
        assert!(!api.autoscaler_enabled());

        // Exactly the created node survives on the fleet side
        let remaining = api.list_nodes("c-1").await.unwrap();
        assert_eq!(remaining.len(), 1);
        let survivor_id = remaining[0].id.clone();
        let survivor_name = remaining[0].name.clone();
        for i in 1..=3 {
            assert!(api.deleted_nodes().contains(&format!("id-{}", i)));
        }

        // The taint was removed after teardown
        let survivor = ops.node(&survivor_name).unwrap();
        assert!(node_taints(&survivor)
            .iter()
            .all(|taint| taint.key != PAUSE_TAINT));
        assert_eq!(
            survivor
                .metadata
                .labels
                .as_ref()
                .and_then(|l| l.get(NODE_ID_LABEL))
                .map(String::as_str),
            Some(survivor_id.as_str())
        );

        assert_eq!(run_status(&ops).await.as_deref(), Some("success"));
    }

    /// Scenario B: resume on a paused cluster ends with autoscaling
    /// enabled and the echo verified.
    #[tokio::test(start_paused = true)]
    async fn test_resume_enables_and_verifies() {
        let api = MockCastaiClient::new("c-1");
        let ops = MockCluster::new();
        api.set_autoscaler_enabled(false);

        let config = test_config(Action::Resume);
        let outcome = run(&api, &ops, &config).await.unwrap();

        assert_eq!(outcome, RunOutcome::Resumed);
        assert!(api.autoscaler_enabled());
        assert_eq!(api.put_policy_call_count(), 1);
    }

    /// A resume when autoscaling is already enabled must not write
    #[tokio::test(start_paused = true)]
    async fn test_resume_skips_write_when_already_enabled() {
        let api = MockCastaiClient::new("c-1");
        let ops = MockCluster::new();

        let config = test_config(Action::Resume);
        let outcome = run(&api, &ops, &config).await.unwrap();

        assert_eq!(outcome, RunOutcome::Resumed);
        assert_eq!(api.put_policy_call_count(), 0);
    }

    /// Scenario C: the job pod's node is not the survivor. Its deletion
    /// must come only after the survivor's taint was removed.
    #[tokio::test(start_paused = true)]
    async fn test_own_node_deleted_only_after_untaint() {
        let api = MockCastaiClient::new("c-1");
        let ops = MockCluster::with_journal(api.journal_handle());
        api.add_existing_node(fleet_node("id-keep", "keeper", "ready"));
        api.add_existing_node(fleet_node("id-own", "job-node", "ready"));
        ops.insert_node(
            NodeBuilder::new("keeper")
                .node_id("id-keep")
                .label(PAUSED_CLUSTER_LABEL, "true")
                .taint(PAUSE_TAINT)
                .ready(true)
                .build(),
        );
        ops.insert_node(NodeBuilder::new("job-node").node_id("id-own").ready(true).build());

        let mut config = test_config(Action::Suspend);
        config.my_node_name = Some("job-node".to_string());
        let outcome = run(&api, &ops, &config).await.unwrap();

        assert_eq!(outcome, RunOutcome::Suspended);
        assert_eq!(api.deleted_nodes(), vec!["id-own".to_string()]);

        let journal = ops.journal();
        let untaint = journal
            .iter()
            .position(|event| event == "patch_taints:keeper:[]")
            .expect("survivor taint removal must be journaled");
        let own_delete = journal
            .iter()
            .position(|event| event == "delete_node:id-own")
            .expect("own node deletion must be journaled");
        assert!(
            untaint < own_delete,
            "own node must only be deleted after the survivor's taint is removed: {:?}",
            journal
        );
    }

    /// Suspending an already-paused cluster is a no-op and must not touch
    /// the surviving node, no matter how often it is invoked.
    #[tokio::test(start_paused = true)]
    async fn test_second_suspend_is_noop() {
        let api = MockCastaiClient::new("c-1");
        let ops = MockCluster::new();
        api.set_autoscaler_enabled(false);
        api.add_existing_node(fleet_node("id-keep", "keeper", "ready"));
        ops.insert_node(
            NodeBuilder::new("keeper")
                .node_id("id-keep")
                .label(PAUSED_CLUSTER_LABEL, "true")
                .ready(true)
                .build(),
        );

        let config = test_config(Action::Suspend);
        for _ in 0..2 {
            let outcome = run(&api, &ops, &config).await.unwrap();
            assert_eq!(outcome, RunOutcome::AlreadyPaused);
        }

        assert!(api.deleted_nodes().is_empty());
        assert_eq!(api.put_policy_call_count(), 0);
        assert_eq!(api.list_nodes("c-1").await.unwrap().len(), 1);
    }

    /// A converged pause: the job pod already sits on the tainted
    /// survivor and it is the only ready node.
    #[tokio::test(start_paused = true)]
    async fn test_converged_pause_exits_without_mutating() {
        let api = MockCastaiClient::new("c-1");
        let ops = MockCluster::with_journal(api.journal_handle());
        api.add_existing_node(fleet_node("id-keep", "keeper", "ready"));
        ops.insert_node(
            NodeBuilder::new("keeper")
                .node_id("id-keep")
                .label(PAUSED_CLUSTER_LABEL, "true")
                .taint(PAUSE_TAINT)
                .ready(true)
                .build(),
        );

        let mut config = test_config(Action::Suspend);
        config.my_node_name = Some("keeper".to_string());
        let outcome = run(&api, &ops, &config).await.unwrap();

        assert_eq!(outcome, RunOutcome::Converged);
        assert!(api.deleted_nodes().is_empty());
        assert!(!ops.journal().iter().any(|e| e.starts_with("add_node")));
    }

    /// Dirty-state guard: a fresh non-success record blocks the run
    /// before anything is mutated; a stale one does not.
    #[tokio::test(start_paused = true)]
    async fn test_dirty_state_guard() {
        let api = MockCastaiClient::new("c-1");
        let ops = MockCluster::new();
        api.set_autoscaler_enabled(false);
        api.add_existing_node(fleet_node("id-keep", "keeper", "ready"));
        write_run_state(&ops, "exception", TimeDelta::hours(1)).await;

        let config = test_config(Action::Suspend);
        let err = run(&api, &ops, &config).await.unwrap_err();
        assert!(matches!(err, HibernateError::DirtyState));
        assert!(api.deleted_nodes().is_empty());
        assert_eq!(api.put_policy_call_count(), 0);

        // Older than the freshness window: treated as stale, run proceeds
        write_run_state(&ops, "exception", TimeDelta::hours(13)).await;
        let outcome = run(&api, &ops, &config).await.unwrap();
        assert_eq!(outcome, RunOutcome::AlreadyPaused);
    }

    /// A failure after the autoscaler was disabled triggers the
    /// compensating resume and records an exception.
    #[tokio::test(start_paused = true)]
    async fn test_failed_suspend_resumes_and_records_exception() {
        let api = MockCastaiClient::new("c-1");
        let ops = MockCluster::with_journal(api.journal_handle());
        api.add_existing_node(fleet_node("id-keep", "keeper", "ready"));
        api.add_existing_node(fleet_node("id-1", "worker-1", "ready"));
        ops.insert_node(
            NodeBuilder::new("keeper")
                .node_id("id-keep")
                .label(PAUSED_CLUSTER_LABEL, "true")
                .taint(PAUSE_TAINT)
                .ready(true)
                .build(),
        );
        ops.insert_node(NodeBuilder::new("worker-1").node_id("id-1").ready(true).build());
        // Teardown can never succeed
        api.inject_failures("delete_node", 10);

        let config = test_config(Action::Suspend);
        let err = run(&api, &ops, &config).await.unwrap_err();

        assert!(matches!(err, HibernateError::Castai(_)));
        assert!(api.autoscaler_enabled(), "compensating resume must re-enable");
        assert_eq!(run_status(&ops).await.as_deref(), Some("exception"));
    }

    /// A completed pause on a cluster that does not report ready records
    /// cluster-not-ready and does not resume.
    #[tokio::test(start_paused = true)]
    async fn test_unready_cluster_is_recorded_not_compensated() {
        let api = MockCastaiClient::new("c-1");
        let ops = MockCluster::with_journal(api.journal_handle());
        api.set_cluster("warning", Some("gke"));
        api.add_existing_node(fleet_node("id-keep", "keeper", "ready"));
        api.add_existing_node(fleet_node("id-1", "worker-1", "ready"));
        ops.insert_node(
            NodeBuilder::new("keeper")
                .node_id("id-keep")
                .label(PAUSED_CLUSTER_LABEL, "true")
                .taint(PAUSE_TAINT)
                .ready(true)
                .build(),
        );
        ops.insert_node(NodeBuilder::new("worker-1").node_id("id-1").ready(true).build());

        let config = test_config(Action::Suspend);
        let outcome = run(&api, &ops, &config).await.unwrap();

        assert_eq!(outcome, RunOutcome::ClusterNotReady);
        assert_eq!(run_status(&ops).await.as_deref(), Some("cluster-not-ready"));
        assert!(
            !api.autoscaler_enabled(),
            "cluster-not-ready must not trigger the compensating resume"
        );
    }

    /// The instance type override beats the provider default when a node
    /// has to be created.
    #[tokio::test(start_paused = true)]
    async fn test_instance_type_override_is_used_for_creation() {
        let api = MockCastaiClient::new("c-1");
        let ops = MockCluster::with_journal(api.journal_handle());
        api.add_existing_node(fleet_node("id-1", "worker-1", "ready"));
        ops.insert_node(NodeBuilder::new("worker-1").node_id("id-1").ready(true).build());
        let hook_ops = ops.clone();
        api.set_node_created_hook(Arc::new(move |id, name| {
            hook_ops.insert_node(
                NodeBuilder::new(name)
                    .node_id(id)
                    .label(PAUSED_CLUSTER_LABEL, "true")
                    .taint(PAUSE_TAINT)
                    .ready(true)
                    .build(),
            );
        }));

        let mut config = test_config(Action::Suspend);
        config.instance_type_override = Some("e2-small".to_string());
        run(&api, &ops, &config).await.unwrap();

        assert!(ops.journal().contains(&"add_node:e2-small".to_string()));
    }
}
