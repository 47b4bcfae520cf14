//! Toleration patching for workloads that must keep running while paused.
//!
//! The survivor node carries the hibernation taint, so anything that has
//! to keep running needs a matching toleration. Two tiers are patched:
//! system-critical workloads are selected cluster-wide by priority class,
//! product-critical workloads by namespace allow-list.

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Toleration;
use tracing::info;

use crate::cluster::ClusterOps;
use crate::error::HibernateError;
use crate::labels::PAUSE_TAINT;
use crate::retry::{retry, RetryPolicy};

/// Namespaces whose deployments always keep running on the survivor
pub const NAMESPACES_TO_KEEP: &[&str] = &["castai-pod-node-lifecycle", "kube-system"];

/// The two Kubernetes system-critical priority classes
pub const SYSTEM_PRIORITY_CLASSES: &[&str] = &["system-cluster-critical", "system-node-critical"];

fn deployment_name(deployment: &Deployment) -> &str {
    deployment.metadata.name.as_deref().unwrap_or("")
}

fn deployment_namespace(deployment: &Deployment) -> &str {
    deployment.metadata.namespace.as_deref().unwrap_or("default")
}

fn pod_tolerations(deployment: &Deployment) -> &[Toleration] {
    deployment
        .spec
        .as_ref()
        .and_then(|spec| spec.template.spec.as_ref())
        .and_then(|pod| pod.tolerations.as_deref())
        .unwrap_or(&[])
}

/// Whether the deployment's pod template already tolerates the key.
/// An absent or empty toleration list does not tolerate anything.
pub fn tolerates(deployment: &Deployment, key: &str) -> bool {
    pod_tolerations(deployment)
        .iter()
        .any(|toleration| toleration.key.as_deref() == Some(key))
}

/// Whether the deployment's pod template uses a system-critical priority class
pub fn has_system_priority(deployment: &Deployment) -> bool {
    deployment
        .spec
        .as_ref()
        .and_then(|spec| spec.template.spec.as_ref())
        .and_then(|pod| pod.priority_class_name.as_deref())
        .is_some_and(|class| SYSTEM_PRIORITY_CLASSES.contains(&class))
}

/// The toleration list with the key appended, or `None` when the
/// deployment already tolerates it and no patch is needed
pub fn with_toleration(deployment: &Deployment, key: &str) -> Option<Vec<Toleration>> {
    if tolerates(deployment, key) {
        return None;
    }
    let mut tolerations = pod_tolerations(deployment).to_vec();
    tolerations.push(Toleration {
        key: Some(key.to_string()),
        operator: Some("Exists".to_string()),
        effect: Some("NoSchedule".to_string()),
        ..Default::default()
    });
    Some(tolerations)
}

/// Patch the deployment's pod template to tolerate the key, if it does
/// not already
pub async fn ensure_toleration<K: ClusterOps + ?Sized>(
    ops: &K,
    deployment: &Deployment,
    key: &str,
) -> Result<(), HibernateError> {
    let Some(tolerations) = with_toleration(deployment, key) else {
        info!(
            "Deployment {}/{} already tolerates {}",
            deployment_namespace(deployment),
            deployment_name(deployment),
            key
        );
        return Ok(());
    };
    info!(
        "Patching and restarting: {}/{}",
        deployment_namespace(deployment),
        deployment_name(deployment)
    );
    ops.patch_deployment_tolerations(
        deployment_namespace(deployment),
        deployment_name(deployment),
        &tolerations,
    )
    .await
}

/// Grant the hibernation toleration to every workload that must survive
/// the pause: system-critical deployments cluster-wide, plus everything
/// in the kept namespaces.
pub async fn patch_critical_workloads<K: ClusterOps + ?Sized>(
    ops: &K,
    policy: &RetryPolicy,
    extra_namespaces: &[String],
) -> Result<(), HibernateError> {
    retry(policy, "patch_critical_workloads", || async {
        let all = ops.list_deployments_all_namespaces().await?;
        for deployment in all.iter().filter(|d| has_system_priority(d)) {
            ensure_toleration(ops, deployment, PAUSE_TAINT).await?;
        }

        let mut namespaces: Vec<&str> = NAMESPACES_TO_KEEP.to_vec();
        namespaces.extend(extra_namespaces.iter().map(String::as_str));
        for namespace in namespaces {
            info!("additional namespace {} to patch", namespace);
            for deployment in ops.list_deployments(namespace).await? {
                ensure_toleration(ops, &deployment, PAUSE_TAINT).await?;
            }
        }
        Ok(())
    })
    .await
}
