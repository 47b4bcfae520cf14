//! Hibernation node selection.
//!
//! Decides which node survives the pause. The decision itself
//! (`choose_candidate`) is a pure function over the node list so the
//! priority ordering is directly testable; applying it (tainting and the
//! mandatory readiness re-check) talks to the API server.
//!
//! Priority order:
//! 1. a node already tainted and labeled for hibernation that passes the
//!    readiness check is reused as-is; a second node is never tainted;
//! 2. on AKS, a ready 2-vCPU system node is converted in place;
//! 3. the oldest ready node of the target instance type that already
//!    carries the paused-cluster label is tainted in place;
//! 4. otherwise a new node must be created.

use std::collections::BTreeMap;

use castai_client::CastaiApi;
use k8s_openapi::api::core::v1::{Node, Taint};
use tracing::{info, warn};

use crate::cluster::{
    node_id, node_is_ready, node_label, node_name, node_taints, node_unschedulable, ClusterOps,
};
use crate::error::HibernateError;
use crate::inventory::NodeInventory;
use crate::labels::{
    INSTANCE_TYPE_LABEL, PAUSED_CLUSTER_LABEL, PAUSE_TAINT, SPOT_FALLBACK_LABEL, SPOT_LABEL,
};
use crate::provider::CloudProvider;

/// How a selected candidate becomes the survivor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateKind {
    /// Already tainted and labeled; nothing to change
    Reuse,
    /// A provider system node converted by adding the taint
    ConvertSystemNode,
    /// An existing labeled node tainted in place
    TaintInPlace,
}

/// A node chosen by the decision procedure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub node_name: String,
    pub kind: CandidateKind,
}

/// Whether a node is fit to carry the paused cluster: Ready, schedulable,
/// and carrying no taint other than the hibernation taint
pub fn hibernation_ready(node: &Node) -> bool {
    node_is_ready(node)
        && !node_unschedulable(node)
        && node_taints(node).iter().all(|taint| taint.key == PAUSE_TAINT)
}

fn has_pause_taint(node: &Node) -> bool {
    node_taints(node).iter().any(|taint| taint.key == PAUSE_TAINT)
}

/// Pick the survivor candidate from the node list, in priority order.
/// Returns `None` when a new node has to be created instead.
pub fn choose_candidate(
    nodes: &[Node],
    provider: CloudProvider,
    instance_type: &str,
) -> Option<Candidate> {
    if let Some(node) = nodes.iter().find(|node| {
        has_pause_taint(node)
            && node_label(node, PAUSED_CLUSTER_LABEL).is_some()
            && hibernation_ready(node)
    }) {
        return Some(Candidate {
            node_name: node_name(node).to_string(),
            kind: CandidateKind::Reuse,
        });
    }

    if let Some(node) = nodes.iter().find(|node| {
        provider.is_small_system_node(node) && node_is_ready(node) && !node_unschedulable(node)
    }) {
        return Some(Candidate {
            node_name: node_name(node).to_string(),
            kind: CandidateKind::ConvertSystemNode,
        });
    }

    nodes
        .iter()
        .filter(|node| {
            node_is_ready(node)
                && !node_unschedulable(node)
                && node_label(node, INSTANCE_TYPE_LABEL) == Some(instance_type)
                && node_label(node, PAUSED_CLUSTER_LABEL).is_some()
                && provider.satisfies_system_constraint(node)
        })
        .min_by_key(|node| node.metadata.creation_timestamp.as_ref().map(|time| time.0))
        .map(|node| Candidate {
            node_name: node_name(node).to_string(),
            kind: CandidateKind::TaintInPlace,
        })
}

fn paused_labels() -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert(PAUSED_CLUSTER_LABEL.to_string(), "true".to_string());
    labels.insert(SPOT_LABEL.to_string(), "true".to_string());
    labels.insert(SPOT_FALLBACK_LABEL.to_string(), "true".to_string());
    labels
}

/// Taint the candidate if needed, then re-check readiness.
///
/// Returns the survivor's provider node id, or `None` when the candidate
/// accepted the taint but failed the re-check; the caller then falls
/// back to creating a fresh node.
pub async fn apply_candidate<K: ClusterOps + ?Sized>(
    ops: &K,
    candidate: &Candidate,
) -> Result<Option<String>, HibernateError> {
    if candidate.kind != CandidateKind::Reuse {
        let Some(node) = ops.get_node(&candidate.node_name).await? else {
            warn!("Candidate node {} disappeared", candidate.node_name);
            return Ok(None);
        };
        let mut taints: Vec<Taint> = node_taints(&node).to_vec();
        if !has_pause_taint(&node) {
            taints.push(Taint {
                key: PAUSE_TAINT.to_string(),
                effect: "NoSchedule".to_string(),
                ..Default::default()
            });
        }
        info!("patching node {} with hibernation taint", candidate.node_name);
        ops.patch_node_taints(&candidate.node_name, &taints, &paused_labels())
            .await?;
    }

    let Some(node) = ops.get_node(&candidate.node_name).await? else {
        warn!("Candidate node {} disappeared", candidate.node_name);
        return Ok(None);
    };
    if !hibernation_ready(&node) {
        warn!(
            "Candidate node {} is not ready for hibernation after tainting",
            candidate.node_name
        );
        return Ok(None);
    }
    Ok(node_id(&node).map(str::to_string))
}

/// Create a fresh survivor node with the hibernation taint and the
/// provider's label set attached at creation time. Returns its node id.
pub async fn create_survivor<C: CastaiApi + ?Sized>(
    inventory: &NodeInventory<'_, C>,
    provider: CloudProvider,
    instance_type: &str,
) -> Result<String, HibernateError> {
    info!(
        "Creating {} hibernation node ({})",
        instance_type, provider
    );
    inventory
        .create_node_and_wait(instance_type, Some(PAUSE_TAINT), provider.creation_labels())
        .await
}
