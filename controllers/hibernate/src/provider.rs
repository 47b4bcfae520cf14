//! Cloud provider table.
//!
//! The three supported providers differ in their default hibernation
//! instance type, the label set attached to nodes created for hibernation,
//! and whether small "system" nodes are mandatory infrastructure (AKS).
//! All provider-specific data lives here; the rest of the controller
//! consults the variant instead of branching on provider-name strings.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use k8s_openapi::api::core::v1::Node;

use crate::cluster::{node_cpu_capacity, node_label};
use crate::error::HibernateError;
use crate::labels::{PAUSED_CLUSTER_LABEL, SPOT_FALLBACK_LABEL, SPOT_LABEL};

/// AKS node-pool mode label; `system` marks mandatory infrastructure nodes
pub const AKS_MODE_LABEL: &str = "kubernetes.azure.com/mode";

/// The closed set of supported cloud providers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloudProvider {
    Gke,
    Eks,
    Aks,
}

impl CloudProvider {
    /// Default instance type used for the hibernation node.
    ///
    /// Not all instance types are available in all regions; an explicit
    /// override always takes precedence over this table.
    pub fn default_instance_type(&self) -> &'static str {
        match self {
            CloudProvider::Gke => "e2-standard-2",
            CloudProvider::Eks => "m5a.large",
            CloudProvider::Aks => "Standard_D2as_v5",
        }
    }

    /// Labels attached to a node created for hibernation.
    ///
    /// AKS nodes must additionally be created in the `system` node-pool
    /// mode so the cluster keeps a system node while paused.
    pub fn creation_labels(&self) -> BTreeMap<String, String> {
        let mut labels = BTreeMap::new();
        labels.insert(PAUSED_CLUSTER_LABEL.to_string(), "true".to_string());
        labels.insert(SPOT_LABEL.to_string(), "true".to_string());
        labels.insert(SPOT_FALLBACK_LABEL.to_string(), "true".to_string());
        if *self == CloudProvider::Aks {
            labels.insert(AKS_MODE_LABEL.to_string(), "system".to_string());
        }
        labels
    }

    /// Label selector identifying this provider's system nodes, if the
    /// provider has the concept
    pub fn system_node_selector(&self) -> Option<(&'static str, &'static str)> {
        match self {
            CloudProvider::Aks => Some((AKS_MODE_LABEL, "system")),
            _ => None,
        }
    }

    /// Whether the node is one of this provider's small system nodes:
    /// carries the system-node label and has exactly 2 vCPUs
    pub fn is_small_system_node(&self, node: &Node) -> bool {
        let Some((key, value)) = self.system_node_selector() else {
            return false;
        };
        node_label(node, key) == Some(value) && node_cpu_capacity(node) == Some(2)
    }

    /// Whether a node satisfies this provider's system-node constraint.
    ///
    /// Providers without system nodes accept any node.
    pub fn satisfies_system_constraint(&self, node: &Node) -> bool {
        match self.system_node_selector() {
            Some((key, value)) => node_label(node, key) == Some(value),
            None => true,
        }
    }
}

impl FromStr for CloudProvider {
    type Err = HibernateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gke" => Ok(CloudProvider::Gke),
            "eks" => Ok(CloudProvider::Eks),
            "aks" => Ok(CloudProvider::Aks),
            other => Err(HibernateError::InvalidConfig(format!(
                "unknown cloud provider: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for CloudProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CloudProvider::Gke => "GKE",
            CloudProvider::Eks => "EKS",
            CloudProvider::Aks => "AKS",
        };
        write!(f, "{}", name)
    }
}
