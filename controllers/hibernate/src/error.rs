//! Controller-specific error types.
//!
//! This module defines error types specific to the hibernate controller
//! that are not covered by upstream library errors.

use castai_client::CastaiError;
use kube::Error as KubeError;
use thiserror::Error;

/// Errors that can occur in the hibernate controller.
#[derive(Debug, Error)]
pub enum HibernateError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// CAST AI API error
    #[error("CAST AI error: {0}")]
    Castai(#[from] CastaiError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The cloud provider could not be determined
    #[error("could not detect cloud provider, check API key or network problems")]
    ProviderUndetectable,

    /// A previous run did not finish cleanly and is still fresh
    #[error("cluster is already paused, but the last run was dirty; clean the state ConfigMap to retry or wait 12h")]
    DirtyState,

    /// No node survived the selection and readiness checks
    #[error("no ready hibernation node exists")]
    NoReadyHibernationNode,

    /// The policy API echo did not confirm the applied value
    #[error("autoscaler policy update was not confirmed by the API")]
    PolicyNotConfirmed,

    /// The pause completed but the cluster did not report ready
    #[error("pause finished, but the cluster is not ready")]
    ClusterNotReady,
}
