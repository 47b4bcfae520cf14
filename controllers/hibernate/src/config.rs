//! Job configuration.
//!
//! Everything is read from the environment exactly once in `main` and
//! carried as an immutable value; no component reads the environment or
//! mutates shared configuration after startup.

use std::str::FromStr;
use std::time::Duration;

use crate::error::HibernateError;

/// What the job should do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Disable autoscaling and consolidate onto one surviving node
    Suspend,
    /// Re-enable autoscaling and let the autoscaler rebuild capacity
    Resume,
}

impl FromStr for Action {
    type Err = HibernateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "suspend" => Ok(Action::Suspend),
            "resume" => Ok(Action::Resume),
            other => Err(HibernateError::InvalidConfig(format!(
                "ACTION must be \"suspend\" or \"resume\", got \"{}\"",
                other
            ))),
        }
    }
}

/// Settle delays and polling intervals.
///
/// Production defaults; tests zero or shrink them under a paused clock.
#[derive(Debug, Clone, Copy)]
pub struct Timings {
    /// Wait before declaring an already-paused cluster converged, to avoid
    /// racing a concurrent run
    pub double_run_settle: Duration,
    /// Wait after cordoning for scheduler convergence
    pub cordon_settle: Duration,
    /// Wait after patching tolerations so critical pods (DNS, ...) land on
    /// the survivor before other nodes disappear
    pub toleration_settle: Duration,
    /// Interval between polls of a long-running node creation operation
    pub operation_poll_interval: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            double_run_settle: Duration::from_secs(360),
            cordon_settle: Duration::from_secs(20),
            toleration_settle: Duration::from_secs(30),
            operation_poll_interval: Duration::from_secs(60),
        }
    }
}

/// Immutable job configuration, built once at startup
#[derive(Debug, Clone)]
pub struct Config {
    /// CAST AI API base URL
    pub api_url: String,
    /// CAST AI API key
    pub api_key: String,
    /// Target cluster id
    pub cluster_id: String,
    /// suspend or resume
    pub action: Action,
    /// Provider fallback when the API does not report one
    pub cloud_fallback: Option<String>,
    /// Overrides the provider's default hibernation instance type
    pub instance_type_override: Option<String>,
    /// Extra namespaces whose deployments are kept running while paused
    pub extra_namespaces: Vec<String>,
    /// Honor the removal-protection label during cordon and teardown
    pub protect_removal_disabled: bool,
    /// Kubernetes node name the job pod itself runs on, if in-cluster
    pub my_node_name: Option<String>,
    /// Settle delays and poll intervals
    pub timings: Timings,
}

impl Config {
    /// Build the configuration from process environment variables
    pub fn from_env() -> Result<Self, HibernateError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn required(
        lookup: &impl Fn(&str) -> Option<String>,
        key: &str,
    ) -> Result<String, HibernateError> {
        lookup(key).filter(|v| !v.is_empty()).ok_or_else(|| {
            HibernateError::InvalidConfig(format!("{} environment variable is required", key))
        })
    }

    /// Build the configuration from an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, HibernateError> {
        let action = Self::required(&lookup, "ACTION")?.parse()?;
        let api_key = Self::required(&lookup, "API_KEY")?;
        let cluster_id = Self::required(&lookup, "CLUSTER_ID")?;
        let api_url =
            lookup("API_URL").unwrap_or_else(|| "https://api.cast.ai".to_string());

        let extra_namespaces = lookup("NAMESPACES_TO_KEEP")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|ns| !ns.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let protect_removal_disabled = lookup("PROTECT_REMOVAL_DISABLED")
            .map(|v| !matches!(v.as_str(), "" | "0" | "false"))
            .unwrap_or(false);

        Ok(Self {
            api_url,
            api_key,
            cluster_id,
            action,
            cloud_fallback: lookup("CLOUD").filter(|v| !v.is_empty()),
            instance_type_override: lookup("HIBERNATE_NODE").filter(|v| !v.is_empty()),
            extra_namespaces,
            protect_removal_disabled,
            my_node_name: lookup("MY_NODE_NAME").filter(|v| !v.is_empty()),
            timings: Timings::default(),
        })
    }
}
