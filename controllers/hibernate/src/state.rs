//! Persisted run-state record.
//!
//! A ConfigMap in the agent namespace records how the previous invocation
//! ended. The record is advisory (read-then-act, not a lock); its only job
//! is to stop a new suspend from running over the debris of a recent
//! failed one. A non-success record older than the freshness window is
//! treated as stale and no longer blocks.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use tracing::{info, warn};

use crate::cluster::ClusterOps;
use crate::error::HibernateError;

/// Namespace holding the run-state ConfigMap
pub const STATE_NAMESPACE: &str = "castai-agent";
/// Name of the run-state ConfigMap
pub const STATE_CONFIGMAP: &str = "castai-hibernate-state";

const STATUS_KEY: &str = "last_run_status";
const TIME_KEY: &str = "last_run_time";
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// How long a non-success record blocks a new suspend run
pub fn freshness_window() -> TimeDelta {
    TimeDelta::hours(12)
}

/// Outcome recorded for a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// The run finished cleanly
    Success,
    /// The pause finished but the cluster did not report ready
    ClusterNotReady,
    /// The run died before finishing
    Exception,
}

impl RunStatus {
    /// Wire form stored in the ConfigMap
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Success => "success",
            RunStatus::ClusterNotReady => "cluster-not-ready",
            RunStatus::Exception => "exception",
        }
    }

    /// Parse the stored form; anything unrecognized counts as a failure
    pub fn parse(s: &str) -> Self {
        match s {
            "success" => RunStatus::Success,
            "cluster-not-ready" => RunStatus::ClusterNotReady,
            _ => RunStatus::Exception,
        }
    }
}

/// The previous run's recorded outcome and completion time
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub status: RunStatus,
    /// `None` when the stored timestamp was missing or unparseable
    pub time: Option<DateTime<Utc>>,
}

impl RunRecord {
    /// Whether this record must block a new suspend run: the run did not
    /// succeed and is still inside the freshness window. A missing or
    /// unparseable timestamp counts as stale, so a corrupted record
    /// permits a retry rather than wedging the cluster.
    pub fn is_dirty(&self, now: DateTime<Utc>) -> bool {
        if self.status == RunStatus::Success {
            return false;
        }
        match self.time {
            Some(time) => now.signed_duration_since(time) < freshness_window(),
            None => false,
        }
    }
}

fn parse_time(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, TIME_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Read the previous run record, lazily creating the default one
/// (`success` at the epoch) when the ConfigMap does not exist yet.
pub async fn last_run<K: ClusterOps + ?Sized>(ops: &K) -> Result<RunRecord, HibernateError> {
    if let Some(data) = ops.read_config_map(STATE_NAMESPACE, STATE_CONFIGMAP).await? {
        let status = data
            .get(STATUS_KEY)
            .map(|raw| RunStatus::parse(raw))
            .unwrap_or(RunStatus::Success);
        let time = data.get(TIME_KEY).and_then(|raw| {
            let parsed = parse_time(raw);
            if parsed.is_none() {
                warn!("Unparseable {} in run-state ConfigMap: {}", TIME_KEY, raw);
            }
            parsed
        });
        return Ok(RunRecord { status, time });
    }

    info!(
        "Run-state ConfigMap {}/{} not found, creating default",
        STATE_NAMESPACE, STATE_CONFIGMAP
    );
    let epoch = DateTime::<Utc>::UNIX_EPOCH;
    let mut data = BTreeMap::new();
    data.insert(STATUS_KEY.to_string(), RunStatus::Success.as_str().to_string());
    data.insert(TIME_KEY.to_string(), epoch.format(TIME_FORMAT).to_string());
    ops.write_config_map(STATE_NAMESPACE, STATE_CONFIGMAP, &data)
        .await?;
    Ok(RunRecord {
        status: RunStatus::Success,
        time: Some(epoch),
    })
}

/// Record this run's outcome with the current time
pub async fn record_status<K: ClusterOps + ?Sized>(
    ops: &K,
    status: RunStatus,
) -> Result<(), HibernateError> {
    let mut data = BTreeMap::new();
    data.insert(STATUS_KEY.to_string(), status.as_str().to_string());
    data.insert(
        TIME_KEY.to_string(),
        Utc::now().format(TIME_FORMAT).to_string(),
    );
    info!("Recording run status: {}", status.as_str());
    ops.write_config_map(STATE_NAMESPACE, STATE_CONFIGMAP, &data)
        .await
}
