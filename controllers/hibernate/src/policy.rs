//! Autoscaler policy control.
//!
//! The policy document is read-modify-written: fetch the current document,
//! flip only the top-level `enabled` flag, write the whole document back
//! and verify the echoed value. A single unconditional PUT would risk
//! clobbering unrelated policy fields or hiding a write failure.

use castai_client::CastaiApi;
use tracing::info;

use crate::error::HibernateError;
use crate::retry::{retry, RetryPolicy};

/// Set the cluster's autoscaler enabled flag.
///
/// Returns `Ok(true)` when the flag already had the requested value (no
/// write issued) or the write was confirmed by the echoed response, and
/// `Ok(false)` when the echo did not match: a reported failure whose
/// severity the caller decides.
pub async fn set_autoscaler_enabled<C: CastaiApi + ?Sized>(
    api: &C,
    policy: &RetryPolicy,
    cluster_id: &str,
    value: bool,
) -> Result<bool, HibernateError> {
    let current = retry(policy, "get_policies", || api.get_policies(cluster_id)).await?;

    if current.enabled == value {
        info!("skip policy update, autoscaler enabled already {}", value);
        return Ok(true);
    }

    info!(
        "Updating autoscaler policy: current {} future {}",
        current.enabled, value
    );
    let mut updated = current;
    updated.enabled = value;

    let applied = retry(policy, "put_policies", || {
        api.put_policies(cluster_id, &updated)
    })
    .await?;

    if applied.enabled == value {
        info!("Policy update completed");
        Ok(true)
    } else {
        info!("Policy update failed, API echoed enabled={}", applied.enabled);
        Ok(false)
    }
}
