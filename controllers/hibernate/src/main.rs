//! Hibernate job
//!
//! Pauses and resumes a CAST AI managed Kubernetes cluster:
//! - suspend: disable autoscaling, consolidate the critical workloads onto
//!   one surviving low-cost node and delete every other node
//! - resume: re-enable autoscaling and let the autoscaler rebuild capacity
//!
//! Runs as a one-shot job, typically from a CronJob inside the cluster it
//! pauses. Exits nonzero on any unrecovered failure.

mod cluster;
mod config;
mod cordon;
mod error;
mod inventory;
mod labels;
mod orchestrator;
mod policy;
mod provider;
mod retry;
mod selector;
mod state;
mod teardown;
mod tolerations;

#[cfg(test)]
mod test_utils;
#[cfg(test)]
mod orchestrator_test;

use castai_client::CastaiClient;
use tracing::info;

use crate::cluster::KubeCluster;
use crate::config::Config;
use crate::error::HibernateError;
use crate::orchestrator::{Orchestrator, RunOutcome};

#[tokio::main]
async fn main() -> Result<(), HibernateError> {
    tracing_subscriber::fmt::init();

    info!("Starting hibernate");

    let config = Config::from_env()?;
    let api = CastaiClient::new(config.api_url.clone(), config.api_key.clone())?;
    let kube_client = kube::Client::try_default().await?;
    let ops = KubeCluster::new(kube_client);

    let outcome = Orchestrator::new(&api, &ops, &config).run().await?;
    if outcome == RunOutcome::ClusterNotReady {
        // The pause itself completed; the nonzero exit flags the cluster
        // state for the operator without re-enabling autoscaling
        return Err(HibernateError::ClusterNotReady);
    }
    Ok(())
}
