//! CAST AI REST API Client
//!
//! A Rust client library for the subset of the CAST AI REST API used by the
//! hibernate controller: cluster details, cluster-scoped autoscaling
//! policies, external-cluster node lifecycle and long-running operation
//! polling.
//!
//! # Example
//!
//! ```no_run
//! use castai_client::{CastaiApi, CastaiClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Create a client
//! let client = CastaiClient::new(
//!     "https://api.cast.ai".to_string(),
//!     "your-api-key".to_string(),
//! )?;
//!
//! // Check the cluster
//! let cluster = client.get_cluster("cluster-id").await?;
//! println!("cluster status: {}", cluster.status);
//!
//! // List its nodes
//! let nodes = client.list_nodes("cluster-id").await?;
//! println!("{} nodes", nodes.len());
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **Policies**: read-modify-write of the autoscaling policy document,
//!   preserving fields the caller does not interpret
//! - **Node lifecycle**: list, create (asynchronous, operation-polled) and
//!   drain-delete nodes through the mothership
//! - **Mocking**: `CastaiApi` trait plus an in-memory mock behind the
//!   `test-util` feature

pub mod client;
pub mod error;
pub mod models;
#[path = "trait.rs"]
pub mod castai_trait;
#[cfg(feature = "test-util")]
pub mod mock;

pub use castai_trait::CastaiApi;
pub use client::CastaiClient;
pub use error::CastaiError;
pub use models::*;
#[cfg(feature = "test-util")]
pub use mock::MockCastaiClient;
