//! nOps Provider
//!
//! An infrastructure-as-code provider that onboards AWS accounts to the
//! [nOps](https://nops.io) platform. It exposes three resources and one data
//! source to a host that drives them through [`ProviderService`]:
//!
//! - **`nops_project`**: reconciles an AWS account against the projects nOps
//!   already knows about. It adopts a project the backend discovered on its
//!   own, creates one when none exists, and refuses to take over an account
//!   another project has already onboarded.
//! - **`nops_integration`**: tells nOps that the IAM role, CUR bucket and
//!   external id for an account are in place.
//! - **`nops_notification`**: the same event, with state mirrored from the
//!   project record nOps keeps for the account.
//! - **`nops_projects`** (data source): every project visible to the API key.
//!
//! nOps has no delete API for any of these, so deleting a resource only
//! removes it from the host's state.
//!
//! # Quick Start
//!
//! ```ignore
//! use nops_provider::{init_logging, NopsProvider, ProviderService};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     init_logging();
//!
//!     let provider = NopsProvider::new(env!("CARGO_PKG_VERSION"));
//!     // Falls back to NOPS_API_KEY and NOPS_HOST when the block leaves them out.
//!     provider.configure(json!({})).await?;
//!
//!     let projects = provider.read_data_source("nops_projects", json!({})).await?;
//!     println!("{}", projects["projects"]);
//!     Ok(())
//! }
//! ```
//!
//! # Layers
//!
//! - [`client`]: the `reqwest` nOps REST client behind the [`NopsApi`] trait
//! - [`reconcile`]: the decision procedure for binding a project to an account
//! - [`resources`]: per-type schema and CRUD handlers
//! - [`provider`]: [`NopsProvider`], which dispatches host calls to the handlers
//! - [`testing`]: a host-side harness and an in-memory nOps backend

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod provider;
pub mod reconcile;
pub mod resources;
pub mod schema;
pub mod service;
pub mod testing;
pub mod types;
pub mod validation;

// Re-export main types at crate root
pub use client::{NopsApi, NopsClient};
pub use config::{ProviderConfig, RawProviderConfig};
pub use error::ProviderError;
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use models::{Integration, NewProject, Project, RequestType};
pub use provider::NopsProvider;
pub use reconcile::{reconcile, DesiredProject, ReconciliationOutcome};
pub use schema::ProviderSchema;
pub use service::ProviderService;
pub use types::{AttributeChange, ImportedResource, PlanResult, ProviderMetadata};
pub use validation::{is_valid, validate, validate_result};

// Re-export async_trait for convenience
pub use async_trait::async_trait;

// Re-export commonly used external types
pub use serde_json;
pub use tracing;
