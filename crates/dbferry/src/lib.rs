//! # dbferry
//!
//! Streaming database migration and export engine.
//!
//! dbferry moves the contents of one database instance to another, or exports
//! them into a downloadable zip archive, through a single uniform workflow.
//! Four backends are supported:
//!
//! - **MongoDB** (document store)
//! - **PostgreSQL** and **MySQL** (relational)
//! - **Redis** (key-value)
//!
//! Every backend implements the same three-operation contract: connection
//! verification, a streaming copy algorithm, and a streaming archive export.
//! Long-running work is tracked as a job in a [`JobStore`], with live
//! progress, log and stats reporting that any number of observers can
//! subscribe to while the job runs in the background.
//!
//! ## Example
//!
//! ```rust,no_run
//! use dbferry::{MigrateRequest, MigrationService};
//!
//! #[tokio::main]
//! async fn main() -> dbferry::Result<()> {
//!     let service = MigrationService::new();
//!     let started = service.start_copy(MigrateRequest::Postgres {
//!         source_uri: "postgres://src:5432/app".into(),
//!         target_uri: "postgres://dst:5432/app".into(),
//!     })?;
//!     println!("migration running as {}", started.job_id);
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod api;
pub mod archive;
pub mod error;
pub mod jobs;
pub mod registry;
pub mod service;

// Re-exports for convenient access
pub use api::{Backend, MigrateRequest, StartResponse, StatusFrame, VerifyResponse};
pub use archive::ArchiveBuilder;
pub use error::{FerryError, Result};
pub use jobs::{JobContext, JobSnapshot, JobStats, JobStatus, JobStore, JobType};
pub use registry::AdapterRegistry;
pub use service::MigrationService;
