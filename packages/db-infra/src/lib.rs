//! Configuration and MongoDB plumbing for the bootstrap tool.
//! Used by the CLI and by the live-server integration tests.

pub mod config;
pub mod error;
pub mod infra;

pub use config::mongo;
pub use error::DbInfraError;
pub use infra::mongo::core::{
    orchestrate_bootstrap, orchestrate_bootstrap_internal, retry_connection, BootstrapOutcome,
};
pub use infra::mongo::store::{MongoConnector, MongoSession};
