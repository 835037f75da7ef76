//! Idempotent bootstrap of a datastore's access-control and initial-schema state.
//!
//! The `Bootstrapper` drives any `Connector`; `db-infra` provides the MongoDB
//! one and `memory` an in-process one.

pub mod bootstrapper;
pub mod error;
pub mod memory;
pub mod model;
pub mod store;

pub use bootstrapper::{validate_user_spec, Bootstrapper, DEFAULT_ADMIN_SCOPE};
pub use error::{BootstrapError, StoreError};
pub use memory::{MemoryCluster, MemoryOp, MemorySession};
pub use model::{
    posix_time_millis, BootstrapReport, Credentials, DatabaseReport, MarkerOutcome, MarkerPlan,
    RoleGrant, UserOutcome, UserSpec, VersionMarker, DEFAULT_MARKER_COLLECTION, MARKER_ID,
};
pub use store::{AdminSession, Connector};

/// What the CLI was asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapCommand {
    /// Ensure the user (and marker, if planned) exist.
    Up,
    /// Report server, collections and marker without mutating anything.
    Status,
}
