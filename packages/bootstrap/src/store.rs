use async_trait::async_trait;

use crate::error::StoreError;
use crate::model::{Credentials, UserSpec, VersionMarker};

/// Opens authenticated sessions against a datastore.
#[async_trait]
pub trait Connector: Send + Sync {
    type Session: AdminSession;

    /// Authenticate `credentials` against `scope` and return a live session.
    /// Must fail with `StoreError::AuthenticationFailed` on bad credentials
    /// without touching any data.
    async fn open(&self, scope: &str, credentials: &Credentials)
        -> Result<Self::Session, StoreError>;
}

/// Operations the bootstrapper needs from one authenticated session.
#[async_trait]
pub trait AdminSession: Send + Sync {
    async fn user_exists(&self, database: &str, username: &str) -> Result<bool, StoreError>;

    /// Create `spec.username` on `spec.database`.
    /// An existing user must surface as `StoreError::AlreadyExists`.
    async fn create_user(&self, spec: &UserSpec) -> Result<(), StoreError>;

    /// Create the collection; `StoreError::AlreadyExists` if it is already there.
    async fn ensure_collection(&self, database: &str, collection: &str) -> Result<(), StoreError>;

    /// First document of `collection`, if any.
    async fn find_marker(
        &self,
        database: &str,
        collection: &str,
    ) -> Result<Option<VersionMarker>, StoreError>;

    /// Insert the marker under `MARKER_ID`.
    /// A marker already stored under that id must surface as `StoreError::AlreadyExists`.
    async fn insert_marker(
        &self,
        database: &str,
        collection: &str,
        marker: &VersionMarker,
    ) -> Result<(), StoreError>;

    async fn server_version(&self) -> Result<String, StoreError>;

    async fn list_collections(&self, database: &str) -> Result<Vec<String>, StoreError>;

    /// Release the session. Called on every exit path.
    async fn close(self) -> Result<(), StoreError>;
}
