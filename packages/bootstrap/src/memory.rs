//! In-process datastore with the access-control semantics the bootstrapper
//! relies on: per-database users, role grants, privilege checks, collections
//! and primary-key uniqueness.
//!
//! Cloning a `MemoryCluster` shares the underlying state, so a test can keep
//! one handle for assertions while the bootstrapper owns another.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::StoreError;
use crate::model::{Credentials, RoleGrant, UserSpec, VersionMarker, MARKER_ID};
use crate::store::{AdminSession, Connector};

const BUILTIN_ROLES: &[&str] = &[
    "read",
    "readWrite",
    "dbAdmin",
    "dbOwner",
    "userAdmin",
    "root",
    "userAdminAnyDatabase",
    "readWriteAnyDatabase",
    "dbAdminAnyDatabase",
];

/// Operations failures can be injected into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryOp {
    UserExists,
    CreateUser,
    EnsureCollection,
    FindMarker,
    InsertMarker,
    ServerVersion,
    ListCollections,
    Close,
}

#[derive(Debug, Clone)]
struct StoredUser {
    password: String,
    roles: Vec<RoleGrant>,
}

#[derive(Debug, Clone)]
struct StoredMarker {
    id: String,
    marker: VersionMarker,
}

#[derive(Debug, Default)]
struct ClusterState {
    // keyed by (auth database, username)
    users: BTreeMap<(String, String), StoredUser>,
    collections: BTreeMap<(String, String), Vec<StoredMarker>>,
    failures: HashMap<MemoryOp, StoreError>,
    open_sessions: usize,
    mutations: usize,
}

#[derive(Debug, Clone)]
pub struct MemoryCluster {
    state: Arc<Mutex<ClusterState>>,
    version: String,
}

impl MemoryCluster {
    /// A cluster whose only user is `root` on the `admin_scope` database.
    pub fn with_root(admin_scope: &str, root: &Credentials) -> Self {
        let mut state = ClusterState::default();
        state.users.insert(
            (admin_scope.to_string(), root.username.clone()),
            StoredUser {
                password: root.password.clone(),
                roles: vec![RoleGrant::new("root", admin_scope)],
            },
        );
        Self {
            state: Arc::new(Mutex::new(state)),
            version: "7.0.0-memory".to_string(),
        }
    }

    /// Make every subsequent call of `op` fail with `error`.
    pub fn fail_on(&self, op: MemoryOp, error: StoreError) {
        self.state.lock().failures.insert(op, error);
    }

    pub fn clear_failures(&self) {
        self.state.lock().failures.clear();
    }

    pub fn user_count(&self, database: &str, username: &str) -> usize {
        let state = self.state.lock();
        state
            .users
            .keys()
            .filter(|(db, name)| db == database && name == username)
            .count()
    }

    pub fn user_roles(&self, database: &str, username: &str) -> Option<Vec<RoleGrant>> {
        let state = self.state.lock();
        state
            .users
            .get(&(database.to_string(), username.to_string()))
            .map(|u| u.roles.clone())
    }

    pub fn documents(&self, database: &str, collection: &str) -> Vec<VersionMarker> {
        let state = self.state.lock();
        state
            .collections
            .get(&(database.to_string(), collection.to_string()))
            .map(|docs| docs.iter().map(|d| d.marker.clone()).collect())
            .unwrap_or_default()
    }

    pub fn has_collection(&self, database: &str, collection: &str) -> bool {
        self.state
            .lock()
            .collections
            .contains_key(&(database.to_string(), collection.to_string()))
    }

    /// Seed a document directly, bypassing any session.
    pub fn insert_raw(&self, database: &str, collection: &str, id: &str, marker: VersionMarker) {
        let mut state = self.state.lock();
        state
            .collections
            .entry((database.to_string(), collection.to_string()))
            .or_default()
            .push(StoredMarker {
                id: id.to_string(),
                marker,
            });
    }

    pub fn open_sessions(&self) -> usize {
        self.state.lock().open_sessions
    }

    /// Number of successful writes (users, collections, documents).
    pub fn mutations(&self) -> usize {
        self.state.lock().mutations
    }

    fn check_failure(&self, op: MemoryOp) -> Result<(), StoreError> {
        match self.state.lock().failures.get(&op) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Connector for MemoryCluster {
    type Session = MemorySession;

    async fn open(&self, scope: &str, credentials: &Credentials) -> Result<MemorySession, StoreError> {
        let mut state = self.state.lock();
        let key = (scope.to_string(), credentials.username.clone());
        let roles = match state.users.get(&key) {
            Some(user) if user.password == credentials.password => user.roles.clone(),
            _ => {
                return Err(StoreError::AuthenticationFailed(format!(
                    "Authentication failed for '{}' on '{}'",
                    credentials.username, scope
                )))
            }
        };
        state.open_sessions += 1;

        Ok(MemorySession {
            cluster: self.clone(),
            roles,
        })
    }
}

/// Session authenticated as one principal; its roles gate every call.
#[derive(Debug)]
pub struct MemorySession {
    cluster: MemoryCluster,
    roles: Vec<RoleGrant>,
}

impl MemorySession {
    fn has_any(&self, database: &str, db_roles: &[&str], any_db_roles: &[&str]) -> bool {
        self.roles.iter().any(|g| {
            (g.database == database && db_roles.contains(&g.role.as_str()))
                || (g.database == "admin" && any_db_roles.contains(&g.role.as_str()))
        })
    }

    fn require_user_admin(&self, database: &str) -> Result<(), StoreError> {
        if self.has_any(
            database,
            &["dbOwner", "userAdmin", "root"],
            &["root", "userAdminAnyDatabase"],
        ) {
            Ok(())
        } else {
            Err(StoreError::Unauthorized(format!(
                "not authorized on {database} to manage users"
            )))
        }
    }

    fn require_read(&self, database: &str) -> Result<(), StoreError> {
        if self.has_any(
            database,
            &["read", "readWrite", "dbOwner", "root"],
            &["root", "readWriteAnyDatabase"],
        ) {
            Ok(())
        } else {
            Err(StoreError::Unauthorized(format!("not authorized on {database} to read")))
        }
    }

    fn require_write(&self, database: &str) -> Result<(), StoreError> {
        if self.has_any(
            database,
            &["readWrite", "dbOwner", "root"],
            &["root", "readWriteAnyDatabase"],
        ) {
            Ok(())
        } else {
            Err(StoreError::Unauthorized(format!("not authorized on {database} to write")))
        }
    }
}

#[async_trait]
impl AdminSession for MemorySession {
    async fn user_exists(&self, database: &str, username: &str) -> Result<bool, StoreError> {
        self.cluster.check_failure(MemoryOp::UserExists)?;
        self.require_user_admin(database)?;
        Ok(self.cluster.user_count(database, username) > 0)
    }

    async fn create_user(&self, spec: &UserSpec) -> Result<(), StoreError> {
        self.cluster.check_failure(MemoryOp::CreateUser)?;
        self.require_user_admin(&spec.database)?;

        let unknown: BTreeSet<String> = spec
            .roles
            .iter()
            .filter(|g| !BUILTIN_ROLES.contains(&g.role.as_str()))
            .map(ToString::to_string)
            .collect();
        if let Some(role) = unknown.iter().next() {
            return Err(StoreError::Other(format!("No role named {role}")));
        }

        let mut state = self.cluster.state.lock();
        let key = (spec.database.clone(), spec.username.clone());
        if state.users.contains_key(&key) {
            return Err(StoreError::AlreadyExists(format!(
                "User \"{}@{}\" already exists",
                spec.username, spec.database
            )));
        }
        state.users.insert(
            key,
            StoredUser {
                password: spec.password.clone(),
                roles: spec.roles.clone(),
            },
        );
        state.mutations += 1;
        Ok(())
    }

    async fn ensure_collection(&self, database: &str, collection: &str) -> Result<(), StoreError> {
        self.cluster.check_failure(MemoryOp::EnsureCollection)?;
        self.require_write(database)?;

        let mut state = self.cluster.state.lock();
        let key = (database.to_string(), collection.to_string());
        if state.collections.contains_key(&key) {
            return Err(StoreError::AlreadyExists(format!(
                "Collection {database}.{collection} already exists"
            )));
        }
        state.collections.insert(key, Vec::new());
        state.mutations += 1;
        Ok(())
    }

    async fn find_marker(
        &self,
        database: &str,
        collection: &str,
    ) -> Result<Option<VersionMarker>, StoreError> {
        self.cluster.check_failure(MemoryOp::FindMarker)?;
        self.require_read(database)?;
        Ok(self.cluster.documents(database, collection).into_iter().next())
    }

    async fn insert_marker(
        &self,
        database: &str,
        collection: &str,
        marker: &VersionMarker,
    ) -> Result<(), StoreError> {
        self.cluster.check_failure(MemoryOp::InsertMarker)?;
        self.require_write(database)?;

        let mut state = self.cluster.state.lock();
        let docs = state
            .collections
            .entry((database.to_string(), collection.to_string()))
            .or_default();
        if docs.iter().any(|d| d.id == MARKER_ID) {
            return Err(StoreError::AlreadyExists(format!(
                "E11000 duplicate key error collection: {database}.{collection} dup key: {{ _id: \"{MARKER_ID}\" }}"
            )));
        }
        docs.push(StoredMarker {
            id: MARKER_ID.to_string(),
            marker: marker.clone(),
        });
        state.mutations += 1;
        Ok(())
    }

    async fn server_version(&self) -> Result<String, StoreError> {
        self.cluster.check_failure(MemoryOp::ServerVersion)?;
        Ok(self.cluster.version.clone())
    }

    async fn list_collections(&self, database: &str) -> Result<Vec<String>, StoreError> {
        self.cluster.check_failure(MemoryOp::ListCollections)?;
        self.require_read(database)?;
        let state = self.cluster.state.lock();
        Ok(state
            .collections
            .keys()
            .filter(|(db, _)| db == database)
            .map(|(_, name)| name.clone())
            .collect())
    }

    async fn close(self) -> Result<(), StoreError> {
        let mut state = self.cluster.state.lock();
        state.open_sessions = state.open_sessions.saturating_sub(1);
        match state.failures.get(&MemoryOp::Close) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}
