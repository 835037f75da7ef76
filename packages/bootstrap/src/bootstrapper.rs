use tracing::{debug, info, warn};

use crate::error::{BootstrapError, StoreError};
use crate::model::{
    BootstrapReport, Credentials, DatabaseReport, MarkerOutcome, MarkerPlan, UserOutcome,
    UserSpec, VersionMarker,
};
use crate::store::{AdminSession, Connector};

pub const DEFAULT_ADMIN_SCOPE: &str = "admin";

/// Ensures the application user (and optionally the marker document) exist.
///
/// Every public operation opens its own session and closes it before
/// returning, whatever the outcome.
pub struct Bootstrapper<C> {
    connector: C,
    admin_scope: String,
}

impl<C: Connector> Bootstrapper<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            admin_scope: DEFAULT_ADMIN_SCOPE.to_string(),
        }
    }

    pub fn with_admin_scope(mut self, scope: impl Into<String>) -> Self {
        self.admin_scope = scope.into();
        self
    }

    pub fn admin_scope(&self) -> &str {
        &self.admin_scope
    }

    /// Authenticate as `admin`, ensure `user` exists on `target_database`, then
    /// apply `marker`. Safe to re-run: existing users and markers are left alone.
    pub async fn bootstrap(
        &self,
        admin: &Credentials,
        target_database: &str,
        user: &UserSpec,
        marker: &MarkerPlan,
    ) -> Result<BootstrapReport, BootstrapError> {
        info!(
            "bootstrap=start scope={} target_db={} username={}",
            self.admin_scope, target_database, user.username
        );

        let session = self.open_admin(admin).await?;
        let result = run_bootstrap(&session, target_database, user, marker).await;
        release(session, "bootstrap").await;

        match &result {
            Ok(report) => info!(
                user = ?report.user,
                marker = ?report.marker,
                "bootstrap=done target_db={} username={}",
                target_database,
                user.username
            ),
            Err(e) => warn!(error = %e, "bootstrap=failed target_db={}", target_database),
        }
        result
    }

    /// Log in as `credentials` against `target_database` and log straight out.
    pub async fn verify_login(
        &self,
        target_database: &str,
        credentials: &Credentials,
    ) -> Result<(), BootstrapError> {
        let session = self
            .connector
            .open(target_database, credentials)
            .await
            .map_err(|e| BootstrapError::Verify {
                username: credentials.username.clone(),
                database: target_database.to_string(),
                message: e.to_string(),
            })?;
        release(session, "verify_login").await;

        info!(
            "verify=ok target_db={} username={}",
            target_database, credentials.username
        );
        Ok(())
    }

    /// Read-only snapshot of the target database: server version, collections
    /// and the marker document when `marker_collection` holds one.
    pub async fn inspect(
        &self,
        admin: &Credentials,
        target_database: &str,
        marker_collection: &str,
    ) -> Result<DatabaseReport, BootstrapError> {
        if target_database.is_empty() {
            return Err(BootstrapError::config("target database name must not be empty"));
        }

        let session = self.open_admin(admin).await?;
        let result = run_inspect(&session, target_database, marker_collection).await;
        release(session, "inspect").await;
        result
    }

    async fn open_admin(&self, admin: &Credentials) -> Result<C::Session, BootstrapError> {
        self.connector
            .open(&self.admin_scope, admin)
            .await
            .map_err(|e| match e {
                StoreError::AuthenticationFailed(message) | StoreError::Unauthorized(message) => {
                    BootstrapError::Auth {
                        scope: self.admin_scope.clone(),
                        message,
                    }
                }
                other => BootstrapError::store("open admin session", other),
            })
    }
}

async fn release<S: AdminSession>(session: S, operation: &str) {
    if let Err(e) = session.close().await {
        warn!(error = %e, operation, "Failed to close datastore session");
    }
}

async fn run_bootstrap<S: AdminSession>(
    session: &S,
    target_database: &str,
    user: &UserSpec,
    marker: &MarkerPlan,
) -> Result<BootstrapReport, BootstrapError> {
    validate_user_spec(target_database, user)?;

    let user_outcome = ensure_user(session, user).await?;
    let marker_outcome = match marker {
        MarkerPlan::Skip => {
            debug!("marker=skipped");
            MarkerOutcome::Skipped
        }
        MarkerPlan::SeedMarker {
            collection,
            version,
        } => ensure_marker(session, target_database, collection, version).await?,
    };

    Ok(BootstrapReport {
        user: user_outcome,
        marker: marker_outcome,
    })
}

/// Reject specs that would leave a half-configured user behind.
/// Runs before any mutation.
pub fn validate_user_spec(target_database: &str, user: &UserSpec) -> Result<(), BootstrapError> {
    if target_database.is_empty() {
        return Err(BootstrapError::config("target database name must not be empty"));
    }
    if user.database != target_database {
        return Err(BootstrapError::config(format!(
            "user spec targets database '{}' but bootstrap targets '{}'",
            user.database, target_database
        )));
    }

    let grant_error = |message: String| BootstrapError::Grant {
        username: user.username.clone(),
        database: target_database.to_string(),
        message,
    };

    if user.username.is_empty() {
        return Err(grant_error("username must not be empty".to_string()));
    }
    if user.roles.is_empty() {
        return Err(grant_error("at least one role grant is required".to_string()));
    }
    if let Some(bad) = user
        .roles
        .iter()
        .find(|g| g.role.trim().is_empty() || g.database.trim().is_empty())
    {
        return Err(grant_error(format!(
            "malformed role grant: role='{}' db='{}'",
            bad.role, bad.database
        )));
    }
    Ok(())
}

async fn ensure_user<S: AdminSession>(
    session: &S,
    user: &UserSpec,
) -> Result<UserOutcome, BootstrapError> {
    let grant_error = |e: StoreError| BootstrapError::Grant {
        username: user.username.clone(),
        database: user.database.clone(),
        message: e.to_string(),
    };

    if session
        .user_exists(&user.database, &user.username)
        .await
        .map_err(grant_error)?
    {
        info!(
            "user=present target_db={} username={}",
            user.database, user.username
        );
        return Ok(UserOutcome::AlreadyPresent);
    }

    match session.create_user(user).await {
        Ok(()) => {
            let roles: Vec<String> = user.roles.iter().map(ToString::to_string).collect();
            info!(
                roles = ?roles,
                "user=created target_db={} username={}",
                user.database,
                user.username
            );
            Ok(UserOutcome::Created)
        }
        Err(e) if e.is_already_exists() => {
            info!(
                "user=present target_db={} username={} reason=concurrent_create",
                user.database, user.username
            );
            Ok(UserOutcome::AlreadyPresent)
        }
        Err(e) => Err(grant_error(e)),
    }
}

async fn ensure_marker<S: AdminSession>(
    session: &S,
    database: &str,
    collection: &str,
    version: &str,
) -> Result<MarkerOutcome, BootstrapError> {
    let marker_error = |e: StoreError| BootstrapError::Marker {
        database: database.to_string(),
        collection: collection.to_string(),
        message: e.to_string(),
    };

    if collection.is_empty() {
        return Err(marker_error(StoreError::Other(
            "collection name must not be empty".to_string(),
        )));
    }
    if version.is_empty() {
        return Err(marker_error(StoreError::Other(
            "marker version must not be empty".to_string(),
        )));
    }

    if let Some(existing) = session
        .find_marker(database, collection)
        .await
        .map_err(marker_error)?
    {
        info!(
            existing_version = %existing.version,
            migrated = existing.migrated,
            "marker=present db={} collection={}",
            database,
            collection
        );
        return Ok(MarkerOutcome::AlreadyPresent);
    }

    match session.ensure_collection(database, collection).await {
        Ok(()) => debug!("collection=created db={} collection={}", database, collection),
        Err(e) if e.is_already_exists() => {}
        Err(e) => return Err(marker_error(e)),
    }

    let marker = VersionMarker::fresh(version);
    match session.insert_marker(database, collection, &marker).await {
        Ok(()) => {
            info!(
                version = %marker.version,
                at = marker.at,
                "marker=seeded db={} collection={}",
                database,
                collection
            );
            Ok(MarkerOutcome::Seeded)
        }
        Err(e) if e.is_already_exists() => {
            info!(
                "marker=present db={} collection={} reason=concurrent_insert",
                database, collection
            );
            Ok(MarkerOutcome::AlreadyPresent)
        }
        Err(e) => Err(marker_error(e)),
    }
}

async fn run_inspect<S: AdminSession>(
    session: &S,
    database: &str,
    marker_collection: &str,
) -> Result<DatabaseReport, BootstrapError> {
    let server_version = session
        .server_version()
        .await
        .map_err(|e| BootstrapError::store("server version lookup", e))?;

    let mut collections = session
        .list_collections(database)
        .await
        .map_err(|e| BootstrapError::store("list collections", e))?;
    collections.sort();

    let marker = if collections.iter().any(|c| c == marker_collection) {
        session
            .find_marker(database, marker_collection)
            .await
            .map_err(|e| BootstrapError::store("marker lookup", e))?
    } else {
        None
    };

    Ok(DatabaseReport {
        server_version,
        collections,
        marker,
    })
}
