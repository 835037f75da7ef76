use std::fmt;

/// Identifier every seeded marker document is stored under.
/// Primary-key uniqueness keeps racing seeders from writing a second marker.
pub const MARKER_ID: &str = "bootstrap-marker";

/// Default collection holding the marker document.
pub const DEFAULT_MARKER_COLLECTION: &str = "description";

/// Username/password pair. Used once to open a session against a scope.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// A named permission set on a specific database.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoleGrant {
    pub role: String,
    pub database: String,
}

impl RoleGrant {
    pub fn new(role: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            database: database.into(),
        }
    }
}

impl fmt::Display for RoleGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.role, self.database)
    }
}

/// The application user to ensure on the target database.
#[derive(Clone, PartialEq, Eq)]
pub struct UserSpec {
    pub username: String,
    pub password: String,
    pub database: String,
    pub roles: Vec<RoleGrant>,
}

impl UserSpec {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        database: impl Into<String>,
        roles: Vec<RoleGrant>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            database: database.into(),
            roles,
        }
    }

    /// Credentials the created user logs in with.
    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.username.clone(), self.password.clone())
    }
}

impl fmt::Debug for UserSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserSpec")
            .field("username", &self.username)
            .field("password", &"***")
            .field("database", &self.database)
            .field("roles", &self.roles)
            .finish()
    }
}

/// Version-tracking document describing the schema state of a database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionMarker {
    pub version: String,
    /// POSIX time in milliseconds.
    pub at: i64,
    pub migrated: bool,
}

impl VersionMarker {
    /// A fresh, not-yet-migrated marker stamped with the current time.
    pub fn fresh(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            at: posix_time_millis(),
            migrated: false,
        }
    }
}

/// Whether a bootstrap run also seeds the marker document.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MarkerPlan {
    #[default]
    Skip,
    SeedMarker { collection: String, version: String },
}

impl MarkerPlan {
    pub fn seed(collection: impl Into<String>, version: impl Into<String>) -> Self {
        MarkerPlan::SeedMarker {
            collection: collection.into(),
            version: version.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserOutcome {
    Created,
    AlreadyPresent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerOutcome {
    Skipped,
    Seeded,
    AlreadyPresent,
}

/// What a successful bootstrap run did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootstrapReport {
    pub user: UserOutcome,
    pub marker: MarkerOutcome,
}

/// Read-only view of the target database produced by `Bootstrapper::inspect`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseReport {
    pub server_version: String,
    pub collections: Vec<String>,
    pub marker: Option<VersionMarker>,
}

pub fn posix_time_millis() -> i64 {
    (time::OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}
