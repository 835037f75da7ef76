use std::env;
use std::time::Duration;

use bootstrap::{
    Credentials, MarkerPlan, RoleGrant, UserSpec, DEFAULT_ADMIN_SCOPE, DEFAULT_MARKER_COLLECTION,
};

use crate::error::DbInfraError;

pub const MONGO_HOST: &str = "MONGO_HOST";
pub const MONGO_PORT: &str = "MONGO_PORT";
pub const MONGO_ADMIN_DATABASE: &str = "MONGO_ADMIN_DATABASE";
pub const MONGO_ADMIN_USERNAME: &str = "MONGO_ADMIN_USERNAME";
pub const MONGO_ADMIN_PASSWORD: &str = "MONGO_ADMIN_PASSWORD";
pub const MONGO_DATABASE: &str = "MONGO_DATABASE";
pub const MONGO_USERNAME: &str = "MONGO_USERNAME";
pub const MONGO_PASSWORD: &str = "MONGO_PASSWORD";
pub const MONGO_ROLES: &str = "MONGO_ROLES";
pub const BOOTSTRAP_MARKER: &str = "BOOTSTRAP_MARKER";
pub const BOOTSTRAP_MARKER_VERSION: &str = "BOOTSTRAP_MARKER_VERSION";
pub const BOOTSTRAP_MARKER_COLLECTION: &str = "BOOTSTRAP_MARKER_COLLECTION";
pub const BOOTSTRAP_VERIFY_LOGIN: &str = "BOOTSTRAP_VERIFY_LOGIN";
pub const BOOTSTRAP_APP_NAME: &str = "BOOTSTRAP_APP_NAME";

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 27017;
const DEFAULT_ROLE: &str = "dbOwner";
const DEFAULT_APP_NAME: &str = "bootstrap";

/// Where and how to reach the server. Holds the admin credentials.
#[derive(Debug, Clone)]
pub struct MongoSettings {
    pub host: String,
    pub port: u16,
    pub admin_database: String,
    pub admin: Credentials,
    pub app_name: String,
    pub server_selection_timeout: Duration,
    pub connect_attempts: u32,
    pub connect_interval_ms: u64,
}

/// Everything one bootstrap run needs, resolved up front.
#[derive(Debug, Clone)]
pub struct BootstrapSettings {
    pub mongo: MongoSettings,
    pub target_database: String,
    pub user: UserSpec,
    pub marker: MarkerPlan,
    pub marker_collection: String,
    pub verify_login: bool,
}

impl BootstrapSettings {
    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self, DbInfraError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Read settings through `lookup`, which maps a variable name to its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, DbInfraError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = var_or(&lookup, MONGO_HOST, DEFAULT_HOST);
        let port = match optional_var(&lookup, MONGO_PORT) {
            Some(raw) => raw.parse::<u16>().map_err(|_| {
                DbInfraError::config(format!(
                    "Environment variable '{MONGO_PORT}' must be a port number, got: '{raw}'"
                ))
            })?,
            None => DEFAULT_PORT,
        };
        let admin_database = var_or(&lookup, MONGO_ADMIN_DATABASE, DEFAULT_ADMIN_SCOPE);
        let admin = Credentials::new(
            must_var(&lookup, MONGO_ADMIN_USERNAME)?,
            must_var(&lookup, MONGO_ADMIN_PASSWORD)?,
        );

        let target_database = must_var(&lookup, MONGO_DATABASE)?;
        let roles = parse_roles(
            &var_or(&lookup, MONGO_ROLES, DEFAULT_ROLE),
            &target_database,
        )?;
        let user = UserSpec::new(
            must_var(&lookup, MONGO_USERNAME)?,
            must_var(&lookup, MONGO_PASSWORD)?,
            target_database.clone(),
            roles,
        );

        let marker_collection = var_or(&lookup, BOOTSTRAP_MARKER_COLLECTION, DEFAULT_MARKER_COLLECTION);
        let marker = marker_plan(
            &var_or(&lookup, BOOTSTRAP_MARKER, "skip"),
            optional_var(&lookup, BOOTSTRAP_MARKER_VERSION),
            &marker_collection,
        )?;

        let verify_login = match optional_var(&lookup, BOOTSTRAP_VERIFY_LOGIN) {
            Some(raw) => parse_bool(BOOTSTRAP_VERIFY_LOGIN, &raw)?,
            None => true,
        };

        Ok(Self {
            mongo: MongoSettings {
                host,
                port,
                admin_database,
                admin,
                app_name: var_or(&lookup, BOOTSTRAP_APP_NAME, DEFAULT_APP_NAME),
                server_selection_timeout: Duration::from_secs(5),
                connect_attempts: 5,
                connect_interval_ms: 500,
            },
            target_database,
            user,
            marker,
            marker_collection,
            verify_login,
        })
    }

    /// Replace the marker plan, e.g. from CLI flags.
    /// `mode` is `skip` or `seed`; `seed` needs a version from `version` or the environment.
    pub fn override_marker(
        &mut self,
        mode: &str,
        version: Option<String>,
    ) -> Result<(), DbInfraError> {
        let version = version.or_else(|| match &self.marker {
            MarkerPlan::SeedMarker { version, .. } => Some(version.clone()),
            MarkerPlan::Skip => None,
        });
        self.marker = marker_plan(mode, version, &self.marker_collection)?;
        Ok(())
    }
}

/// Parse `role` / `role@database` entries separated by commas.
/// Entries without `@database` are granted on `default_database`.
pub fn parse_roles(raw: &str, default_database: &str) -> Result<Vec<RoleGrant>, DbInfraError> {
    let mut grants = Vec::new();
    for entry in raw.split(',') {
        let entry = entry.trim();
        let (role, database) = match entry.split_once('@') {
            Some((role, database)) => (role.trim(), database.trim()),
            None => (entry, default_database),
        };
        if role.is_empty() || database.is_empty() {
            return Err(DbInfraError::config(format!(
                "Environment variable '{MONGO_ROLES}' has a malformed entry: '{entry}' (expected role or role@database)"
            )));
        }
        let grant = RoleGrant::new(role, database);
        if !grants.contains(&grant) {
            grants.push(grant);
        }
    }
    Ok(grants)
}

fn marker_plan(
    mode: &str,
    version: Option<String>,
    collection: &str,
) -> Result<MarkerPlan, DbInfraError> {
    match mode.trim().to_ascii_lowercase().as_str() {
        "skip" => Ok(MarkerPlan::Skip),
        "seed" => {
            let version = version.filter(|v| !v.trim().is_empty()).ok_or_else(|| {
                DbInfraError::config(format!(
                    "Marker mode 'seed' requires '{BOOTSTRAP_MARKER_VERSION}' to be set"
                ))
            })?;
            Ok(MarkerPlan::seed(collection, version))
        }
        other => Err(DbInfraError::config(format!(
            "Environment variable '{BOOTSTRAP_MARKER}' must be 'skip' or 'seed', got: '{other}'"
        ))),
    }
}

fn parse_bool(name: &str, raw: &str) -> Result<bool, DbInfraError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(DbInfraError::config(format!(
            "Environment variable '{name}' must be a boolean, got: '{raw}'"
        ))),
    }
}

fn optional_var<F>(lookup: &F, name: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name).filter(|v| !v.is_empty())
}

fn var_or<F>(lookup: &F, name: &str, default: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    optional_var(lookup, name).unwrap_or_else(|| default.to_string())
}

/// Get required variable or return error
fn must_var<F>(lookup: &F, name: &str) -> Result<String, DbInfraError>
where
    F: Fn(&str) -> Option<String>,
{
    optional_var(lookup, name).ok_or_else(|| {
        DbInfraError::config(format!("Required environment variable '{name}' is not set"))
    })
}
