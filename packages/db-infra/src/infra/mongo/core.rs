use std::future::Future;
use std::time::Duration;

use bootstrap::{
    BootstrapCommand, BootstrapReport, Bootstrapper, Connector, DatabaseReport, StoreError,
};
use tracing::{info, warn};

use crate::config::mongo::BootstrapSettings;
use crate::error::DbInfraError;
use crate::infra::mongo::errors::is_retryable;
use crate::infra::mongo::store::MongoConnector;

/// What a finished command produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapOutcome {
    Bootstrapped(BootstrapReport),
    Status(DatabaseReport),
}

/// Retry `connect_fn` while it fails with a retryable error.
/// Authentication and authorization failures return immediately.
pub async fn retry_connection<T, F, Fut>(
    mut connect_fn: F,
    max_attempts: u32,
    interval_ms: u64,
) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match connect_fn().await {
            Ok(result) => {
                if attempt > 1 {
                    info!(
                        "connection_retry=success attempts={} interval_ms={}",
                        attempt, interval_ms
                    );
                }
                return Ok(result);
            }
            Err(e) if is_retryable(&e) && attempt < max_attempts => {
                warn!(
                    error = %e,
                    "connection_retry=failed attempt={} max_attempts={} interval_ms={}",
                    attempt, max_attempts, interval_ms
                );
                tokio::time::sleep(Duration::from_millis(interval_ms)).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Run `command` against the MongoDB server described by `settings`.
pub async fn orchestrate_bootstrap(
    settings: &BootstrapSettings,
    command: BootstrapCommand,
) -> Result<BootstrapOutcome, DbInfraError> {
    let connector = MongoConnector::new(&settings.mongo);

    info!(
        "bootstrap=orchestrate command={:?} address={} target_db={}",
        command,
        connector.address(),
        settings.target_database
    );

    orchestrate_bootstrap_internal(connector, settings, command).await
}

/// Same as `orchestrate_bootstrap`, over any connector.
pub async fn orchestrate_bootstrap_internal<C: Connector>(
    connector: C,
    settings: &BootstrapSettings,
    command: BootstrapCommand,
) -> Result<BootstrapOutcome, DbInfraError> {
    let bootstrapper =
        Bootstrapper::new(connector).with_admin_scope(settings.mongo.admin_database.clone());

    match command {
        BootstrapCommand::Up => {
            let report = bootstrapper
                .bootstrap(
                    &settings.mongo.admin,
                    &settings.target_database,
                    &settings.user,
                    &settings.marker,
                )
                .await?;

            if settings.verify_login {
                bootstrapper
                    .verify_login(&settings.target_database, &settings.user.credentials())
                    .await?;
            } else {
                info!("verify=skipped");
            }
            Ok(BootstrapOutcome::Bootstrapped(report))
        }
        BootstrapCommand::Status => {
            let report = bootstrapper
                .inspect(
                    &settings.mongo.admin,
                    &settings.target_database,
                    &settings.marker_collection,
                )
                .await?;

            info!(
                server_version = %report.server_version,
                collections = ?report.collections,
                marker = ?report.marker,
                "status=done target_db={}",
                settings.target_database
            );
            Ok(BootstrapOutcome::Status(report))
        }
    }
}
