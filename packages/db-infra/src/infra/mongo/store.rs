use async_trait::async_trait;
use bootstrap::{
    AdminSession, Connector, Credentials, StoreError, UserSpec, VersionMarker, MARKER_ID,
};
use mongodb::bson::{doc, Bson, Document};
use mongodb::options::{ClientOptions, Credential};
use mongodb::Client;
use tracing::debug;

use crate::config::mongo::MongoSettings;
use crate::infra::mongo::core::retry_connection;
use crate::infra::mongo::errors::map_mongo_err;

/// Opens authenticated MongoDB clients, one per session.
#[derive(Debug, Clone)]
pub struct MongoConnector {
    settings: MongoSettings,
}

impl MongoConnector {
    pub fn new(settings: &MongoSettings) -> Self {
        Self {
            settings: settings.clone(),
        }
    }

    /// Host/port address without credentials; safe to log.
    pub fn address(&self) -> String {
        format!("mongodb://{}:{}/", self.settings.host, self.settings.port)
    }

    async fn client_options(
        &self,
        scope: &str,
        credentials: &Credentials,
    ) -> Result<ClientOptions, StoreError> {
        let mut options = ClientOptions::parse(self.address())
            .await
            .map_err(|e| map_mongo_err(&e))?;
        options.app_name = Some(self.settings.app_name.clone());
        options.server_selection_timeout = Some(self.settings.server_selection_timeout);
        // One-shot administrative commands; a retried createUser could report
        // "already exists" for its own first attempt.
        options.retry_writes = Some(false);
        options.credential = Some(
            Credential::builder()
                .username(credentials.username.clone())
                .password(credentials.password.clone())
                .source(scope.to_string())
                .build(),
        );
        Ok(options)
    }

    async fn connect_once(
        &self,
        scope: &str,
        credentials: &Credentials,
    ) -> Result<MongoSession, StoreError> {
        let options = self.client_options(scope, credentials).await?;
        let client = Client::with_options(options).map_err(|e| map_mongo_err(&e))?;

        // The driver authenticates lazily; force the handshake now so bad
        // credentials fail before any command that could mutate state.
        if let Err(e) = client.database(scope).run_command(doc! { "ping": 1 }).await {
            client.shutdown().await;
            return Err(map_mongo_err(&e));
        }

        debug!(
            "session=open address={} scope={} username={}",
            self.address(),
            scope,
            credentials.username
        );
        Ok(MongoSession { client })
    }
}

#[async_trait]
impl Connector for MongoConnector {
    type Session = MongoSession;

    async fn open(&self, scope: &str, credentials: &Credentials) -> Result<MongoSession, StoreError> {
        retry_connection(
            move || self.connect_once(scope, credentials),
            self.settings.connect_attempts,
            self.settings.connect_interval_ms,
        )
        .await
    }
}

/// One authenticated client. Dropped via `close`, which shuts the pool down.
pub struct MongoSession {
    client: Client,
}

#[async_trait]
impl AdminSession for MongoSession {
    async fn user_exists(&self, database: &str, username: &str) -> Result<bool, StoreError> {
        let reply = self
            .client
            .database(database)
            .run_command(doc! { "usersInfo": { "user": username, "db": database } })
            .await
            .map_err(|e| map_mongo_err(&e))?;

        let users = reply
            .get_array("users")
            .map_err(|e| StoreError::Other(format!("unexpected usersInfo reply: {e}")))?;
        Ok(!users.is_empty())
    }

    async fn create_user(&self, spec: &UserSpec) -> Result<(), StoreError> {
        let roles: Vec<Document> = spec
            .roles
            .iter()
            .map(|grant| doc! { "role": grant.role.as_str(), "db": grant.database.as_str() })
            .collect();

        self.client
            .database(&spec.database)
            .run_command(doc! {
                "createUser": spec.username.as_str(),
                "pwd": spec.password.as_str(),
                "roles": roles,
            })
            .await
            .map_err(|e| map_mongo_err(&e))?;
        Ok(())
    }

    async fn ensure_collection(&self, database: &str, collection: &str) -> Result<(), StoreError> {
        self.client
            .database(database)
            .create_collection(collection)
            .await
            .map_err(|e| map_mongo_err(&e))
    }

    async fn find_marker(
        &self,
        database: &str,
        collection: &str,
    ) -> Result<Option<VersionMarker>, StoreError> {
        let found = self
            .client
            .database(database)
            .collection::<Document>(collection)
            .find_one(doc! {})
            .await
            .map_err(|e| map_mongo_err(&e))?;

        found.map(|document| marker_from_document(&document)).transpose()
    }

    async fn insert_marker(
        &self,
        database: &str,
        collection: &str,
        marker: &VersionMarker,
    ) -> Result<(), StoreError> {
        self.client
            .database(database)
            .collection::<Document>(collection)
            .insert_one(marker_document(marker))
            .await
            .map_err(|e| map_mongo_err(&e))?;
        Ok(())
    }

    async fn server_version(&self) -> Result<String, StoreError> {
        let reply = self
            .client
            .database("admin")
            .run_command(doc! { "buildInfo": 1 })
            .await
            .map_err(|e| map_mongo_err(&e))?;

        reply
            .get_str("version")
            .map(str::to_string)
            .map_err(|e| StoreError::Other(format!("unexpected buildInfo reply: {e}")))
    }

    async fn list_collections(&self, database: &str) -> Result<Vec<String>, StoreError> {
        self.client
            .database(database)
            .list_collection_names()
            .await
            .map_err(|e| map_mongo_err(&e))
    }

    async fn close(self) -> Result<(), StoreError> {
        self.client.shutdown().await;
        Ok(())
    }
}

pub fn marker_document(marker: &VersionMarker) -> Document {
    doc! {
        "_id": MARKER_ID,
        "version": marker.version.as_str(),
        "at": marker.at,
        "migrated": marker.migrated,
    }
}

/// Parse a marker document. `at` is accepted as int32, int64, double or
/// BSON datetime since older seeders wrote it in different shapes.
pub fn marker_from_document(document: &Document) -> Result<VersionMarker, StoreError> {
    let malformed = |detail: String| StoreError::Other(format!("malformed marker document: {detail}"));

    let version = document
        .get_str("version")
        .map_err(|e| malformed(format!("version: {e}")))?
        .to_string();
    let migrated = document
        .get_bool("migrated")
        .map_err(|e| malformed(format!("migrated: {e}")))?;
    let at = match document.get("at") {
        Some(Bson::Int64(v)) => *v,
        Some(Bson::Int32(v)) => i64::from(*v),
        Some(Bson::Double(v)) => *v as i64,
        Some(Bson::DateTime(v)) => v.timestamp_millis(),
        Some(other) => return Err(malformed(format!("at has type {:?}", other.element_type()))),
        None => return Err(malformed("at is missing".to_string())),
    };

    Ok(VersionMarker {
        version,
        at,
        migrated,
    })
}
