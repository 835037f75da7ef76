pub mod core;
pub mod errors;
pub mod store;

pub use self::core::{orchestrate_bootstrap, orchestrate_bootstrap_internal, retry_connection};
pub use store::{MongoConnector, MongoSession};
