//! mongodb driver error -> StoreError translation.
//!
//! Server error codes are listed in the server's `error_codes.yml`.

use bootstrap::StoreError;
use mongodb::error::{Error, ErrorKind, WriteFailure};

pub const UNAUTHORIZED: i32 = 13;
pub const AUTHENTICATION_FAILED: i32 = 18;
pub const NAMESPACE_EXISTS: i32 = 48;
pub const DUPLICATE_KEY: i32 = 11000;
/// `createUser` on an existing user (`Location51003`).
pub const USER_ALREADY_EXISTS: i32 = 51003;

/// Classify a driver error. The message is the driver's own rendering,
/// which never contains the credential password.
pub fn map_mongo_err(err: &Error) -> StoreError {
    let message = err.to_string();

    match err.kind.as_ref() {
        ErrorKind::Authentication { .. } => StoreError::AuthenticationFailed(message),
        ErrorKind::Command(command) => map_server_code(command.code, message),
        ErrorKind::Write(WriteFailure::WriteError(write)) => map_server_code(write.code, message),
        ErrorKind::ServerSelection { .. }
        | ErrorKind::DnsResolve { .. }
        | ErrorKind::ConnectionPoolCleared { .. }
        | ErrorKind::Io(_) => StoreError::Unavailable(message),
        _ => StoreError::Other(message),
    }
}

pub fn map_server_code(code: i32, message: String) -> StoreError {
    match code {
        AUTHENTICATION_FAILED => StoreError::AuthenticationFailed(message),
        UNAUTHORIZED => StoreError::Unauthorized(message),
        NAMESPACE_EXISTS | DUPLICATE_KEY | USER_ALREADY_EXISTS => StoreError::AlreadyExists(message),
        _ => StoreError::Other(message),
    }
}

/// Connection-level failures worth another attempt. Authentication and
/// authorization failures never are.
pub fn is_retryable(err: &StoreError) -> bool {
    matches!(err, StoreError::Unavailable(_))
}
