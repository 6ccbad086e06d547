//! Authentication error types.

use talk_api::TransportError;
use talk_session_storage::StorageError;
use thiserror::Error;

/// The service answered, but not with success.
///
/// Each variant carries a compact summary of the offending response.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Passcode generation failed: {0}")]
    PasscodeGenerationFailed(String),

    #[error("Device registration not confirmed after {attempts} attempts: {last_response}")]
    DeviceRegistrationTimeout { attempts: u32, last_response: String },

    #[error("Login failed: {0}")]
    LoginFailed(String),

    /// Recovered locally by falling back to the full flow.
    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),
}

/// An operation was attempted in a session state that does not allow it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("No session tokens available")]
    NoTokens,
}

/// Authentication error type.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// The registration wait was abandoned
    #[error("Authentication cancelled")]
    Cancelled,

    /// Invalid state transition in the auth FSM
    #[error("Invalid auth state transition: {0}")]
    InvalidStateTransition(String),
}

impl AuthError {
    /// Returns true if a later attempt may succeed without any change on
    /// the caller's side.
    ///
    /// Transient errors include:
    /// - connection failures and timeouts
    /// - HTTP errors with 5xx status codes
    /// - a session lock held by another process
    pub fn is_transient(&self) -> bool {
        match self {
            AuthError::Transport(TransportError::Http(e)) => {
                if e.is_connect() || e.is_timeout() {
                    return true;
                }
                if let Some(status) = e.status() {
                    return status.is_server_error();
                }
                false
            }
            AuthError::Storage(StorageError::Locked(_)) => true,
            AuthError::Protocol(ProtocolError::DeviceRegistrationTimeout { .. }) => true,
            _ => false,
        }
    }
}

/// Result type alias using AuthError.
pub type AuthResult<T> = Result<T, AuthError>;
