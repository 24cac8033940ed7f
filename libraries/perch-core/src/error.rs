//! Error taxonomy for the two playback-state sources.

use thiserror::Error;

/// Errors surfaced by the local scripting-bridge probe.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    /// The player process is not running or not scriptable. Non-fatal: the
    /// engine retains the previous snapshot and marks dependent fields
    /// unknown.
    #[error("local player is not reachable")]
    Unreachable,
}

/// Errors surfaced by the remote Web API client.
///
/// Every variant is classified exactly once at the call site that issued the
/// request; remote errors never propagate as uncaught faults.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// The access token is no longer valid. Terminal for in-flight
    /// operations; re-authentication is owned by the upstream auth layer and
    /// is never retried locally.
    #[error("authentication expired")]
    AuthExpired,

    /// No device is active and none could be activated. Distinct so commands
    /// can surface it as a user-visible condition instead of a silent no-op.
    #[error("no active device available")]
    NoActiveDevice,

    /// Transport-level failure (connection, timeout, DNS).
    #[error("network error: {0}")]
    Network(String),

    /// The API answered with a non-success status.
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// The response body could not be decoded.
    #[error("parse error: {0}")]
    Parse(String),
}

impl RemoteError {
    /// Whether the upstream auth layer owns recovery for this error.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, RemoteError::AuthExpired)
    }
}
