// SPDX-FileCopyrightText: 2025-2026 Groupsync Developers
//
// SPDX-License-Identifier: Apache-2.0

//! Error types shared by the reconciliation engine.

use std::fmt;

use thiserror::Error;

use crate::identifier::ItemId;

/// Errors reported by a remote store implementation.
#[non_exhaustive]
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    /// Credentials were rejected, fatal to the pass.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Network, timeout or server-side transient failure.
    #[error("Remote I/O error: {0}")]
    Io(String),

    /// The remote answered with a payload that could not be understood.
    #[error("Malformed remote payload: {0}")]
    Parse(String),

    /// The addressed record does not exist (anymore).
    #[error("Remote record not found: {0}")]
    NotFound(String),
}

/// Errors raised while normalising date ranges.
#[non_exhaustive]
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RangeError {
    /// The value is neither a date nor an instant.
    #[error("Invalid date or datetime value '{0}'")]
    InvalidValue(String),

    /// Calendar arithmetic left the supported range.
    #[error("Date arithmetic overflow for '{0}'")]
    Overflow(String),
}

/// Engine-level error.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum SyncError {
    /// Credentials rejected by the remote store.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Remote failure that is expected to heal on a later pass.
    #[error(transparent)]
    Remote(RemoteError),

    /// Local database failure.
    #[error("Local store error: {0}")]
    LocalStore(#[from] sqlx::Error),

    /// The canonical identifier of an item could not be resolved yet.
    #[error("Identifier {0} could not be resolved")]
    IdentityUnresolved(ItemId),

    /// Malformed data, either from the remote or from a stored record.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The pass observed an external cancellation request.
    #[error("Sync pass cancelled")]
    Cancelled,

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl SyncError {
    /// Category of this error, used for pass-level counters.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Auth(_) | Self::Remote(RemoteError::Auth(_)) => ErrorKind::AuthFailure,
            Self::Remote(RemoteError::Parse(_)) | Self::Parse(_) => ErrorKind::Parse,
            Self::Remote(_) | Self::LocalStore(_) | Self::Config(_) => ErrorKind::TransientIo,
            Self::IdentityUnresolved(_) => ErrorKind::IdentityUnresolved,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Whether this error must stop the whole pass.
    pub fn is_fatal(&self) -> bool {
        matches!(self.kind(), ErrorKind::AuthFailure | ErrorKind::Cancelled)
    }
}

impl From<RemoteError> for SyncError {
    fn from(e: RemoteError) -> Self {
        match e {
            RemoteError::Auth(msg) => Self::Auth(msg),
            other => Self::Remote(other),
        }
    }
}

impl From<RangeError> for SyncError {
    fn from(e: RangeError) -> Self {
        Self::Parse(e.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(e: serde_json::Error) -> Self {
        Self::Parse(e.to_string())
    }
}

/// Failure taxonomy of a sync pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Credentials rejected.
    AuthFailure,
    /// Network, timeout or local store hiccup.
    TransientIo,
    /// Fallback identifier could not be repaired yet.
    IdentityUnresolved,
    /// Malformed or unexpected payload.
    Parse,
    /// Run guard already held.
    ConcurrencyConflict,
    /// External cancellation.
    Cancelled,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::AuthFailure => "auth-failure",
            Self::TransientIo => "transient-io",
            Self::IdentityUnresolved => "identity-unresolved",
            Self::Parse => "parse",
            Self::ConcurrencyConflict => "concurrency-conflict",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}
