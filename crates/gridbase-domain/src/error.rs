//! Error taxonomy
//!
//! One enum, one variant per error kind named in the design's error
//! handling section. Every layer returns [`Result`]; infrastructure
//! adapters translate driver-level failures into the matching variant
//! rather than letting them escape as opaque strings.

use thiserror::Error;

/// Result type alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the spreadsheet engine.
#[derive(Error, Debug)]
pub enum Error {
    /// Input shape, missing required field, choice not in enum, invalid
    /// identifier. Never retried automatically.
    #[error("validation error: {message}")]
    Validation {
        /// Human-readable description.
        message: String,
    },

    /// Base/Table/Field/Record absent.
    #[error("{resource} not found: {id}")]
    NotFound {
        /// Kind of resource (`"base"`, `"table"`, `"field"`, `"record"`, ...).
        resource: &'static str,
        /// Identifier that was looked up.
        id: String,
    },

    /// Optimistic-lock mismatch or duplicate-name. Retriable by the caller
    /// with fresh state.
    #[error("conflict: {message}")]
    Conflict {
        /// Human-readable description.
        message: String,
        /// Version the caller expected, if this is a lock conflict.
        expected_version: Option<i64>,
        /// Version actually stored, if this is a lock conflict.
        current_version: Option<i64>,
    },

    /// A virtual field failed to evaluate. Never fails the enclosing
    /// record write; the caller sets `Field.has_error` instead of
    /// propagating this further.
    #[error("computation error on field {field_id}: {message}")]
    Computation {
        /// Field that failed to evaluate.
        field_id: String,
        /// Human-readable description.
        message: String,
    },

    /// A Link operation referenced a non-existent peer.
    #[error("referential error: {message}")]
    Referential {
        /// Human-readable description.
        message: String,
    },

    /// Driver-level database failure.
    #[error("database error: {message}")]
    Database {
        /// Human-readable description.
        message: String,
        /// Underlying driver error, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// WebSocket read/write failure; triggers connection teardown.
    #[error("transport error: {message}")]
    Transport {
        /// Human-readable description.
        message: String,
    },

    /// Configuration could not be loaded or failed validation.
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable description.
        message: String,
    },

    /// JSON (de)serialization failure.
    #[error("json error: {source}")]
    Json {
        /// Underlying serde error.
        #[from]
        source: serde_json::Error,
    },

    /// I/O failure (config file reads, etc).
    #[error("io error: {source}")]
    Io {
        /// Underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Cache provider failure.
    #[error("cache error: {message}")]
    Cache {
        /// Human-readable description.
        message: String,
    },

    /// Internal invariant violation that should never surface to a caller
    /// but is not worth a panic.
    #[error("internal error: {message}")]
    Internal {
        /// Human-readable description.
        message: String,
    },
}

impl Error {
    /// Build a [`Error::Validation`].
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Build a [`Error::NotFound`].
    pub fn not_found(resource: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource,
            id: id.into(),
        }
    }

    /// Build a plain [`Error::Conflict`] without version details.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
            expected_version: None,
            current_version: None,
        }
    }

    /// Build a version-conflict [`Error::Conflict`] (optimistic lock).
    pub fn version_conflict(expected: i64, current: i64) -> Self {
        Self::Conflict {
            message: format!(
                "version conflict: expected {expected}, current {current}"
            ),
            expected_version: Some(expected),
            current_version: Some(current),
        }
    }

    /// Build a [`Error::Database`] wrapping a driver error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
            source: None,
        }
    }

    /// Returns true if the caller may retry the operation with fresh state.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}
