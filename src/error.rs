//! Error types for the panellog CLI.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (2=storage, 3=not_found, 4=validation, etc.)
//! - Context-aware recovery hints
//! - Structured JSON output for piped / non-TTY consumers
//!
//! Three categories matter to the core:
//! - **Storage**: the database is unreachable or rejected the statement.
//!   Primary CRUD surfaces these; the audit sink swallows them.
//! - **Not found**: an explicit lookup by surrogate id missed. Natural-key
//!   lookups return `Option` instead and never produce this.
//! - **Validation**: bad row or argument input. During import it only
//!   causes the row to be skipped.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for panellog operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Storage (exit 2)
    NotInitialized,
    StorageError,

    // Not Found (exit 3)
    EntryNotFound,

    // Validation (exit 4)
    ValidationError,
    InvalidArgument,

    // Config (exit 7)
    ConfigError,

    // I/O (exit 8)
    IoError,
    JsonError,

    // Internal (exit 1)
    InternalError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::NotInitialized => "NOT_INITIALIZED",
            Self::StorageError => "STORAGE_ERROR",
            Self::EntryNotFound => "ENTRY_NOT_FOUND",
            Self::ValidationError => "VALIDATION_ERROR",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::ConfigError => "CONFIG_ERROR",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Category-based exit code.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InternalError => 1,
            Self::NotInitialized | Self::StorageError => 2,
            Self::EntryNotFound => 3,
            Self::ValidationError | Self::InvalidArgument => 4,
            Self::ConfigError => 7,
            Self::IoError | Self::JsonError => 8,
        }
    }

    /// Whether retrying with corrected input can succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ValidationError | Self::InvalidArgument | Self::StorageError
        )
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur in panellog operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Not initialized: run `plog init` first")]
    NotInitialized,

    #[error("Already initialized at {path}")]
    AlreadyInitialized { path: PathBuf },

    #[error("Entry not found: {id}")]
    EntryNotFound { id: i64 },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage unavailable: {0}")]
    Storage(String),

    #[error("Invalid {field}: {message}")]
    Validation { field: &'static str, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for a field-level validation failure.
    #[must_use]
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::NotInitialized | Self::AlreadyInitialized { .. } => ErrorCode::NotInitialized,
            Self::Database(_) | Self::Storage(_) => ErrorCode::StorageError,
            Self::EntryNotFound { .. } => ErrorCode::EntryNotFound,
            Self::Validation { .. } => ErrorCode::ValidationError,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::Config(_) => ErrorCode::ConfigError,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::JsonError,
            Self::Other(_) => ErrorCode::InternalError,
        }
    }

    /// True for failures reaching or writing the durable store.
    #[must_use]
    pub const fn is_storage(&self) -> bool {
        matches!(self.error_code(), ErrorCode::StorageError)
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// Context-aware recovery hint.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::NotInitialized => Some("Run `plog init` to create the database".to_string()),

            Self::AlreadyInitialized { path } => Some(format!(
                "Database already exists at {}. Use `--force` to reinitialize.",
                path.display()
            )),

            Self::EntryNotFound { id } => Some(format!(
                "No entry with id {id}. Use `plog list` or `plog query` to find ids."
            )),

            Self::Validation { field, .. } => match *field {
                "time" => Some(
                    "Accepted time formats: yyyy/MM/dd HH:mm:ss, yyyy-MM-dd HH:mm:ss, \
                     yyyy-MM-ddTHH:mm:ss, or a bare date"
                        .to_string(),
                ),
                "panel_id" | "lot_id" | "carrier_id" => {
                    Some("Panel, lot and carrier ids must be whole numbers".to_string())
                }
                _ => None,
            },

            Self::Database(_) | Self::Storage(_) => Some(
                "Check that the database file exists and is writable (see `plog status`)"
                    .to_string(),
            ),

            Self::Io(_) | Self::Json(_) | Self::InvalidArgument(_) | Self::Config(_)
            | Self::Other(_) => None,
        }
    }

    /// Structured JSON representation for machine consumption.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "retryable": code.is_retryable(),
                "exit_code": code.exit_code(),
            }
        });

        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }
}
