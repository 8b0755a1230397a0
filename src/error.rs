//! Error types for the relay
//!
//! Provides structured error handling with:
//! - Numeric error codes for machine parsing
//! - User-friendly messages with suggestions
//! - Error context and chaining
//! - Exit codes for CLI

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for relay operations
pub type Result<T> = std::result::Result<T, Error>;

/// Numeric error codes for machine parsing and documentation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ErrorCode {
    // Configuration errors (1xx)
    ConfigNotFound = 100,
    ConfigParseError = 101,
    ConfigValidation = 102,

    // Storage / IO errors (2xx)
    StorageFailure = 200,
    StorageMalformed = 201,
    IoRead = 210,
    IoWrite = 211,
    IoNotFound = 212,
    IoPermission = 213,

    // Capability errors (3xx)
    Unavailable = 300,
    CreationFailure = 301,
    CapabilityNotRegistered = 302,

    // Streaming errors (4xx)
    StreamFailure = 400,
    SessionCancelled = 401,

    // Protocol errors (5xx)
    ProtocolVersion = 500,
    ProtocolMalformed = 501,

    // Internal errors (9xx)
    InternalError = 900,
    NotSupported = 901,
}

impl ErrorCode {
    /// Get the string code (e.g., "E300")
    pub fn as_str(&self) -> String {
        format!("E{}", *self as u16)
    }

    /// Get the exit code for CLI (maps to 1-125 range)
    pub fn exit_code(&self) -> i32 {
        match *self as u16 {
            100..=199 => 10, // Config errors
            200..=299 => 20, // Storage / IO errors
            300..=399 => 30, // Capability errors
            400..=499 => 40, // Streaming errors
            500..=599 => 50, // Protocol errors
            900..=999 => 90, // Internal errors
            _ => 1,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Main error type for the relay
#[derive(Error, Debug)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound {
        path: PathBuf,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Configuration parse error
    #[error("Failed to parse configuration: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<toml::de::Error>,
    },

    /// Configuration validation error
    #[error("Configuration validation failed: {message}")]
    ConfigValidation { message: String, field: Option<String> },

    /// Generic configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    // ─────────────────────────────────────────────────────────────
    // Storage / IO Errors
    // ─────────────────────────────────────────────────────────────

    /// Durable storage write/remove failure
    #[error("Storage failure for record '{key}': {message}")]
    StorageFailure {
        key: String,
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Stored record exists but does not deserialize
    #[error("Malformed storage record '{key}': {message}")]
    StorageMalformed { key: String, message: String },

    /// File read error
    #[error("Failed to read file: {path}")]
    IoRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File write error
    #[error("Failed to write file: {path}")]
    IoWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    Toml(#[from] toml::ser::Error),

    // ─────────────────────────────────────────────────────────────
    // Capability Errors
    // ─────────────────────────────────────────────────────────────

    /// Capability cannot run on this device
    #[error("{capability} is not available on this device")]
    Unavailable { capability: String },

    /// Capability construction failed
    #[error("Failed to open {capability}: {message}")]
    CreationFailure { capability: String, message: String },

    /// No provider registered for the requested capability
    #[error("No capability provider registered under '{name}'")]
    CapabilityNotRegistered { name: String },

    // ─────────────────────────────────────────────────────────────
    // Streaming Errors
    // ─────────────────────────────────────────────────────────────

    /// Failure mid-iteration over a chunk stream
    #[error("Stream failed: {message}")]
    StreamFailure { message: String },

    /// Session stopped because a newer trigger superseded it
    #[error("Session {session} cancelled")]
    SessionCancelled { session: u64 },

    // ─────────────────────────────────────────────────────────────
    // Protocol Errors
    // ─────────────────────────────────────────────────────────────

    /// Protocol version mismatch
    #[error("Protocol version mismatch: expected {expected}, got {actual}")]
    ProtocolVersion { expected: String, actual: String },

    /// Malformed message
    #[error("Malformed protocol message: {message}")]
    ProtocolMalformed { message: String },

    /// JSON encode/decode error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ─────────────────────────────────────────────────────────────
    // Internal Errors
    // ─────────────────────────────────────────────────────────────

    /// Feature not supported by this capability variant
    #[error("Not supported: {0}")]
    NotSupported(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    // ─────────────────────────────────────────────────────────────
    // Error Classification
    // ─────────────────────────────────────────────────────────────

    /// Get the numeric error code
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::ConfigNotFound { .. } => ErrorCode::ConfigNotFound,
            Error::ConfigParse { .. } => ErrorCode::ConfigParseError,
            Error::ConfigValidation { .. } => ErrorCode::ConfigValidation,
            Error::Config(_) => ErrorCode::ConfigValidation,

            Error::StorageFailure { .. } => ErrorCode::StorageFailure,
            Error::StorageMalformed { .. } => ErrorCode::StorageMalformed,
            Error::IoRead { .. } => ErrorCode::IoRead,
            Error::IoWrite { .. } => ErrorCode::IoWrite,
            Error::Io(e) => match e.kind() {
                std::io::ErrorKind::NotFound => ErrorCode::IoNotFound,
                std::io::ErrorKind::PermissionDenied => ErrorCode::IoPermission,
                _ => ErrorCode::IoRead,
            },
            Error::Toml(_) => ErrorCode::ConfigParseError,

            Error::Unavailable { .. } => ErrorCode::Unavailable,
            Error::CreationFailure { .. } => ErrorCode::CreationFailure,
            Error::CapabilityNotRegistered { .. } => ErrorCode::CapabilityNotRegistered,

            Error::StreamFailure { .. } => ErrorCode::StreamFailure,
            Error::SessionCancelled { .. } => ErrorCode::SessionCancelled,

            Error::ProtocolVersion { .. } => ErrorCode::ProtocolVersion,
            Error::ProtocolMalformed { .. } => ErrorCode::ProtocolMalformed,
            Error::Json(_) => ErrorCode::ProtocolMalformed,

            Error::NotSupported(_) => ErrorCode::NotSupported,
            Error::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// Check if the error is fatal (process should exit)
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::ConfigNotFound { .. }
                | Error::ConfigParse { .. }
                | Error::ConfigValidation { .. }
                | Error::ProtocolVersion { .. }
                | Error::Unavailable { .. }
                | Error::Internal(_)
        )
    }

    /// Get the exit code for CLI
    pub fn exit_code(&self) -> i32 {
        self.code().exit_code()
    }

    // ─────────────────────────────────────────────────────────────
    // User-Friendly Messages
    // ─────────────────────────────────────────────────────────────

    /// Get a user-friendly suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Error::ConfigNotFound { .. } => Some(
                "Run 'webai-relay config init' to create a default configuration file."
            ),
            Error::ConfigParse { .. } => Some(
                "Check your configuration file syntax. Run 'webai-relay config validate' to see details."
            ),
            Error::ConfigValidation { .. } => Some(
                "Review the configuration file and fix the invalid values. See documentation for valid options."
            ),

            Error::StorageFailure { .. } => Some(
                "Check permissions on the storage data directory ('data_dir' under [storage])."
            ),
            Error::StorageMalformed { .. } => Some(
                "The stored selection could not be read; the first built-in level is used instead."
            ),

            Error::Unavailable { .. } => Some(
                "This capability cannot run on this device. Set provider = \"mock\" under [capability] to exercise the relay anyway."
            ),
            Error::CreationFailure { .. } => Some(
                "The capability failed to open. Re-run the trigger; there is no automatic retry."
            ),
            Error::CapabilityNotRegistered { .. } => Some(
                "Run 'webai-relay config init' and check the provider names listed under [capability]."
            ),

            Error::StreamFailure { .. } => Some(
                "The stream was aborted; partial output stays on screen. Re-trigger to start a new session."
            ),

            Error::ProtocolVersion { .. } => Some(
                "Your relay version may be outdated. Run 'webai-relay --version' and check for updates."
            ),

            _ => None,
        }
    }

    /// Format the error for terminal display with colors
    pub fn format_for_terminal(&self) -> String {
        let code = self.code();
        let suggestion = self.suggestion();

        let mut output = format!(
            "\x1b[31mError [{}]\x1b[0m: {}\n",
            code.as_str(),
            self
        );

        if let Some(hint) = suggestion {
            output.push_str(&format!("\n\x1b[33mHint\x1b[0m: {}\n", hint));
        }

        output
    }

    /// Format the error for logging (no colors)
    pub fn format_for_log(&self) -> String {
        let code = self.code();
        format!("[{}] {}", code.as_str(), self)
    }
}

// ─────────────────────────────────────────────────────────────────
// Error Constructors (for ergonomic error creation)
// ─────────────────────────────────────────────────────────────────

impl Error {
    /// Create a config not found error
    pub fn config_not_found(path: impl Into<PathBuf>) -> Self {
        Error::ConfigNotFound {
            path: path.into(),
            source: None,
        }
    }

    /// Create a config parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Error::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create a config validation error
    pub fn config_validation(message: impl Into<String>) -> Self {
        Error::ConfigValidation {
            message: message.into(),
            field: None,
        }
    }

    /// Create a config validation error with field name
    pub fn config_field_invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ConfigValidation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a storage failure error
    pub fn storage_failure(key: impl Into<String>, source: std::io::Error) -> Self {
        Error::StorageFailure {
            key: key.into(),
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// Create a malformed storage record error
    pub fn storage_malformed(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::StorageMalformed {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Create an unavailable-capability error
    pub fn unavailable(capability: impl Into<String>) -> Self {
        Error::Unavailable {
            capability: capability.into(),
        }
    }

    /// Create a creation failure error
    pub fn creation_failure(capability: impl Into<String>, message: impl Into<String>) -> Self {
        Error::CreationFailure {
            capability: capability.into(),
            message: message.into(),
        }
    }

    /// Create a stream failure error
    pub fn stream_failure(message: impl Into<String>) -> Self {
        Error::StreamFailure {
            message: message.into(),
        }
    }

    /// Create a session cancelled error
    pub fn session_cancelled(session: u64) -> Self {
        Error::SessionCancelled { session }
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
