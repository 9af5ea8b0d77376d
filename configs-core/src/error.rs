//! Error types for config store operations

use thiserror::Error;

/// Envelope and payload codec errors.
///
/// Any of these surfaced during a decode means the stored bytes are corrupt
/// or were written by an incompatible producer; the operation that triggered
/// the decode fails, nothing else does.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EnvelopeError {
    #[error("envelope marker mismatch: got {got:02x?}")]
    MarkerMismatch { got: Vec<u8> },

    #[error("envelope truncated: need at least {needed} bytes, got {got}")]
    Truncated { needed: usize, got: usize },

    #[error("payload decode failed at byte {offset}: {reason}")]
    Decode { offset: usize, reason: String },

    #[error("value does not match schema: {reason}")]
    SchemaMismatch { reason: String },
}

/// Schema registry errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("no schema registered for fingerprint {fingerprint}")]
    SchemaNotFound { fingerprint: String },

    #[error("registry returned an invalid fingerprint: {value}")]
    InvalidFingerprint { value: String },

    #[error("registry returned an unparseable schema definition: {reason}")]
    InvalidSchema { reason: String },

    #[error("registry request failed after {attempts} attempts: {reason}")]
    Transport { attempts: u32, reason: String },
}

/// Persistence layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("no stored config for key {key}")]
    NotFound { key: String },

    #[error("connection pool unavailable: {reason}")]
    Pool { reason: String },

    #[error("database operation failed: {reason}")]
    Database { reason: String },
}

/// Request validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Master error type for all config store operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("envelope error: {0}")]
    Envelope(#[from] EnvelopeError),

    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Schema registration failed; the process must not serve traffic.
    #[error("startup failed: {0}")]
    Startup(String),
}

/// Result type alias for config store operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

// =============================================================================
// TESTS
// =============================================================================
