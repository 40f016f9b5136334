//! Error types for the Quotaward service.

use thiserror::Error;

/// Main error type for Quotaward operations.
///
/// Admission decisions themselves never fail; these errors come from
/// construction, configuration and socket setup.
#[derive(Error, Debug)]
pub enum QuotawardError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A policy was constructed with a zero limit or window
    #[error("Invalid policy: {0}")]
    InvalidPolicy(String),

    /// A policy name outside the built-in set
    #[error("Unknown policy: {0}")]
    UnknownPolicy(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Quotaward operations.
pub type Result<T> = std::result::Result<T, QuotawardError>;
