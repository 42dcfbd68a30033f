//! Error types for window parameter storage and application
//!
//! This module defines the error types used throughout the winparams library.
//! All fallible public functions return [`Result<T, Error>`] for consistent
//! error handling.

/// Errors that can occur while building the catalog, editing settings or
/// applying parameters
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The host-provided settings backend rejected an operation
    #[error("Settings backend error: {0}")]
    Backend(String),

    /// The settings document could not be serialized
    #[error("Failed to serialize settings: {0}")]
    Serialize(#[from] serde_json::Error),

    /// I/O error in the file-backed settings backend
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An Enum or Flags parameter was built without its member table
    #[error("No member table provided for parameter '{param}'")]
    MissingMemberTable { param: String },

    /// Identifier that is not one of the recognized window parameters
    #[error("Unknown window parameter: {0}")]
    UnknownParam(String),

    /// Member name that is not in a parameter's member table
    #[error("Parameter '{param}' has no member named '{member}'")]
    UnknownMember { param: String, member: String },

    /// Value whose shape does not match the parameter's domain
    #[error("Invalid value for '{param}': {message}")]
    InvalidValue { param: String, message: String },

    /// Configuration file could not be read or parsed
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for convenience
///
/// # Example
///
/// ```rust
/// use winparams::{Result, WindowParam};
///
/// fn parse_param(name: &str) -> Result<WindowParam> {
///     name.parse()
/// }
///
/// assert!(parse_param("minheight").is_ok());
/// assert!(parse_param("maxheight").is_err());
/// ```
pub type Result<T> = std::result::Result<T, Error>;
