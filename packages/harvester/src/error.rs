//! Error types for the harvester.
//!
//! Transient API errors never reach this type: the retrying RPC client
//! degrades them to an empty result. Everything here is either fatal for the
//! current scope or a CLI usage error with its own exit code.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for the harvester library.
#[derive(Debug, Error)]
pub enum HarvesterError {
    /// HTTP request failed for a reason other than connectivity.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote host could not be reached (connect failure or timeout).
    #[error("Connection to {url} failed: {message}")]
    Connection { url: String, message: String },

    /// Response matched neither `result.data` nor `error.message`.
    #[error("Unexpected response envelope from {method}: {body}")]
    Protocol { method: String, body: String },

    /// JSON (de)serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Required field absent from a source record.
    #[error("Missing required field '{field}' in {context}")]
    MissingField { field: String, context: String },

    /// Field present but not convertible to the expected type.
    #[error("Invalid value for field '{field}' in {context}: {value}")]
    InvalidField {
        field: String,
        context: String,
        value: String,
    },

    /// Geocoder XML parsing failed.
    #[error("XML parsing failed: {0}")]
    XmlParse(#[from] roxmltree::Error),

    /// SQLite error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file or environment value rejected.
    #[error("Configuration error: {0}")]
    Config(String),

    /// YAML configuration could not be parsed.
    #[error("YAML configuration error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    /// A failure while processing one scope (town or region).
    #[error("Failed on {scope} {id}: {source}")]
    Scope {
        scope: &'static str,
        id: i64,
        #[source]
        source: Box<HarvesterError>,
    },

    /// Positional CLI argument missing (1-based position).
    #[error("Argument {position} ({name}) is not specified")]
    MissingArgument { position: u8, name: &'static str },

    /// Referenced input file does not exist.
    #[error("No such file: {}", .0.display())]
    InputNotFound(PathBuf),

    /// Input contained nothing to process.
    #[error("Empty input: {0}")]
    EmptyInput(String),
}

impl HarvesterError {
    /// Wrap an error with the scope being processed when it happened.
    #[must_use]
    pub fn in_scope(self, scope: &'static str, id: i64) -> Self {
        Self::Scope {
            scope,
            id,
            source: Box::new(self),
        }
    }

    /// Process exit code for this error.
    ///
    /// Missing first/second positional argument exit with 1/2, an absent input
    /// file with 3 and an empty input set with 4. Everything else is 1.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::MissingArgument { position, .. } => i32::from(*position),
            Self::InputNotFound(_) => 3,
            Self::EmptyInput(_) => 4,
            Self::Scope { source, .. } => source.exit_code(),
            _ => 1,
        }
    }

    /// True when the underlying failure is a lost connection.
    #[must_use]
    pub fn is_connection(&self) -> bool {
        match self {
            Self::Connection { .. } => true,
            Self::Scope { source, .. } => source.is_connection(),
            _ => false,
        }
    }
}

/// Result type alias for harvester operations.
pub type Result<T> = std::result::Result<T, HarvesterError>;
