//! Error types for etlgen.

use thiserror::Error;

/// The main error type for etlgen operations.
///
/// Parsing table sheets never fails and the query builder signals a missing
/// source table with `None`; these variants cover the surrounding plumbing.
#[derive(Debug, Error)]
pub enum EtlError {
    /// A line could not be parsed by a strict caller.
    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    /// No FROM table could be derived for the table.
    #[error("No usable source table for '{table}'")]
    NoSourceTable { table: String },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed TOML configuration.
    #[error("Invalid configuration file: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EtlError {
    /// Create a parse error at the given (1-based) line.
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }

    /// Create a missing source table error.
    pub fn no_source_table(table: impl Into<String>) -> Self {
        Self::NoSourceTable {
            table: table.into(),
        }
    }
}

/// Result type alias for etlgen operations.
pub type EtlResult<T> = Result<T, EtlError>;
