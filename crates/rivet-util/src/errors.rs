use miette::Diagnostic;
use thiserror::Error;

/// Unified error type for all Rivet operations.
#[derive(Debug, Error, Diagnostic)]
pub enum RivetError {
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or malformed project manifest (`rivet.toml`).
    #[error("Manifest error: {message}")]
    #[diagnostic(help("Check your rivet.toml for syntax errors"))]
    Manifest { message: String },

    /// A version or version range could not be parsed or is invalid.
    #[error("Invalid version: {message}")]
    Version { message: String },

    /// A target framework name could not be parsed.
    #[error("Invalid framework: {message}")]
    Framework { message: String },

    /// The restore request is malformed. Raised before any graph walk starts.
    #[error("Invalid restore request: {message}")]
    #[diagnostic(help("Fix the dependency declarations in rivet.toml and retry"))]
    Request { message: String },

    /// Dependency resolution failed for one or more target graphs.
    #[error("Restore failed: {message}")]
    Resolution { message: String },

    /// A package feed could not be read.
    #[error("Feed error: {message}")]
    Feed { message: String },

    /// The restore operation was cancelled.
    #[error("Restore cancelled")]
    Cancelled,

    /// Catch-all for miscellaneous errors.
    #[error("{message}")]
    Generic { message: String },
}

/// Convenience alias for `miette::Result<T>`.
pub type RivetResult<T> = miette::Result<T>;
