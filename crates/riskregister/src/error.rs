//! Error types for riskregister.
//!
//! This module defines all error types used throughout the riskregister crate,
//! providing detailed context for debugging and user-friendly error messages.

use std::path::PathBuf;
use thiserror::Error;

use crate::validation::ValidationErrors;

/// The main error type for riskregister operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Storage Errors ===
    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    /// A stored value could not be decoded.
    #[error("corrupt value in column '{column}': {value}")]
    CorruptValue {
        /// Column holding the value.
        column: &'static str,
        /// The offending raw value.
        value: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Register Errors ===
    /// The requested project does not exist.
    #[error("project not found: {id}")]
    ProjectNotFound {
        /// Project identifier.
        id: String,
    },

    /// The requested risk does not exist in the project.
    #[error("risk {id} not found in project {project}")]
    RiskNotFound {
        /// Project identifier.
        project: String,
        /// Risk identifier.
        id: String,
    },

    /// No project was given and no default project is configured.
    #[error("no project selected; pass --project or set register.default_project")]
    NoProjectSelected,

    /// Submitted fields failed validation.
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    /// A risk search pattern is not a valid regular expression.
    #[error("invalid search pattern: {0}")]
    SearchPattern(#[from] regex::Error),

    // === Exchange Errors ===
    /// The file format could not be determined or is not supported.
    #[error("unsupported file format: {path}")]
    UnsupportedFormat {
        /// Path whose extension was not recognised.
        path: PathBuf,
    },

    /// Imported data could not be understood.
    #[error("import failed: {message}")]
    Import {
        /// Description of what went wrong.
        message: String,
    },

    /// Export could not be produced.
    #[error("export failed: {message}")]
    Export {
        /// Description of what went wrong.
        message: String,
    },

    /// CSV reading or writing failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Writing an XLSX workbook failed.
    #[error("XLSX write error: {0}")]
    XlsxWrite(#[from] rust_xlsxwriter::XlsxError),

    /// Reading an XLSX workbook failed.
    #[error("XLSX read error: {0}")]
    XlsxRead(#[from] calamine::XlsxError),

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for riskregister operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl From<ValidationErrors> for Error {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }
}

impl Error {
    /// Create a new import error.
    #[must_use]
    pub fn import(message: impl Into<String>) -> Self {
        Self::Import {
            message: message.into(),
        }
    }

    /// Create a new export error.
    #[must_use]
    pub fn export(message: impl Into<String>) -> Self {
        Self::Export {
            message: message.into(),
        }
    }

    /// Create a project-not-found error.
    #[must_use]
    pub fn project_not_found(id: impl Into<String>) -> Self {
        Self::ProjectNotFound { id: id.into() }
    }

    /// Create a risk-not-found error.
    #[must_use]
    pub fn risk_not_found(project: impl Into<String>, id: impl Into<String>) -> Self {
        Self::RiskNotFound {
            project: project.into(),
            id: id.into(),
        }
    }

    /// Check if this error reports a missing project or risk.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::ProjectNotFound { .. } | Self::RiskNotFound { .. }
        )
    }

    /// Check if this error is a validation failure.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Field-level validation errors, if this is a validation failure.
    #[must_use]
    pub fn validation_errors(&self) -> Option<&ValidationErrors> {
        match self {
            Self::Validation(errors) => Some(errors),
            _ => None,
        }
    }
}
