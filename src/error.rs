//! Error types for the signing pipeline.
//!
//! Every failure in the core is fatal: nothing here is retried or downgraded,
//! the error is simply carried up to the binary, which prints it and exits.

use std::path::PathBuf;

use thiserror::Error;

/// Configuration problems detected by [`crate::BundleConfig::validate`]
/// before any file in the bundle is touched.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("this process must be run on macOS (running on {0})")]
    WrongPlatform(String),

    #[error("path to app bundle does not exist: {}", .0.display())]
    BundleMissing(PathBuf),

    #[error("app bundle must be a directory: {}", .0.display())]
    BundleIsFile(PathBuf),

    #[error("suffix \".app\" expected for app bundle {}", .0.display())]
    WrongSuffix(PathBuf),

    #[error("signing identity must contain a Developer ID Application certificate name (got {0:?})")]
    InvalidIdentity(Option<String>),

    #[error("invalid settings file {}: {reason}", path.display())]
    Settings { path: PathBuf, reason: String },
}

/// Top-level error for signing operations.
#[derive(Error, Debug)]
pub enum CodesignError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("unable to find \"Info.plist\" for item {}", item.display())]
    MetadataNotFound { item: PathBuf },

    #[error("{program} failed with exit code {code}: {output}")]
    ToolFailed {
        program: String,
        code: String,
        output: String,
    },

    #[error("{} is not a property list dictionary", path.display())]
    NotADictionary { path: PathBuf },

    #[error("required tool not found in PATH: {program}")]
    ToolNotFound { program: String },

    #[error("not implemented: {0}")]
    NotImplemented(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("property list error: {0}")]
    Plist(#[from] plist::Error),
}

impl CodesignError {
    /// Wrap an I/O error with a short description of what was attempted.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        CodesignError::Io {
            context: context.into(),
            source,
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CodesignError>;
