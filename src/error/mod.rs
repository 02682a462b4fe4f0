//! Error types for check discovery and image handling
//!
//! One enum per concern: check discovery, external tools, image references
//! and image handling.

use std::path::PathBuf;
use thiserror::Error;

/// Failures while discovering check classes.
#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("Provided path {0} is not a directory")]
    NotADirectory(PathBuf),

    #[error("Path {path} is not placed in a directory {base}")]
    OutsideSearchPath { path: PathBuf, base: PathBuf },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Module '{module}' ({path}) is not a valid check unit: {source}")]
    Syntax {
        module: String,
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Module '{module}' imports '{import}' which cannot be resolved")]
    UnresolvedImport { module: String, import: String },

    #[error("Class '{class}' in module '{module}' derives from unknown base '{base}'")]
    UnresolvedBase {
        module: String,
        class: String,
        base: String,
    },

    #[error("Check '{class}' in module '{module}' has no name")]
    MissingName { module: String, class: String },

    #[error("Failed to receive metadata for check '{name}' in {dir}: {message}")]
    Metadata {
        name: String,
        dir: PathBuf,
        message: String,
    },

    #[error("Check name '{name}' is declared by both {first} and {second}")]
    DuplicateName {
        name: String,
        first: String,
        second: String,
    },
}

/// Failures of a single external tool invocation.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Failed to run '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command '{command}' exited with {status}: {output}")]
    Exit {
        command: String,
        status: ExitCode,
        output: String,
    },
}

/// Exit status of a failed command; signals have no code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Code(i32),
    Signal,
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitCode::Code(code) => write!(f, "exit code {}", code),
            ExitCode::Signal => write!(f, "a signal"),
        }
    }
}

/// Image references that cannot name a repository.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReferenceError {
    #[error("Empty image reference")]
    Empty,

    #[error("Image reference '{0}' has an empty repository")]
    EmptyRepository(String),
}

/// Failures while staging, checking out or reading an image.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error(transparent)]
    Reference(#[from] ReferenceError),

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error("Staging error at {path}: {source}")]
    Staging {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid manifest {path}: {message}")]
    Manifest { path: PathBuf, message: String },

    #[error("Failed to parse {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("There was an error while accessing file {path}: {source}")]
    FileAccess {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0} is not a file")]
    NotAFile(String),

    #[error("Cannot {operation} an image that is {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },
}

/// Top-level failure of a CLI command.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Loader(#[from] LoaderError),

    #[error(transparent)]
    Image(#[from] ImageError),
}

pub type LoaderResult<T> = std::result::Result<T, LoaderError>;
pub type ProcessResult<T> = std::result::Result<T, ProcessError>;
pub type Result<T> = std::result::Result<T, ImageError>;
