//! Error handling for stemflow
//!
//! Every core operation returns [`Result`]. Expected outcomes such as an
//! unknown project or an id collision are typed variants, not panics.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for stemflow operations
pub type Result<T> = std::result::Result<T, StemflowError>;

/// Main error type for stemflow operations
#[derive(Error, Debug)]
pub enum StemflowError {
    // Registry Errors
    #[error("Invalid modules: {}", ids.join(", "))]
    InvalidModule { ids: Vec<String> },

    #[error("Cyclic module dependency among: {}", modules.join(", "))]
    CyclicDependency { modules: Vec<String> },

    #[error("Module '{module}' depends on unregistered module '{dependency}'")]
    UnknownDependency { module: String, dependency: String },

    #[error("Module '{id}' is registered more than once")]
    DuplicateModule { id: String },

    // Project Errors
    #[error("Project not found: {id}")]
    ProjectNotFound { id: String },

    #[error("Project already exists: {id}")]
    AlreadyExists { id: String },

    #[error("Original file '{filename}' is missing from project {id}")]
    OriginalMissing { id: String, filename: String },

    #[error("Invalid file name: {name}")]
    InvalidFilename { name: String },

    // Execution Errors
    #[error("Module '{module}' failed: {reason}")]
    ModuleExecution { module: String, reason: String },

    // Mix Errors
    #[error("Sample rate mismatch: {file} is {found} Hz, expected {expected} Hz")]
    SampleRateMismatch {
        file: String,
        found: u32,
        expected: u32,
    },

    #[error("Channel mismatch: {file} has {found} channels, expected 1 or {expected}")]
    ChannelMismatch {
        file: String,
        found: usize,
        expected: usize,
    },

    #[error("At least two tracks are required to unify, got {count}")]
    NotEnoughTracks { count: usize },

    // Audio Errors
    #[error("Invalid audio file {path}: {reason}")]
    InvalidAudio { path: PathBuf, reason: String },

    #[error("Unsupported audio format: {format}")]
    UnsupportedFormat { format: String },

    // File Errors
    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Failed to read file: {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file: {path}: {source}")]
    FileWriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Directory creation failed: {path}: {source}")]
    DirectoryCreateError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Configuration Errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Serialization Errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StemflowError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            StemflowError::InvalidModule { .. } => "INVALID_MODULE",
            StemflowError::CyclicDependency { .. } => "CYCLIC_DEPENDENCY",
            StemflowError::UnknownDependency { .. } => "UNKNOWN_DEPENDENCY",
            StemflowError::DuplicateModule { .. } => "DUPLICATE_MODULE",
            StemflowError::ProjectNotFound { .. } => "PROJECT_NOT_FOUND",
            StemflowError::AlreadyExists { .. } => "ALREADY_EXISTS",
            StemflowError::OriginalMissing { .. } => "ORIGINAL_MISSING",
            StemflowError::InvalidFilename { .. } => "INVALID_FILENAME",
            StemflowError::ModuleExecution { .. } => "MODULE_EXECUTION",
            StemflowError::SampleRateMismatch { .. } => "SAMPLE_RATE_MISMATCH",
            StemflowError::ChannelMismatch { .. } => "CHANNEL_MISMATCH",
            StemflowError::NotEnoughTracks { .. } => "NOT_ENOUGH_TRACKS",
            StemflowError::InvalidAudio { .. } => "INVALID_AUDIO",
            StemflowError::UnsupportedFormat { .. } => "UNSUPPORTED_FORMAT",
            StemflowError::FileNotFound { .. } => "FILE_NOT_FOUND",
            StemflowError::FileReadError { .. } => "FILE_READ_ERROR",
            StemflowError::FileWriteError { .. } => "FILE_WRITE_ERROR",
            StemflowError::DirectoryCreateError { .. } => "DIRECTORY_CREATE_ERROR",
            StemflowError::Config(_) => "CONFIG_ERROR",
            StemflowError::Json(_) => "SERIALIZATION_ERROR",
            StemflowError::Io(_) => "IO_ERROR",
        }
    }

    /// Returns true if the error was caused by the caller's input rather
    /// than by the system or an external module.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            StemflowError::InvalidModule { .. }
                | StemflowError::ProjectNotFound { .. }
                | StemflowError::InvalidFilename { .. }
                | StemflowError::SampleRateMismatch { .. }
                | StemflowError::ChannelMismatch { .. }
                | StemflowError::NotEnoughTracks { .. }
                | StemflowError::UnsupportedFormat { .. }
                | StemflowError::FileNotFound { .. }
        )
    }

    /// Returns a user-friendly recovery suggestion.
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            StemflowError::InvalidModule { .. } => {
                Some("Run 'stemflow modules' to list the available module ids.")
            }
            StemflowError::ProjectNotFound { .. } => {
                Some("Run 'stemflow rescan' if the project folder was added while running.")
            }
            StemflowError::ModuleExecution { .. } => {
                Some("Completed modules were kept. Fix the runner and request the module again.")
            }
            StemflowError::SampleRateMismatch { .. } => {
                Some("Only stems sharing one sample rate can be unified.")
            }
            StemflowError::ChannelMismatch { .. } => {
                Some("Only mono stems can be widened; other channel layouts must match exactly.")
            }
            StemflowError::OriginalMissing { .. } => {
                Some("Place the original audio file in the project folder before processing.")
            }
            _ => None,
        }
    }
}
