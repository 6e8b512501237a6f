use std::path::PathBuf;

use thiserror::Error;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The result of a cauldron-related operation.
pub type CauldronResult<T> = Result<T, CauldronError>;

/// An error that occurred inside the engine itself.
///
/// Failures of the code under evaluation never surface as a `CauldronError`; they are turned
/// into output messages or test results. This type covers the machinery around them.
#[derive(pretty_error_debug::Debug, Error)]
pub enum CauldronError {
    /// An I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A JSON (de)serialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The isolation boundary itself failed.
    #[error("isolation boundary failure: {0}")]
    Boundary(String),

    /// The worker program used for process isolation could not be started.
    #[error("worker program {path} is unavailable: {reason}")]
    WorkerUnavailable {
        /// The program that was attempted.
        path: PathBuf,

        /// Why it could not be used.
        reason: String,
    },

    /// A configuration value is invalid.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// No challenge exists with the given id.
    #[error("challenge not found: {0}")]
    ChallengeNotFound(String),

    /// The challenge is written in a language the engine does not execute.
    #[error("unsupported language: {0}. Only javascript can be executed")]
    UnsupportedLanguage(String),
}
