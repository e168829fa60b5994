//! Error types for the health gate
//!
//! Only construction and configuration errors ever reach a caller. Check-level
//! failures are classified by [`CheckFailure`], logged, and folded into a
//! boolean verdict by the evaluator.

use thiserror::Error;

/// Errors surfaced by gate construction and configuration loading
#[derive(Error, Debug)]
pub enum GateError {
    #[error(
        "Celery health gate has already been initialized; use get_instance() to access it"
    )]
    AlreadyInitialized,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to read config file {path}: {source}")]
    ConfigFileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    ConfigParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration in {path}: {reason}")]
    ConfigValidationFailed { path: String, reason: String },
}

/// Convenience type alias for Results
pub type GateResult<T> = Result<T, GateError>;

/// Why a single dependency check failed
///
/// Never propagated out of the evaluator. Each kind maps to `false` and picks
/// the log level its failure is reported at.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CheckFailure {
    #[error("broker unreachable at {url}: {reason}")]
    Connectivity { url: String, reason: String },

    #[error("result store round-trip failed: {0}")]
    Store(String),

    #[error("no workers responded to ping within {timeout_ms}ms")]
    NoWorkersResponded { timeout_ms: u128 },

    #[error("unexpected error during {check} check: {reason}")]
    Evaluation { check: &'static str, reason: String },
}

impl CheckFailure {
    /// Whether the failure is an expected operational condition rather than a hard error
    ///
    /// An empty ping set is reported at warn level; every other kind at error level.
    pub fn is_warning(&self) -> bool {
        matches!(self, Self::NoWorkersResponded { .. })
    }
}
