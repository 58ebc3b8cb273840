//! Error types for convergence runs.
//!
//! Errors are categorized so the engine can decide, in one place, which
//! failures are retried, which switch a component to its fallback path, and
//! which abort the whole run.

use crate::host::{CommandOutput, DIAGNOSTIC_TAIL_LINES, Signal};
use std::fmt;
use std::io;
use std::path::PathBuf;

/// Result type alias for convergence operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of errors for retry, fallback and abort decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// A run-wide precondition is unmet (fatal).
    Precondition,
    /// Current state could not be determined.
    Detection,
    /// Signature or key verification failed.
    Trust,
    /// The preferred installation path is not available on this host.
    Unavailable,
    /// Downloaded artifact failed its integrity check.
    Validation,
    /// Network connectivity issue (transient).
    Network,
    /// Package database locked by another process.
    Locked,
    /// Any other action failure.
    Action,
    /// Filesystem error.
    Io,
    /// Invalid component set.
    Config,
}

impl ErrorCategory {
    /// Whether this error category is typically transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network | Self::Validation)
    }

    /// Whether an installer should abandon its primary path for its fallback.
    pub fn triggers_fallback(&self) -> bool {
        matches!(self, Self::Trust | Self::Unavailable)
    }

    /// Whether the whole run must stop.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Precondition)
    }

    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Precondition => "Precondition unmet",
            Self::Detection => "Detection inconclusive",
            Self::Trust => "Trust verification failed",
            Self::Unavailable => "Installation path unavailable",
            Self::Validation => "Artifact validation failed",
            Self::Network => "Network connectivity issue",
            Self::Locked => "Package database locked",
            Self::Action => "Action failed",
            Self::Io => "Filesystem error",
            Self::Config => "Invalid configuration",
        }
    }

    /// Get actionable advice for resolving this error category.
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Precondition => "Run as root or install and configure sudo",
            Self::Detection => "Check that the package and service managers are working",
            Self::Trust => "Refresh the repository signing key and try again",
            Self::Unavailable => "Check the repository URL in the configuration",
            Self::Validation => "The download may be truncated, try again",
            Self::Network => "Check your internet connection and try again",
            Self::Locked => "Wait for the other package manager process to finish",
            Self::Action => "Check the diagnostics for details",
            Self::Io => "Check directory permissions and free space",
            Self::Config => "Fix the component configuration",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur while detecting or acting on components.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A run-wide precondition failed (e.g. no privilege escalation).
    #[error("precondition unmet: {message}")]
    PreconditionUnmet {
        /// What is missing.
        message: String,
    },

    /// Detection could not decide; the engine treats this as Absent.
    #[error("detection inconclusive for {component}: {message}")]
    DetectionInconclusive {
        /// Component id.
        component: String,
        /// Why detection failed.
        message: String,
    },

    /// An external command for an action failed.
    #[error("{message} ({signal})")]
    ActionFailed {
        /// What was being done.
        message: String,
        /// Classified result of the failing command.
        signal: Signal,
        /// Output tail of the failing command.
        diagnostics: Option<String>,
    },

    /// The primary installation path cannot be used on this host.
    #[error("{path} unavailable: {reason}")]
    Unavailable {
        /// Name of the path.
        path: String,
        /// Why it cannot be used.
        reason: String,
    },

    /// A downloaded artifact failed its integrity check.
    #[error("validation failed for {artifact}: {reason}")]
    ValidationFailed {
        /// Artifact name.
        artifact: String,
        /// What check failed.
        reason: String,
    },

    /// An HTTP fetch failed.
    #[error("fetch failed for {url}: {message}")]
    Fetch {
        /// Requested URL.
        url: String,
        /// Error message.
        message: String,
    },

    /// IO error during file operations.
    #[error("IO error at {path}: {source}")]
    Io {
        /// Path involved in the error.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },

    /// Two components share an id.
    #[error("duplicate component id: {id}")]
    DuplicateComponent {
        /// The repeated id.
        id: String,
    },

    /// Other error.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Get the error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::PreconditionUnmet { .. } => ErrorCategory::Precondition,
            Error::DetectionInconclusive { .. } => ErrorCategory::Detection,
            Error::ActionFailed { signal, .. } => match signal {
                Signal::TrustFailure => ErrorCategory::Trust,
                Signal::Network => ErrorCategory::Network,
                Signal::Locked => ErrorCategory::Locked,
                _ => ErrorCategory::Action,
            },
            Error::Unavailable { .. } => ErrorCategory::Unavailable,
            Error::ValidationFailed { .. } => ErrorCategory::Validation,
            Error::Fetch { .. } => ErrorCategory::Network,
            Error::Io { .. } => ErrorCategory::Io,
            Error::DuplicateComponent { .. } => ErrorCategory::Config,
            Error::Other(_) => ErrorCategory::Action,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    pub fn triggers_fallback(&self) -> bool {
        self.category().triggers_fallback()
    }

    /// Captured output tail, when the error came from a command.
    pub fn diagnostics(&self) -> Option<String> {
        match self {
            Error::ActionFailed { diagnostics, .. } => diagnostics.clone(),
            _ => None,
        }
    }

    /// Build an [`Error::ActionFailed`] from a failed command.
    pub fn from_output(what: &str, output: &CommandOutput) -> Self {
        Self::from_output_tail(what, output, DIAGNOSTIC_TAIL_LINES)
    }

    /// Like [`Error::from_output`], keeping the last `lines` output lines.
    pub fn from_output_tail(what: &str, output: &CommandOutput, lines: usize) -> Self {
        let tail = output.tail(lines);
        Error::ActionFailed {
            message: match output.exit_code {
                Some(code) => format!("{what} exited with status {code}"),
                None => format!("{what} did not complete"),
            },
            signal: output.signal,
            diagnostics: (!tail.is_empty()).then_some(tail),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub fn precondition(message: impl Into<String>) -> Self {
        Error::PreconditionUnmet {
            message: message.into(),
        }
    }
}
