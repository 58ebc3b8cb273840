//! Core types for convergence runs

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which way a run converges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Bring every component to Present, dependencies first
    Install,
    /// Remove every component, dependents first
    Rollback,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Install => write!(f, "install"),
            Self::Rollback => write!(f, "rollback"),
        }
    }
}

/// Detected state of a managed component
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ComponentState {
    /// Component is installed and healthy
    Present { details: Option<String> },
    /// Component is not installed
    Absent,
    /// Something is on disk but fails validation; must be removed before reinstalling
    PresentButInvalid { reason: String },
}

impl ComponentState {
    /// Present with no extra details
    pub fn present() -> Self {
        Self::Present { details: None }
    }

    /// Present with a version string or similar detail
    pub fn present_with(details: impl Into<String>) -> Self {
        Self::Present {
            details: Some(details.into()),
        }
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::PresentButInvalid {
            reason: reason.into(),
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present { .. })
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }
}

impl fmt::Display for ComponentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Present { details: Some(d) } => write!(f, "present ({d})"),
            Self::Present { details: None } => write!(f, "present"),
            Self::Absent => write!(f, "absent"),
            Self::PresentButInvalid { reason } => write!(f, "invalid ({reason})"),
        }
    }
}

/// Action decided for a component from its detected state and the run direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Already satisfied
    Skip,
    /// Install from scratch
    Install,
    /// Remove the invalid installation, then install
    Reinstall,
    /// Remove
    Remove,
}

impl Action {
    /// Decide what to do for a component.
    pub fn decide(direction: Direction, state: &ComponentState) -> Self {
        match (direction, state) {
            (Direction::Install, ComponentState::Present { .. }) => Self::Skip,
            (Direction::Install, ComponentState::Absent) => Self::Install,
            (Direction::Install, ComponentState::PresentButInvalid { .. }) => Self::Reinstall,
            (Direction::Rollback, ComponentState::Absent) => Self::Skip,
            (Direction::Rollback, _) => Self::Remove,
        }
    }

    /// Whether this action mutates the host
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Self::Skip)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skip => write!(f, "skip"),
            Self::Install => write!(f, "install"),
            Self::Reinstall => write!(f, "reinstall"),
            Self::Remove => write!(f, "remove"),
        }
    }
}

/// Installation path that produced an Installed outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Via {
    Primary,
    Fallback,
}

/// Terminal outcome of one component in a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// Nothing to do
    Skipped { reason: String },
    /// Component was installed
    Installed { via: Via },
    /// Component was removed
    Removed,
    /// Action failed; the run continued
    Failed {
        error: String,
        diagnostics: Option<String>,
    },
    /// Dry run: this action would have been taken
    Planned { action: Action },
}

impl Outcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Whether the host was changed
    pub fn is_change(&self) -> bool {
        matches!(self, Self::Installed { .. } | Self::Removed)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Skipped { .. } => "skipped",
            Self::Installed { via: Via::Primary } => "installed",
            Self::Installed { via: Via::Fallback } => "installed (via fallback path)",
            Self::Removed => "removed",
            Self::Failed { .. } => "failed",
            Self::Planned { .. } => "planned",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skipped { reason } => write!(f, "skipped: {reason}"),
            Self::Failed { error, .. } => write!(f, "failed: {error}"),
            Self::Planned { action } => write!(f, "would {action}"),
            other => write!(f, "{}", other.label()),
        }
    }
}

/// Options for a run
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    /// Detect and decide only; never act
    pub dry_run: bool,
    /// Keep whole command output, not just the tail, in failure diagnostics
    pub verbose: bool,
}
