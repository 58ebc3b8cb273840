//! # Convergence
//!
//! An idempotent install/rollback engine for machine-level components.
//!
//! Every run follows the same loop for each component: detect the current
//! state, decide an action from the state and the run direction, act, and
//! record the outcome. Re-running an install on a converged machine is a
//! no-op; a rollback on a clean machine is a no-op.
//!
//! ## Core Concepts
//!
//! - **ManagedComponent**: A package, repository, service or downloaded artifact
//! - **ComponentState**: Present, Absent, or PresentButInvalid
//! - **Action**: Skip, Install, Reinstall or Remove, decided per direction
//! - **Host**: The only way components touch the machine (commands, downloads, privilege)
//! - **RunReport**: Ordered per-component outcomes with notes and diagnostics
//!
//! ## Example
//!
//! ```ignore
//! use convergence::{converge, AutoConfirm, Direction, ExecuteOptions, NoProgress};
//!
//! let components = catalog::build(&config, Direction::Install);
//! let report = converge(
//!     &components,
//!     Direction::Install,
//!     &host,
//!     &ExecuteOptions::default(),
//!     &mut NoProgress,
//!     &mut AutoConfirm,
//! )?;
//! assert!(report.is_success());
//! ```
//!
//! ## Provider Traits
//!
//! - [`Host`]: Runs commands, fetches URLs, owns the privilege context
//! - [`ProgressCallback`]: Receives progress updates
//! - [`ConfirmCallback`]: Handles rollback confirmation
//!
//! [`MockHost`] answers commands and downloads from scripted responses,
//! so components can be tested without touching the real machine.

pub mod artifact;
pub mod component;
pub mod context;
pub mod engine;
pub mod error;
pub mod fallback;
pub mod host;
pub mod mock;
pub mod planner;
pub mod report;
pub mod retry;
pub mod types;

// Re-export main types at crate root
pub use artifact::{ArtifactSpec, FileSignature, fetch_validated};
pub use component::{BoxedComponent, Cleanup, ManagedComponent};
pub use context::{
    ApplyContext, AutoConfirm, AutoDecline, ConfirmCallback, NoProgress, ProgressCallback,
};
pub use engine::{converge, converge_simple};
pub use error::{Error, ErrorCategory, Result};
pub use fallback::install_with_fallback;
pub use host::{Cmd, CommandOutput, DIAGNOSTIC_TAIL_LINES, Host, Signal};
pub use mock::MockHost;
pub use planner::{PlannedStep, filter_by_targets, plan};
pub use report::{ReportEntry, RunReport, RunSummary};
pub use retry::{LogCallback, RetryCallback, RetryConfig, with_retry};
pub use types::{Action, ComponentState, Direction, ExecuteOptions, Outcome, Via};
