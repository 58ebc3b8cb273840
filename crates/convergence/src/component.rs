//! Managed component trait
//!
//! A managed component is one discrete unit the engine can detect, install
//! and remove: a package, a repository registration, a service, a
//! downloaded artifact.

use crate::context::ApplyContext;
use crate::error::Result;
use crate::types::{ComponentState, Via};
use std::fmt;

/// What a best-effort cleanup pass did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cleanup {
    /// Auxiliary artifacts that were removed
    pub removed: Vec<String>,
    /// Problems that did not stop the cleanup
    pub warnings: Vec<String>,
}

impl Cleanup {
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.warnings.is_empty()
    }
}

/// Core trait for managed components
///
/// # Example
///
/// ```ignore
/// use convergence::{ApplyContext, Cmd, ComponentState, ManagedComponent, Result, Via};
///
/// #[derive(Debug)]
/// struct Unzip;
///
/// impl ManagedComponent for Unzip {
///     fn id(&self) -> String { "unzip".into() }
///     fn description(&self) -> String { "unzip archiver".into() }
///     fn component_type(&self) -> &'static str { "apt_package" }
///     fn rank(&self) -> u32 { 10 }
///
///     fn detect(&self, ctx: &ApplyContext) -> Result<ComponentState> {
///         let out = ctx.run(&Cmd::new("dpkg-query").args(["-W", "unzip"]))?;
///         Ok(if out.success() { ComponentState::present() } else { ComponentState::Absent })
///     }
///
///     fn install(&self, ctx: &mut ApplyContext) -> Result<Via> {
///         ctx.run_checked(&Cmd::new("apt-get").args(["install", "-y", "unzip"]).privileged())?;
///         Ok(Via::Primary)
///     }
///
///     fn remove(&self, ctx: &mut ApplyContext) -> Result<()> {
///         ctx.run_checked(&Cmd::new("apt-get").args(["remove", "-y", "unzip"]).privileged())?;
///         Ok(())
///     }
/// }
/// ```
pub trait ManagedComponent: fmt::Debug {
    /// Unique identifier, e.g. "jenkins", "terraform", "aws-cli"
    fn id(&self) -> String;

    /// Human-readable description
    fn description(&self) -> String;

    /// Component type category, e.g. "apt_package", "service", "artifact"
    fn component_type(&self) -> &'static str;

    /// Ordering rank; lower ranks install first and are removed last
    fn rank(&self) -> u32;

    /// Whether install/remove need the escalated-privilege context
    fn requires_privilege(&self) -> bool {
        true
    }

    /// Detect current state.
    ///
    /// Must be side-effect free and must tolerate the tool being entirely
    /// absent. An `Err` is treated as Absent by the engine.
    fn detect(&self, ctx: &ApplyContext) -> Result<ComponentState>;

    /// Install the component, returning which path was used
    fn install(&self, ctx: &mut ApplyContext) -> Result<Via>;

    /// Remove the component's primary installation
    fn remove(&self, ctx: &mut ApplyContext) -> Result<()>;

    /// Auxiliary artifacts currently on the host that `cleanup` would remove.
    ///
    /// Side-effect free, like `detect`. A rollback only cleans up after an
    /// absent component when this is non-empty.
    fn leftovers(&self, _ctx: &ApplyContext) -> Vec<String> {
        Vec::new()
    }

    /// Remove auxiliary artifacts (repository files, keys, launchers).
    ///
    /// Called on every rollback after `remove`, whether or not it
    /// succeeded, and when an absent component still has `leftovers`.
    /// Implementations must be no-ops when nothing is left behind.
    fn cleanup(&self, _ctx: &mut ApplyContext) -> Cleanup {
        Cleanup::default()
    }
}

/// A boxed component for type-erased storage
pub type BoxedComponent = Box<dyn ManagedComponent>;
