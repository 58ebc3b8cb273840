//! Apply context and callback traits
//!
//! These traits keep the engine free of any particular terminal UI or
//! prompt implementation.

use crate::error::{Error, Result};
use crate::host::{Cmd, CommandOutput, DIAGNOSTIC_TAIL_LINES, Host};
use crate::types::{Action, Direction, Outcome};
use std::collections::HashMap;

/// Progress callback for convergence runs
pub trait ProgressCallback {
    /// Called once, after planning, with the number of components
    fn on_run_start(&mut self, count: usize, direction: Direction);

    /// Called before acting on a component
    fn on_component_start(&mut self, id: &str, description: &str, action: Action);

    /// Called after a component reaches its terminal outcome
    fn on_component_complete(&mut self, id: &str, outcome: &Outcome);

    /// Called when the run finishes
    fn on_run_complete(&mut self);
}

/// Confirmation callback for user interaction
pub trait ConfirmCallback {
    /// Ask the user to confirm an action
    ///
    /// # Returns
    /// `true` if the user confirmed, `false` otherwise
    fn confirm(&mut self, prompt: &str) -> Result<bool>;
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_run_start(&mut self, _count: usize, _direction: Direction) {}
    fn on_component_start(&mut self, _id: &str, _description: &str, _action: Action) {}
    fn on_component_complete(&mut self, _id: &str, _outcome: &Outcome) {}
    fn on_run_complete(&mut self) {}
}

/// Auto-confirm callback (always returns true)
pub struct AutoConfirm;

impl ConfirmCallback for AutoConfirm {
    fn confirm(&mut self, _prompt: &str) -> Result<bool> {
        Ok(true)
    }
}

/// Auto-decline callback (always returns false)
pub struct AutoDecline;

impl ConfirmCallback for AutoDecline {
    fn confirm(&mut self, _prompt: &str) -> Result<bool> {
        Ok(false)
    }
}

/// Context passed to component detect/install/remove operations
///
/// One context lives for a whole run. It carries the host, the set of
/// primary installation paths abandoned so far, and per-component notes
/// that the engine moves into the report.
pub struct ApplyContext<'a> {
    pub host: &'a dyn Host,
    pub verbose: bool,
    abandoned: HashMap<String, String>,
    notes: Vec<String>,
    fetch_attempts: u32,
}

impl<'a> ApplyContext<'a> {
    pub fn new(host: &'a dyn Host, verbose: bool) -> Self {
        Self {
            host,
            verbose,
            abandoned: HashMap::new(),
            notes: Vec::new(),
            fetch_attempts: 0,
        }
    }

    /// Run a command on the host
    pub fn run(&self, cmd: &Cmd) -> Result<CommandOutput> {
        log::debug!("running: {cmd}");
        self.host.run(cmd)
    }

    /// Run a command and fail unless it succeeded.
    ///
    /// Verbose runs keep the whole output as diagnostics, not just the tail.
    pub fn run_checked(&self, cmd: &Cmd) -> Result<CommandOutput> {
        let output = self.run(cmd)?;
        if output.success() {
            return Ok(output);
        }
        let lines = if self.verbose {
            usize::MAX
        } else {
            DIAGNOSTIC_TAIL_LINES
        };
        Err(Error::from_output_tail(&cmd.command_line(), &output, lines))
    }

    /// Attach a note to the current component's report entry
    pub fn note(&mut self, note: impl Into<String>) {
        self.notes.push(note.into());
    }

    pub fn record_fetch_attempt(&mut self) {
        self.fetch_attempts += 1;
    }

    /// Mark a primary path as abandoned for the rest of the run
    pub fn abandon_primary(&mut self, key: &str, reason: impl Into<String>) {
        self.abandoned.insert(key.to_string(), reason.into());
    }

    /// Why the primary path for `key` was abandoned, if it was
    pub fn primary_abandoned(&self, key: &str) -> Option<&str> {
        self.abandoned.get(key).map(String::as_str)
    }

    /// Take the notes and fetch count gathered since the last call
    pub(crate) fn take_component_record(&mut self) -> (Vec<String>, u32) {
        let notes = std::mem::take(&mut self.notes);
        let attempts = std::mem::replace(&mut self.fetch_attempts, 0);
        (notes, attempts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockHost;

    fn noisy_failure(host: &MockHost) {
        let stderr: Vec<String> = (1..=30).map(|n| format!("E: problem {n}")).collect();
        host.respond("apt-get", MockHost::fail(100, &stderr.join("\n")));
    }

    #[test]
    fn test_run_checked_keeps_tail_by_default() {
        let host = MockHost::new();
        noisy_failure(&host);
        let ctx = ApplyContext::new(&host, false);
        let err = ctx.run_checked(&Cmd::new("apt-get").arg("update")).unwrap_err();
        let diagnostics = err.diagnostics().unwrap();
        assert_eq!(diagnostics.lines().count(), DIAGNOSTIC_TAIL_LINES);
        assert!(diagnostics.ends_with("E: problem 30"));
    }

    #[test]
    fn test_run_checked_verbose_keeps_everything() {
        let host = MockHost::new();
        noisy_failure(&host);
        let ctx = ApplyContext::new(&host, true);
        let err = ctx.run_checked(&Cmd::new("apt-get").arg("update")).unwrap_err();
        let diagnostics = err.diagnostics().unwrap();
        assert_eq!(diagnostics.lines().count(), 30);
        assert!(diagnostics.starts_with("E: problem 1\n"));
    }

    #[test]
    fn test_component_record_resets() {
        let host = MockHost::new();
        let mut ctx = ApplyContext::new(&host, false);
        ctx.note("primary path abandoned");
        ctx.record_fetch_attempt();
        assert_eq!(ctx.take_component_record(), (vec!["primary path abandoned".to_string()], 1));
        assert_eq!(ctx.take_component_record(), (Vec::new(), 0));
    }
}
