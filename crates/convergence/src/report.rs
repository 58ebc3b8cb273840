//! Run reports

use crate::types::{Action, ComponentState, Direction, Outcome, Via};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// One component's record in a run
#[derive(Debug, Clone, Serialize)]
pub struct ReportEntry {
    pub id: String,
    pub description: String,
    pub component_type: String,
    /// State detected immediately before acting
    pub detected: ComponentState,
    pub action: Action,
    pub outcome: Outcome,
    /// Fallbacks, cleanup results, inconclusive detections
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
    /// Artifact fetch attempts made for this component
    #[serde(skip_serializing_if = "is_zero")]
    pub fetch_attempts: u32,
    pub duration_ms: u64,
}

fn is_zero(n: &u32) -> bool {
    *n == 0
}

/// Ordered outcomes of a convergence run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub direction: Direction,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Set when the user declined the confirmation prompt
    pub declined: bool,
    pub entries: Vec<ReportEntry>,
}

impl RunReport {
    pub fn new(direction: Direction, dry_run: bool) -> Self {
        Self {
            direction,
            dry_run,
            started_at: Utc::now(),
            finished_at: None,
            declined: false,
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, entry: ReportEntry) {
        self.entries.push(entry);
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Entry for a component id
    pub fn get(&self, id: &str) -> Option<&ReportEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// True when no component failed
    pub fn is_success(&self) -> bool {
        !self.entries.iter().any(|e| e.outcome.is_failure())
    }

    pub fn failures(&self) -> impl Iterator<Item = &ReportEntry> {
        self.entries.iter().filter(|e| e.outcome.is_failure())
    }

    pub fn summary(&self) -> RunSummary {
        let mut summary = RunSummary::default();
        for entry in &self.entries {
            summary.add(&entry.outcome);
        }
        summary
    }
}

/// Outcome counts for a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub installed: usize,
    /// Subset of `installed` that used a fallback path
    pub via_fallback: usize,
    pub removed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub planned: usize,
}

impl RunSummary {
    pub fn add(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Installed { via } => {
                self.installed += 1;
                if *via == Via::Fallback {
                    self.via_fallback += 1;
                }
            }
            Outcome::Removed => self.removed += 1,
            Outcome::Skipped { .. } => self.skipped += 1,
            Outcome::Failed { .. } => self.failed += 1,
            Outcome::Planned { .. } => self.planned += 1,
        }
    }

    /// Total number of actual changes made
    pub fn total_changes(&self) -> usize {
        self.installed + self.removed
    }

    pub fn total(&self) -> usize {
        self.installed + self.removed + self.skipped + self.failed + self.planned
    }
}
