//! Human-readable rendering of plans and run reports

use crate::ui;
use colored::Colorize;
use convergence::{Action, ComponentState, Direction, Outcome, PlannedStep, RunReport, Via};
use std::time::Duration;

fn glyph(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Installed { via: Via::Primary } | Outcome::Removed => "✓".green().to_string(),
        Outcome::Installed { via: Via::Fallback } => "✓".yellow().to_string(),
        Outcome::Skipped { .. } => "·".dimmed().to_string(),
        Outcome::Failed { .. } => "✗".red().to_string(),
        Outcome::Planned { .. } => "→".cyan().to_string(),
    }
}

fn state_glyph(state: &ComponentState) -> String {
    match state {
        ComponentState::Present { .. } => "✓".green().to_string(),
        ComponentState::Absent => "○".dimmed().to_string(),
        ComponentState::PresentButInvalid { .. } => "⚠".yellow().to_string(),
    }
}

fn action_label(action: Action) -> String {
    match action {
        Action::Skip => "skip".dimmed().to_string(),
        Action::Install => "install".green().to_string(),
        Action::Reinstall => "reinstall".yellow().to_string(),
        Action::Remove => "remove".red().to_string(),
    }
}

fn id_width<'a>(ids: impl Iterator<Item = &'a str>) -> usize {
    ids.map(str::len).max().unwrap_or(0).max(12)
}

/// Detected state per component, no decisions
pub fn print_status(steps: &[PlannedStep]) {
    ui::header("Workstation Status");
    let width = id_width(steps.iter().map(|s| s.id.as_str()));
    for step in steps {
        println!(
            "  {} {:<width$}  {}",
            state_glyph(&step.state),
            step.id,
            step.state.to_string().dimmed()
        );
        if let Some(note) = &step.inconclusive {
            ui::dim(&format!("    {note}"));
        }
    }

    let present = steps.iter().filter(|s| s.state.is_present()).count();
    println!();
    println!("  {present}/{} components present", steps.len());
}

/// Decided action per component
pub fn print_plan(steps: &[PlannedStep], direction: Direction) {
    ui::header(&format!("Plan ({direction})"));
    let width = id_width(steps.iter().map(|s| s.id.as_str()));
    for step in steps {
        let privileged = if step.requires_privilege && step.mutates() {
            " (sudo)".dimmed().to_string()
        } else {
            String::new()
        };
        println!(
            "  {:<width$}  {:<10} {}{}",
            step.id,
            action_label(step.action),
            step.state.to_string().dimmed(),
            privileged
        );
        for leftover in &step.leftovers {
            ui::dim(&format!("    leftover: {leftover}"));
        }
    }

    let changes = steps.iter().filter(|s| s.mutates()).count();
    println!();
    if changes == 0 {
        ui::success("Nothing to do");
    } else {
        println!("  {changes} change(s) pending");
    }
}

/// Per-component outcome table followed by the summary
pub fn print_report(report: &RunReport) {
    let title = match (report.direction, report.dry_run) {
        (Direction::Install, false) => "Install",
        (Direction::Install, true) => "Install (dry run)",
        (Direction::Rollback, false) => "Rollback",
        (Direction::Rollback, true) => "Rollback (dry run)",
    };
    ui::header(title);

    let width = id_width(report.entries.iter().map(|e| e.id.as_str()));
    for entry in &report.entries {
        println!(
            "  {} {:<width$}  {:<30} {}",
            glyph(&entry.outcome),
            entry.id,
            entry.outcome.label(),
            ui::format_duration(Duration::from_millis(entry.duration_ms)).dimmed()
        );
        match &entry.outcome {
            Outcome::Skipped { reason } if !reason.is_empty() => {
                ui::dim(&format!("    {reason}"));
            }
            Outcome::Failed { error, diagnostics } => {
                eprintln!("    {} {}", "error:".red(), error);
                if let Some(diagnostics) = diagnostics {
                    for line in diagnostics.lines() {
                        eprintln!("      {}", line.dimmed());
                    }
                }
            }
            _ => {}
        }
        for note in &entry.notes {
            ui::dim(&format!("    {note}"));
        }
    }

    print_summary(report);
}

fn print_summary(report: &RunReport) {
    let summary = report.summary();
    println!();
    if report.declined {
        println!("  {} Rollback cancelled; nothing was changed", "⚠".yellow().bold());
        return;
    }
    if report.dry_run {
        println!("  {} Dry run; nothing was changed", "ℹ".blue().bold());
    } else if report.is_success() {
        println!("  {} Workstation converged", "✓".green().bold());
    } else {
        println!("  {} Converged with errors", "⚠".yellow().bold());
    }

    if summary.installed > 0 {
        if summary.via_fallback > 0 {
            println!(
                "    • {} components installed ({} via fallback)",
                summary.installed, summary.via_fallback
            );
        } else {
            println!("    • {} components installed", summary.installed);
        }
    }
    if summary.removed > 0 {
        println!("    • {} components removed", summary.removed);
    }
    if summary.planned > 0 {
        println!("    • {} changes planned", summary.planned);
    }
    if summary.skipped > 0 {
        println!("    • {} components skipped", summary.skipped);
    }
    if summary.failed > 0 {
        println!("    • {} {} failed", summary.failed, "components".red());
    }
}
