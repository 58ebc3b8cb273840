//! Terminal adapters for the engine's progress and confirmation callbacks

use colored::Colorize;
use convergence::{Action, ConfirmCallback, Direction, Error, Outcome, ProgressCallback};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Spinner per component, replaced by a result line when it finishes
pub struct SpinnerProgress {
    quiet: bool,
    total: usize,
    current: usize,
    bar: Option<ProgressBar>,
}

impl SpinnerProgress {
    pub fn new(quiet: bool) -> Self {
        Self {
            quiet,
            total: 0,
            current: 0,
            bar: None,
        }
    }
}

fn verb(action: Action) -> &'static str {
    match action {
        Action::Skip => "Checking",
        Action::Install => "Installing",
        Action::Reinstall => "Reinstalling",
        Action::Remove => "Removing",
    }
}

fn outcome_glyph(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Installed { .. } | Outcome::Removed => "✓".green().to_string(),
        Outcome::Skipped { .. } => "·".dimmed().to_string(),
        Outcome::Failed { .. } => "✗".red().to_string(),
        Outcome::Planned { .. } => "→".cyan().to_string(),
    }
}

impl ProgressCallback for SpinnerProgress {
    fn on_run_start(&mut self, count: usize, direction: Direction) {
        self.total = count;
        self.current = 0;
        if !self.quiet {
            log::info!("{direction}: {count} component(s)");
        }
    }

    fn on_component_start(&mut self, id: &str, _description: &str, action: Action) {
        self.current += 1;
        if self.quiet {
            return;
        }

        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.green} {prefix:.blue.bold} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_prefix(format!("[{}/{}]", self.current, self.total));
        bar.set_message(format!("{} {id}", verb(action)));
        bar.enable_steady_tick(Duration::from_millis(100));
        self.bar = Some(bar);
    }

    fn on_component_complete(&mut self, id: &str, outcome: &Outcome) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
        if self.quiet {
            return;
        }
        println!(
            "{} {} {} {}",
            format!("[{}/{}]", self.current, self.total).blue().bold(),
            outcome_glyph(outcome),
            id,
            outcome.to_string().dimmed()
        );
    }

    fn on_run_complete(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}

/// Interactive yes/no prompt; defaults to no
pub struct DialoguerConfirm {
    assume_yes: bool,
}

impl DialoguerConfirm {
    /// With `assume_yes` every prompt is accepted without asking
    pub fn new(assume_yes: bool) -> Self {
        Self { assume_yes }
    }
}

impl ConfirmCallback for DialoguerConfirm {
    fn confirm(&mut self, prompt: &str) -> convergence::Result<bool> {
        use dialoguer::Confirm;

        if self.assume_yes {
            log::debug!("{prompt} (assumed yes)");
            return Ok(true);
        }

        Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()
            .map_err(|e| Error::Other(format!("confirmation prompt failed: {e}")))
    }
}
