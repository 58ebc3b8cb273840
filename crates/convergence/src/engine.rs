//! Convergence engine - detect, decide, act, record

use crate::component::{BoxedComponent, ManagedComponent};
use crate::context::{ApplyContext, ConfirmCallback, ProgressCallback};
use crate::error::{Error, Result};
use crate::host::Host;
use crate::planner::{self, PlannedStep};
use crate::report::{ReportEntry, RunReport};
use crate::types::{Action, ComponentState, Direction, ExecuteOptions, Outcome};
use std::time::Instant;

/// Converge `components` in `direction`.
///
/// Components are processed one at a time in rank order (reversed for
/// rollback). A failing component is recorded and the run moves on; the
/// only error returned after planning is an unmet privilege precondition,
/// checked before the first action.
///
/// Rollbacks ask `confirm` before mutating anything.
///
/// # Arguments
/// * `components` - The managed components
/// * `direction` - Install or rollback
/// * `host` - The machine being converged
/// * `opts` - Execution options (dry_run, verbose)
/// * `progress` - Progress callback
/// * `confirm` - Confirmation callback
pub fn converge<P, C>(
    components: &[BoxedComponent],
    direction: Direction,
    host: &dyn Host,
    opts: &ExecuteOptions,
    progress: &mut P,
    confirm: &mut C,
) -> Result<RunReport>
where
    P: ProgressCallback,
    C: ConfirmCallback,
{
    let mut ctx = ApplyContext::new(host, opts.verbose);
    let mut report = RunReport::new(direction, opts.dry_run);

    // Side-effect-free pass: decides whether privilege and confirmation are needed
    let steps = planner::plan(components, direction, &ctx)?;
    let pending: Vec<&PlannedStep> = steps.iter().filter(|s| s.mutates()).collect();

    if opts.dry_run {
        for step in &steps {
            report.push(planned_entry(step));
        }
        report.finish();
        return Ok(report);
    }

    // Rollback cleanup of absent components only runs once the user agreed
    let cleanup_confirmed = direction == Direction::Rollback && !pending.is_empty();
    if cleanup_confirmed {
        let removals = pending.iter().filter(|s| s.action.is_mutation()).count();
        let cleanups = pending.len() - removals;
        let prompt = match (removals, cleanups) {
            (_, 0) => format!("Remove {removals} component{}?", plural(removals)),
            (0, _) => format!("Clean up leftovers of {cleanups} component{}?", plural(cleanups)),
            _ => format!(
                "Remove {removals} component{} and clean up leftovers of {cleanups} more?",
                plural(removals)
            ),
        };
        if !confirm.confirm(&prompt)? {
            log::info!("rollback declined");
            report.declined = true;
            for step in &steps {
                report.push(ReportEntry {
                    outcome: Outcome::Skipped {
                        reason: "declined".to_string(),
                    },
                    ..planned_entry(step)
                });
            }
            report.finish();
            return Ok(report);
        }
    }

    if pending.iter().any(|s| s.requires_privilege) {
        host.ensure_privilege().map_err(|e| match e {
            Error::PreconditionUnmet { .. } => e,
            other => Error::precondition(other.to_string()),
        })?;
    }

    let ordered = planner::order(components, direction)?;
    progress.on_run_start(ordered.len(), direction);

    for component in ordered {
        let started = Instant::now();

        // Re-detect: earlier components may have changed the host
        let (state, inconclusive) = planner::detect(component, &ctx);
        if let Some(reason) = inconclusive {
            ctx.note(reason);
        }
        let action = Action::decide(direction, &state);
        log::debug!("{}: {state} -> {action}", component.id());

        progress.on_component_start(&component.id(), &component.description(), action);
        let cleanup_leftovers = cleanup_confirmed && action == Action::Skip;
        let outcome = act(component, action, &state, cleanup_leftovers, &mut ctx);
        progress.on_component_complete(&component.id(), &outcome);

        let (notes, fetch_attempts) = ctx.take_component_record();
        report.push(ReportEntry {
            id: component.id(),
            description: component.description(),
            component_type: component.component_type().to_string(),
            detected: state,
            action,
            outcome,
            notes,
            fetch_attempts,
            duration_ms: started.elapsed().as_millis() as u64,
        });
    }

    progress.on_run_complete();
    report.finish();
    Ok(report)
}

fn plural(n: usize) -> &'static str {
    if n == 1 { "" } else { "s" }
}

fn planned_entry(step: &PlannedStep) -> ReportEntry {
    let outcome = match step.action {
        Action::Skip => Outcome::Skipped {
            reason: skip_reason(step.state.is_absent()).to_string(),
        },
        action => Outcome::Planned { action },
    };
    ReportEntry {
        id: step.id.clone(),
        description: step.description.clone(),
        component_type: step.component_type.clone(),
        detected: step.state.clone(),
        action: step.action,
        outcome,
        notes: step
            .inconclusive
            .iter()
            .cloned()
            .chain(step.leftovers.iter().map(|l| format!("leftover: {l}")))
            .collect(),
        fetch_attempts: 0,
        duration_ms: 0,
    }
}

fn skip_reason(absent: bool) -> &'static str {
    if absent { "not installed" } else { "already satisfied" }
}

/// Carry out one decided action, converting every error into an outcome
fn act(
    component: &dyn ManagedComponent,
    action: Action,
    state: &ComponentState,
    cleanup_leftovers: bool,
    ctx: &mut ApplyContext,
) -> Outcome {
    match action {
        Action::Skip => {
            if cleanup_leftovers && !component.leftovers(ctx).is_empty() {
                run_cleanup(component, ctx);
            }
            Outcome::Skipped {
                reason: skip_reason(state.is_absent()).to_string(),
            }
        }
        Action::Install => install_and_verify(component, ctx),
        Action::Reinstall => {
            if let ComponentState::PresentButInvalid { reason } = state {
                ctx.note(format!("replacing invalid installation: {reason}"));
            }
            match component.remove(ctx) {
                Ok(()) => install_and_verify(component, ctx),
                Err(e) => failed(component, &e),
            }
        }
        Action::Remove => {
            let removed = component.remove(ctx);
            // Auxiliary cleanup runs even when the primary removal failed
            run_cleanup(component, ctx);
            match removed.and_then(|()| verify_removed(component, ctx)) {
                Ok(()) => Outcome::Removed,
                Err(e) => failed(component, &e),
            }
        }
    }
}

fn install_and_verify(component: &dyn ManagedComponent, ctx: &mut ApplyContext) -> Outcome {
    let via = match component.install(ctx) {
        Ok(via) => via,
        Err(e) => return failed(component, &e),
    };

    match component.detect(ctx) {
        Ok(state) if state.is_present() => Outcome::Installed { via },
        Ok(state) => failed(
            component,
            &Error::Other(format!("install finished but component is {state}")),
        ),
        Err(e) => failed(
            component,
            &Error::Other(format!("install finished but could not be verified: {e}")),
        ),
    }
}

/// Re-detect after removal; a component that is still there was not removed
fn verify_removed(component: &dyn ManagedComponent, ctx: &mut ApplyContext) -> Result<()> {
    match component.detect(ctx) {
        Ok(ComponentState::Absent) => Ok(()),
        Ok(after) => Err(Error::Other(format!(
            "removal finished but component is {after}"
        ))),
        Err(e) => {
            ctx.note(format!("removal could not be verified: {e}"));
            Ok(())
        }
    }
}

fn run_cleanup(component: &dyn ManagedComponent, ctx: &mut ApplyContext) {
    let cleanup = component.cleanup(ctx);
    for removed in cleanup.removed {
        ctx.note(format!("removed {removed}"));
    }
    for warning in cleanup.warnings {
        log::warn!("{}: cleanup: {warning}", component.id());
        ctx.note(format!("cleanup warning: {warning}"));
    }
}

fn failed(component: &dyn ManagedComponent, error: &Error) -> Outcome {
    log::warn!("{}: {error}", component.id());
    Outcome::Failed {
        error: error.to_string(),
        diagnostics: error.diagnostics(),
    }
}

/// Simple convergence without progress reporting, auto-confirming rollbacks
pub fn converge_simple(
    components: &[BoxedComponent],
    direction: Direction,
    host: &dyn Host,
    opts: &ExecuteOptions,
) -> Result<RunReport> {
    use crate::context::{AutoConfirm, NoProgress};

    converge(components, direction, host, opts, &mut NoProgress, &mut AutoConfirm)
}
