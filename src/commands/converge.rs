//! `install` and `rollback`

use anyhow::{Context as AnyhowContext, Result};
use convergence::{Direction, ExecuteOptions, RunReport, converge};
use std::process::ExitCode;

use crate::Context;
use crate::cli::{ConvergeArgs, RollbackArgs};
use crate::progress::{DialoguerConfirm, SpinnerProgress};
use crate::render;

pub fn install(ctx: &Context, args: &ConvergeArgs) -> Result<ExitCode> {
    run(ctx, Direction::Install, args, true)
}

pub fn rollback(ctx: &Context, args: &RollbackArgs) -> Result<ExitCode> {
    run(ctx, Direction::Rollback, &args.converge, args.yes)
}

fn run(ctx: &Context, direction: Direction, args: &ConvergeArgs, assume_yes: bool) -> Result<ExitCode> {
    let config = super::load_config(ctx)?;
    let components = super::select(&config, direction, &args.only)?;
    let host = super::system_host(&config);
    let opts = ExecuteOptions {
        dry_run: args.dry_run,
        verbose: ctx.verbose > 0,
    };

    let mut progress = SpinnerProgress::new(ctx.quiet || args.json);
    let mut confirm = DialoguerConfirm::new(assume_yes);
    let report = converge(
        &components,
        direction,
        &host,
        &opts,
        &mut progress,
        &mut confirm,
    )?;

    if args.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
        println!("{json}");
    } else {
        render::print_report(&report);
    }

    Ok(exit_code(&report))
}

fn exit_code(report: &RunReport) -> ExitCode {
    if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
