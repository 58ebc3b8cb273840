use anyhow::Result;
use convergence::{ApplyContext, Direction, plan};
use std::process::ExitCode;

use crate::Context;
use crate::cli::PlanArgs;
use crate::render;

/// Detect and decide, then print the actions a run would take
pub fn run(ctx: &Context, args: &PlanArgs) -> Result<ExitCode> {
    let direction = if args.rollback {
        Direction::Rollback
    } else {
        Direction::Install
    };

    let config = super::load_config(ctx)?;
    let components = super::select(&config, direction, &args.only)?;
    let host = super::system_host(&config);
    let apply_ctx = ApplyContext::new(&host, ctx.verbose > 0);

    let steps = plan(&components, direction, &apply_ctx)?;
    render::print_plan(&steps, direction);
    Ok(ExitCode::SUCCESS)
}
