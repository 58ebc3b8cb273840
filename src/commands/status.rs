use anyhow::{Context as AnyhowContext, Result};
use convergence::{ApplyContext, Direction, plan};
use std::process::ExitCode;

use crate::Context;
use crate::cli::StatusArgs;
use crate::render;

/// Detect every component and print its state. Never changes the host.
pub fn run(ctx: &Context, args: &StatusArgs) -> Result<ExitCode> {
    let config = super::load_config(ctx)?;
    let components = super::select(&config, Direction::Install, &args.only)?;
    let host = super::system_host(&config);
    let apply_ctx = ApplyContext::new(&host, ctx.verbose > 0);

    let steps = plan(&components, Direction::Install, &apply_ctx)?;

    if args.json {
        let states: Vec<_> = steps
            .iter()
            .map(|s| {
                serde_json::json!({
                    "id": s.id,
                    "type": s.component_type,
                    "state": s.state,
                    "inconclusive": s.inconclusive,
                })
            })
            .collect();
        let json = serde_json::to_string_pretty(&states).context("Failed to serialize status")?;
        println!("{json}");
    } else {
        render::print_status(&steps);
    }

    Ok(ExitCode::SUCCESS)
}
