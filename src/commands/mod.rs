pub mod config;
pub mod converge;
pub mod plan;
pub mod status;

use crate::Context;
use crate::catalog;
use crate::config::ToolbenchConfig;
use crate::host::SystemHost;
use anyhow::{Result, bail};
use convergence::{BoxedComponent, Direction, filter_by_targets};
use std::time::Duration;

/// Configuration for this invocation
pub fn load_config(ctx: &Context) -> Result<ToolbenchConfig> {
    ToolbenchConfig::load(ctx.config.as_deref())
}

/// The real machine, with timeouts from configuration
pub fn system_host(config: &ToolbenchConfig) -> SystemHost {
    SystemHost::new(
        Duration::from_secs(config.general.command_timeout_secs),
        Duration::from_secs(config.general.fetch_timeout_secs),
    )
}

/// Catalog components for `direction`, narrowed by `--only`
pub fn select(
    config: &ToolbenchConfig,
    direction: Direction,
    only: &[String],
) -> Result<Vec<BoxedComponent>> {
    let components = filter_by_targets(catalog::build(config, direction), only);
    if components.is_empty() && !only.is_empty() {
        bail!("No enabled component matches: {}", only.join(", "));
    }
    Ok(components)
}
