use anyhow::Result;
use std::process::ExitCode;

use crate::Context;
use crate::cli::ConfigCommand;
use crate::config::default_config_path;
use crate::ui;

pub fn run(ctx: &Context, cmd: ConfigCommand) -> Result<ExitCode> {
    match cmd {
        ConfigCommand::Show => show(ctx)?,
        ConfigCommand::Path => path(ctx)?,
    }
    Ok(ExitCode::SUCCESS)
}

fn show(ctx: &Context) -> Result<()> {
    let config = super::load_config(ctx)?;
    print!("{}", config.to_toml()?);
    Ok(())
}

fn path(ctx: &Context) -> Result<()> {
    let path = match &ctx.config {
        Some(path) => path.clone(),
        None => default_config_path()?,
    };
    println!("{}", path.display());
    if !path.exists() && !ctx.quiet {
        ui::info("Not present; built-in defaults are in use");
    }
    Ok(())
}
