mod catalog;
mod cli;
mod commands;
mod component;
mod config;
mod host;
mod progress;
mod render;
mod runner;
mod sudo;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

/// Exit status when a run-wide precondition stopped the run
const EXIT_PRECONDITION: u8 = 2;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    pub config: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
        config: cli.config,
    };

    match dispatch(&ctx, cli.command) {
        Ok(code) => code,
        Err(e) => report_error(&e),
    }
}

fn dispatch(ctx: &Context, command: Command) -> Result<ExitCode> {
    match command {
        Command::Install(args) => commands::converge::install(ctx, &args),
        Command::Rollback(args) => commands::converge::rollback(ctx, &args),
        Command::Status(args) => commands::status::run(ctx, &args),
        Command::Plan(args) => commands::plan::run(ctx, &args),
        Command::Config(cmd) => commands::config::run(ctx, cmd),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "toolbench", &mut io::stdout());
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn report_error(err: &anyhow::Error) -> ExitCode {
    ui::error(&format!("{err:#}"));

    match err.downcast_ref::<convergence::Error>() {
        Some(e) => {
            let category = e.category();
            eprintln!("  {}", category.advice());
            if category.is_fatal() {
                ExitCode::from(EXIT_PRECONDITION)
            } else {
                ExitCode::FAILURE
            }
        }
        None => ExitCode::FAILURE,
    }
}
