use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "toolbench")]
#[command(version)]
#[command(
    about = "Install and roll back workstation dev tooling (Jenkins, Terraform, Ansible, AWS CLI)",
    long_about = None
)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (default: ~/.config/toolbench/config.toml)
    #[arg(long, global = true, env = "TOOLBENCH_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Install every missing component, dependencies first
    Install(ConvergeArgs),

    /// Remove installed components, dependents first
    Rollback(RollbackArgs),

    /// Show the detected state of each component
    Status(StatusArgs),

    /// Show what install (or rollback) would do
    Plan(PlanArgs),

    /// Inspect configuration
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct ConvergeArgs {
    /// Only these components (id, type, or type.id), comma-separated
    #[arg(long, value_delimiter = ',', value_name = "TARGET")]
    pub only: Vec<String>,

    /// Detect and decide only; change nothing
    #[arg(short, long)]
    pub dry_run: bool,

    /// Print the run report as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct RollbackArgs {
    #[command(flatten)]
    pub converge: ConvergeArgs,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct StatusArgs {
    /// Only these components (id, type, or type.id), comma-separated
    #[arg(long, value_delimiter = ',', value_name = "TARGET")]
    pub only: Vec<String>,

    /// Print detected states as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct PlanArgs {
    /// Only these components (id, type, or type.id), comma-separated
    #[arg(long, value_delimiter = ',', value_name = "TARGET")]
    pub only: Vec<String>,

    /// Plan a rollback instead of an install
    #[arg(long)]
    pub rollback: bool,
}

#[derive(Subcommand, Debug, Clone, Copy)]
pub enum ConfigCommand {
    /// Print the effective configuration
    Show,
    /// Print the config file location
    Path,
}
