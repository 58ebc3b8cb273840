//! The real machine: processes, sudo, and HTTPS downloads

use crate::runner;
use crate::sudo::SudoContext;
use convergence::{Cmd, CommandOutput, Error, Host, Result};
use std::cell::OnceCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

/// Largest download accepted (the AWS CLI bundle is ~60 MB)
const MAX_DOWNLOAD_SIZE: u64 = 512 * 1024 * 1024;

const USER_AGENT: &str = concat!("toolbench/", env!("CARGO_PKG_VERSION"));

/// Host backed by `std::process`, `sudo` and `ureq`
pub struct SystemHost {
    command_timeout: Duration,
    agent: ureq::Agent,
    /// Acquired lazily by `ensure_privilege`, released on drop
    sudo: OnceCell<SudoContext>,
}

impl SystemHost {
    pub fn new(command_timeout: Duration, fetch_timeout: Duration) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(fetch_timeout))
            .build()
            .into();
        Self {
            command_timeout,
            agent,
            sudo: OnceCell::new(),
        }
    }

    fn build(&self, cmd: &Cmd) -> Result<Command> {
        if cmd.privileged {
            let sudo = self.sudo.get().ok_or_else(|| {
                Error::precondition(format!(
                    "`{}` needs privileges that were not acquired",
                    cmd.command_line()
                ))
            })?;
            sudo.refresh();
            return Ok(sudo.command(&cmd.program, &cmd.args, &cmd.env));
        }

        let mut command = Command::new(&cmd.program);
        command.args(&cmd.args);
        command.envs(cmd.env.iter().map(|(k, v)| (k, v)));
        Ok(command)
    }
}

impl Host for SystemHost {
    fn run(&self, cmd: &Cmd) -> Result<CommandOutput> {
        let command = self.build(cmd)?;
        let timeout = cmd.timeout.unwrap_or(self.command_timeout);
        let output = runner::execute(command, cmd, timeout)
            .map_err(|e| Error::io(PathBuf::from(&cmd.program), e))?;
        log::trace!("`{cmd}` -> {:?} ({})", output.exit_code, output.signal);
        Ok(output)
    }

    fn fetch(&self, url: &str, dest: &Path) -> Result<u64> {
        let fetch_error = |message: String| Error::Fetch {
            url: url.to_string(),
            message,
        };

        let mut response = self
            .agent
            .get(url)
            .header("User-Agent", USER_AGENT)
            .call()
            .map_err(|e| fetch_error(e.to_string()))?;

        let bytes = response
            .body_mut()
            .with_config()
            .limit(MAX_DOWNLOAD_SIZE)
            .read_to_vec()
            .map_err(|e| fetch_error(e.to_string()))?;

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        fs::write(dest, &bytes).map_err(|e| Error::io(dest, e))?;
        Ok(bytes.len() as u64)
    }

    fn ensure_privilege(&self) -> Result<()> {
        if self.sudo.get().is_some() {
            return Ok(());
        }
        let sudo = SudoContext::acquire("installing and removing system packages")
            .map_err(|e| Error::precondition(e.to_string()))?;
        // Single-threaded: nothing else can have filled the cell
        let _ = self.sudo.set(sudo);
        Ok(())
    }
}
