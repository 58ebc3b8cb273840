//! Scoped privilege context
//!
//! Privilege is never requested for the whole process. It is acquired once,
//! after planning shows that a privileged action is needed, and every
//! privileged command goes through the same context. Dropping the context
//! invalidates the sudo timestamp.

use anyhow::{Result, bail};
use std::process::{Command, Stdio};

/// How privileged commands are executed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Escalation {
    /// Already running as root
    Root,
    Sudo,
}

/// Scoped sudo context - automatically invalidates on drop
#[derive(Debug)]
pub struct SudoContext {
    escalation: Escalation,
}

impl SudoContext {
    /// Acquire privileges with a reason shown to the user
    pub fn acquire(reason: &str) -> Result<Self> {
        if is_root() {
            log::debug!("running as root, no escalation needed");
            return Ok(Self {
                escalation: Escalation::Root,
            });
        }

        if which::which("sudo").is_err() {
            bail!("not running as root and sudo is not installed");
        }

        if !Self::is_valid() {
            eprintln!();
            eprintln!("  Sudo required: {reason}");
            eprintln!();
        }

        // Validate sudo (will prompt for password)
        let status = Command::new("sudo").arg("-v").status();
        match status {
            Ok(s) if s.success() => Ok(Self {
                escalation: Escalation::Sudo,
            }),
            Ok(_) => bail!("failed to acquire sudo privileges"),
            Err(e) => bail!("failed to execute sudo: {e}"),
        }
    }

    /// Check if sudo is currently valid (without prompting)
    pub fn is_valid() -> bool {
        Command::new("sudo")
            .args(["-n", "true"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    /// Build the process for a privileged command.
    ///
    /// sudo resets the environment, so variables are passed through `env`.
    /// `-n` makes an expired timestamp fail instead of prompting mid-run.
    pub fn command(&self, program: &str, args: &[String], env: &[(String, String)]) -> Command {
        match self.escalation {
            Escalation::Root => {
                let mut command = Command::new(program);
                command.args(args);
                command.envs(env.iter().map(|(k, v)| (k, v)));
                command
            }
            Escalation::Sudo => {
                let mut command = Command::new("sudo");
                command.args(["-n", "--"]);
                if !env.is_empty() {
                    command.arg("env");
                    command.args(env.iter().map(|(k, v)| format!("{k}={v}")));
                }
                command.arg(program).args(args);
                command
            }
        }
    }

    /// Extend the sudo timestamp so long runs do not expire mid-way
    pub fn refresh(&self) {
        if self.escalation == Escalation::Sudo {
            let _ = Command::new("sudo")
                .args(["-n", "-v"])
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status();
        }
    }
}

impl Drop for SudoContext {
    fn drop(&mut self) {
        // Invalidate sudo timestamp to release privileges
        if self.escalation == Escalation::Sudo {
            let _ = Command::new("sudo").arg("-k").status();
        }
    }
}

/// Whether the effective user is root
pub fn is_root() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail
    unsafe { libc::geteuid() == 0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(command: &Command) -> Vec<String> {
        std::iter::once(command.get_program())
            .chain(command.get_args())
            .map(|s| s.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_sudo_command_passes_env_through_env() {
        let ctx = SudoContext {
            escalation: Escalation::Sudo,
        };
        let env = vec![("DEBIAN_FRONTEND".to_string(), "noninteractive".to_string())];
        let args = vec!["install".to_string(), "-y".to_string(), "ansible".to_string()];
        let command = ctx.command("apt-get", &args, &env);
        assert_eq!(
            argv(&command),
            [
                "sudo",
                "-n",
                "--",
                "env",
                "DEBIAN_FRONTEND=noninteractive",
                "apt-get",
                "install",
                "-y",
                "ansible"
            ]
        );
        // Avoid running `sudo -k` from the test
        std::mem::forget(ctx);
    }

    #[test]
    fn test_root_command_runs_program_directly() {
        let ctx = SudoContext {
            escalation: Escalation::Root,
        };
        let command = ctx.command("systemctl", &["daemon-reload".to_string()], &[]);
        assert_eq!(argv(&command), ["systemctl", "daemon-reload"]);
    }
}
