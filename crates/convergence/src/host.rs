//! Host interface and structured command results
//!
//! Every detection predicate and every action reaches the machine through
//! [`Host`]. Command results come back as a [`CommandOutput`] whose
//! [`Signal`] is classified once, when the output is captured.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Number of trailing output lines kept as failure diagnostics.
pub const DIAGNOSTIC_TAIL_LINES: usize = 20;

/// Helper trait for accepting string-like command arguments
pub trait IntoArg {
    fn into_arg(self) -> String;
}

impl IntoArg for &str {
    fn into_arg(self) -> String {
        self.to_string()
    }
}

impl IntoArg for String {
    fn into_arg(self) -> String {
        self
    }
}

impl IntoArg for &String {
    fn into_arg(self) -> String {
        self.clone()
    }
}

impl IntoArg for &Path {
    fn into_arg(self) -> String {
        self.display().to_string()
    }
}

impl IntoArg for &PathBuf {
    fn into_arg(self) -> String {
        self.display().to_string()
    }
}

/// Description of an external command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cmd {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub stdin: Option<Vec<u8>>,
    pub cwd: Option<PathBuf>,
    /// Run through the escalated-privilege context
    pub privileged: bool,
    /// Overrides the host's default command timeout
    pub timeout: Option<Duration>,
}

impl Cmd {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    pub fn arg(mut self, arg: impl IntoArg) -> Self {
        self.args.push(arg.into_arg());
        self
    }

    pub fn args<I, A>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: IntoArg,
    {
        self.args.extend(args.into_iter().map(IntoArg::into_arg));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn stdin(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn privileged(mut self) -> Self {
        self.privileged = true;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The command line as shown to users (without env or stdin)
    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

impl fmt::Display for Cmd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.privileged {
            write!(f, "sudo ")?;
        }
        write!(f, "{}", self.command_line())
    }
}

/// Classification of an external command's result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    /// Exit status zero
    Success,
    /// The tool reported that the thing is already there
    AlreadyPresent,
    /// A query found nothing (package unknown, unit not loaded)
    NotInstalled,
    /// The program itself could not be found
    CommandNotFound,
    /// Signature or key verification failed
    TrustFailure,
    /// Network or DNS failure
    Network,
    /// Package database lock held by another process
    Locked,
    PermissionDenied,
    TimedOut,
    /// Any other non-zero exit
    Failure,
}

impl Signal {
    /// Classify a finished command.
    ///
    /// Trust markers win even on a zero exit: apt prints `GPG error` /
    /// `NO_PUBKEY` as warnings and still exits 0 on some releases.
    pub fn classify(exit_code: Option<i32>, stdout: &str, stderr: &str) -> Self {
        let text = format!("{stdout}\n{stderr}").to_lowercase();

        if contains_any(&text, TRUST_MARKERS) {
            return Self::TrustFailure;
        }

        if exit_code == Some(0) {
            if contains_any(&text, ALREADY_PRESENT_MARKERS) {
                return Self::AlreadyPresent;
            }
            return Self::Success;
        }

        if contains_any(&text, LOCK_MARKERS) {
            Self::Locked
        } else if contains_any(&text, NETWORK_MARKERS) {
            Self::Network
        } else if contains_any(&text, PERMISSION_MARKERS) {
            Self::PermissionDenied
        } else if contains_any(&text, NOT_INSTALLED_MARKERS) {
            Self::NotInstalled
        } else {
            Self::Failure
        }
    }

    /// Whether the command achieved what it was asked to do
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success | Self::AlreadyPresent)
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Success => "success",
            Self::AlreadyPresent => "already present",
            Self::NotInstalled => "not installed",
            Self::CommandNotFound => "command not found",
            Self::TrustFailure => "signature/key verification failed",
            Self::Network => "network failure",
            Self::Locked => "package database locked",
            Self::PermissionDenied => "permission denied",
            Self::TimedOut => "timed out",
            Self::Failure => "failed",
        };
        write!(f, "{s}")
    }
}

const TRUST_MARKERS: &[&str] = &[
    "no_pubkey",
    "gpg error",
    "is not signed",
    "signatures couldn't be verified",
    "signatures were invalid",
    "badsig",
    "expkeysig",
    "keyexpired",
];

const ALREADY_PRESENT_MARKERS: &[&str] = &["is already the newest version", "already installed"];

const LOCK_MARKERS: &[&str] = &["could not get lock", "dpkg frontend lock", "unable to acquire"];

const NETWORK_MARKERS: &[&str] = &[
    "temporary failure resolving",
    "could not resolve",
    "connection timed out",
    "connection refused",
    "failed to fetch",
    "network is unreachable",
];

const PERMISSION_MARKERS: &[&str] = &[
    "permission denied",
    "are you root",
    "operation not permitted",
];

/// Package-query phrasing only; generic "not found" text also shows up in
/// unrelated maintainer-script failures
const NOT_INSTALLED_MARKERS: &[&str] = &[
    "no packages found matching",
    "is not installed",
    "unable to locate package",
];

fn contains_any(text: &str, markers: &[&str]) -> bool {
    markers.iter().any(|m| text.contains(m))
}

/// Output from an external command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// None when the process never ran or was killed
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub signal: Signal,
}

impl CommandOutput {
    /// Build an output and classify it.
    pub fn classified(exit_code: Option<i32>, stdout: String, stderr: String) -> Self {
        let signal = Signal::classify(exit_code, &stdout, &stderr);
        Self {
            exit_code,
            stdout,
            stderr,
            signal,
        }
    }

    /// The program was not on PATH
    pub fn not_found(program: &str) -> Self {
        Self {
            exit_code: None,
            stdout: String::new(),
            stderr: format!("{program}: command not found"),
            signal: Signal::CommandNotFound,
        }
    }

    /// The process was killed after exceeding its timeout
    pub fn timed_out(cmd: &Cmd, after: Duration, stdout: String, stderr: String) -> Self {
        let mut stderr = stderr;
        if !stderr.is_empty() && !stderr.ends_with('\n') {
            stderr.push('\n');
        }
        stderr.push_str(&format!(
            "`{}` timed out after {}s",
            cmd.command_line(),
            after.as_secs()
        ));
        Self {
            exit_code: None,
            stdout,
            stderr,
            signal: Signal::TimedOut,
        }
    }

    pub fn success(&self) -> bool {
        self.signal.is_success()
    }

    /// Last `lines` lines of stdout followed by stderr
    pub fn tail(&self, lines: usize) -> String {
        let combined: Vec<&str> = self
            .stdout
            .lines()
            .chain(self.stderr.lines())
            .filter(|l| !l.trim().is_empty())
            .collect();
        let start = combined.len().saturating_sub(lines);
        combined[start..].join("\n")
    }

    /// Turn an unsuccessful output into an [`Error::ActionFailed`](crate::Error::ActionFailed).
    pub fn check(self, what: &str) -> Result<Self> {
        if self.success() {
            Ok(self)
        } else {
            Err(crate::error::Error::from_output(what, &self))
        }
    }
}

/// The machine being converged
///
/// Implementations own the escalated-privilege context and the HTTP client.
/// `run` returns `Ok` for any process that was started (or could not be
/// found); only unexpected I/O failures are errors.
pub trait Host {
    /// Run a command, honouring `cmd.privileged` and `cmd.timeout`.
    fn run(&self, cmd: &Cmd) -> Result<CommandOutput>;

    /// Download `url` to `dest`, returning the number of bytes written.
    fn fetch(&self, url: &str, dest: &Path) -> Result<u64>;

    /// Fail with [`Error::PreconditionUnmet`](crate::Error::PreconditionUnmet)
    /// when privileged commands cannot be run.
    fn ensure_privilege(&self) -> Result<()>;

    fn path_exists(&self, path: &Path) -> bool {
        path.exists()
    }
}
