//! In-memory host for testing.
//!
//! Commands are answered from scripted responses keyed by the full command
//! line (checked first) or by program name. Unscripted commands succeed with
//! empty output. Downloads are served from per-URL queues and written to the
//! requested destination.

use crate::error::{Error, Result};
use crate::host::{Cmd, CommandOutput, Host};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Mock host for testing without touching the real machine.
#[derive(Debug, Default)]
pub struct MockHost {
    /// One-shot responses, consumed in order
    queued: Mutex<HashMap<String, VecDeque<CommandOutput>>>,
    /// Responses returned every time
    fixed: Mutex<HashMap<String, CommandOutput>>,
    downloads: Mutex<HashMap<String, VecDeque<Vec<u8>>>>,
    fetches: Mutex<Vec<String>>,
    history: Mutex<Vec<Cmd>>,
    paths: Mutex<HashSet<PathBuf>>,
    no_privilege: Mutex<Option<String>>,
}

impl MockHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Successful output with the given stdout
    pub fn ok(stdout: &str) -> CommandOutput {
        CommandOutput::classified(Some(0), stdout.to_string(), String::new())
    }

    /// Failed output with the given exit code and stderr
    pub fn fail(code: i32, stderr: &str) -> CommandOutput {
        CommandOutput::classified(Some(code), String::new(), stderr.to_string())
    }

    /// Always answer `key` (a full command line or a program name) with `output`.
    pub fn respond(&self, key: &str, output: CommandOutput) {
        self.fixed.lock().unwrap_or_else(PoisonError::into_inner).insert(key.to_string(), output);
    }

    /// Answer the next run of `key` with `output`.
    pub fn queue(&self, key: &str, output: CommandOutput) {
        self.queued
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key.to_string())
            .or_default()
            .push_back(output);
    }

    /// Serve `data` for the next fetch of `url`.
    pub fn queue_download(&self, url: &str, data: Vec<u8>) {
        self.downloads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(url.to_string())
            .or_default()
            .push_back(data);
    }

    /// Make `path_exists` report true for `path`.
    pub fn add_path(&self, path: impl Into<PathBuf>) {
        self.paths.lock().unwrap_or_else(PoisonError::into_inner).insert(path.into());
    }

    pub fn remove_path(&self, path: &Path) {
        self.paths.lock().unwrap_or_else(PoisonError::into_inner).remove(path);
    }

    /// Make `ensure_privilege` fail.
    pub fn deny_privilege(&self, reason: &str) {
        *self.no_privilege.lock().unwrap_or_else(PoisonError::into_inner) = Some(reason.to_string());
    }

    /// All commands run so far
    pub fn history(&self) -> Vec<Cmd> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Command lines run so far, prefixed with `sudo ` when privileged
    pub fn command_lines(&self) -> Vec<String> {
        self.history().iter().map(ToString::to_string).collect()
    }

    /// How many times a command line was run
    pub fn run_count(&self, command_line: &str) -> usize {
        self.history()
            .iter()
            .filter(|c| c.command_line() == command_line)
            .count()
    }

    /// How many fetches of `url` were attempted
    pub fn fetch_count(&self, url: &str) -> usize {
        self.fetches.lock().unwrap_or_else(PoisonError::into_inner).iter().filter(|u| *u == url).count()
    }

    fn lookup(&self, key: &str) -> Option<CommandOutput> {
        if let Some(queue) = self.queued.lock().unwrap_or_else(PoisonError::into_inner).get_mut(key)
            && let Some(output) = queue.pop_front()
        {
            return Some(output);
        }
        self.fixed.lock().unwrap_or_else(PoisonError::into_inner).get(key).cloned()
    }
}

impl Host for MockHost {
    fn run(&self, cmd: &Cmd) -> Result<CommandOutput> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner).push(cmd.clone());
        let output = self
            .lookup(&cmd.command_line())
            .or_else(|| self.lookup(&cmd.program))
            .unwrap_or_else(|| Self::ok(""));
        Ok(output)
    }

    fn fetch(&self, url: &str, dest: &Path) -> Result<u64> {
        self.fetches.lock().unwrap_or_else(PoisonError::into_inner).push(url.to_string());
        let data = self
            .downloads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(url)
            .and_then(VecDeque::pop_front)
            .ok_or_else(|| Error::Fetch {
                url: url.to_string(),
                message: "no mock download configured".to_string(),
            })?;
        std::fs::write(dest, &data).map_err(|e| Error::io(dest, e))?;
        Ok(data.len() as u64)
    }

    fn ensure_privilege(&self) -> Result<()> {
        match self.no_privilege.lock().unwrap_or_else(PoisonError::into_inner).as_ref() {
            Some(reason) => Err(Error::precondition(reason.clone())),
            None => Ok(()),
        }
    }

    fn path_exists(&self, path: &Path) -> bool {
        self.paths.lock().unwrap_or_else(PoisonError::into_inner).contains(path) || path.exists()
    }
}
