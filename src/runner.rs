//! Process execution with captured output and a hard timeout

use convergence::{Cmd, CommandOutput};
use std::io::{self, Read, Write};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Run a prepared process to completion or until `timeout` elapses.
///
/// `cmd` is the description the process was built from; it supplies stdin
/// and the names used in diagnostics. A program that cannot be found is
/// reported as [`CommandOutput::not_found`], not as an error.
pub fn execute(mut command: Command, cmd: &Cmd, timeout: Duration) -> io::Result<CommandOutput> {
    command
        .stdin(if cmd.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(dir) = &cmd.cwd {
        command.current_dir(dir);
    }

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Ok(CommandOutput::not_found(&cmd.program));
        }
        Err(e) => return Err(e),
    };

    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);

    if let (Some(input), Some(mut stdin)) = (&cmd.stdin, child.stdin.take()) {
        // Closing stdin on drop signals EOF
        if let Err(e) = stdin.write_all(input) {
            log::debug!("writing stdin of `{}`: {e}", cmd.command_line());
        }
    }

    let started = Instant::now();
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break Some(status);
        }
        if started.elapsed() >= timeout {
            log::warn!("`{}` exceeded {}s, killing", cmd.command_line(), timeout.as_secs());
            let _ = child.kill();
            let _ = child.wait();
            break None;
        }
        thread::sleep(POLL_INTERVAL);
    };

    let stdout = collect(stdout);
    let stderr = collect(stderr);

    Ok(match status {
        Some(status) => CommandOutput::classified(status.code(), stdout, stderr),
        None => CommandOutput::timed_out(cmd, timeout, stdout, stderr),
    })
}

/// Read a pipe to the end on its own thread so the child never blocks on a full pipe
fn drain<R: Read + Send + 'static>(mut pipe: R) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        buf
    })
}

fn collect(handle: Option<thread::JoinHandle<Vec<u8>>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .map(|buf| String::from_utf8_lossy(&buf).into_owned())
        .unwrap_or_default()
}
