//! Sandboxed process execution against named targets.
//!
//! A target is a working directory plus an optional launcher argv (for
//! example `["docker", "exec", "-i", "box"]`). The command text is handed to
//! `sh -c` behind the launcher; nothing is interpolated into a shell line.

use crate::core::error::CapabilityError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

pub const DEFAULT_OUTPUT_LIMIT_BYTES: usize = 64 * 1024;
const POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxTarget {
    pub workdir: PathBuf,
    #[serde(default)]
    pub launcher: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CapturedOutput {
    pub target: String,
    /// `None` when the process was ended by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub truncated: bool,
    pub duration_ms: u64,
}

impl CapturedOutput {
    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0)
    }
}

pub trait SandboxExec: Send + Sync {
    fn run(&self, target: &str, command: &str) -> Result<CapturedOutput, CapabilityError>;
}

#[derive(Debug, Clone)]
pub struct ProcessSandbox {
    targets: BTreeMap<String, SandboxTarget>,
    output_limit: usize,
    timeout: Duration,
}

impl ProcessSandbox {
    pub fn new(targets: BTreeMap<String, SandboxTarget>) -> Self {
        Self {
            targets,
            output_limit: DEFAULT_OUTPUT_LIMIT_BYTES,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_output_limit(mut self, bytes: usize) -> Self {
        self.output_limit = bytes.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn target_names(&self) -> impl Iterator<Item = &str> {
        self.targets.keys().map(String::as_str)
    }

    fn build_command(&self, target: &SandboxTarget, command: &str) -> Command {
        let mut cmd = match target.launcher.split_first() {
            Some((program, args)) => {
                let mut c = Command::new(program);
                c.args(args);
                c.arg("sh");
                c
            }
            None => Command::new("sh"),
        };
        cmd.arg("-c")
            .arg(command)
            .current_dir(&target.workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }
}

impl SandboxExec for ProcessSandbox {
    fn run(&self, target_name: &str, command: &str) -> Result<CapturedOutput, CapabilityError> {
        let target = self
            .targets
            .get(target_name)
            .ok_or_else(|| CapabilityError::UnknownTarget(target_name.to_string()))?;
        if command.trim().is_empty() {
            return Err(CapabilityError::InvalidArgument("empty sandbox command".into()));
        }
        if !target.workdir.is_dir() {
            return Err(CapabilityError::Unavailable(format!(
                "workdir for target '{}' does not exist: {}",
                target_name,
                target.workdir.display()
            )));
        }

        let start = Instant::now();
        let mut child = self.build_command(target, command).spawn()?;
        let stdout = spawn_reader(child.stdout.take(), self.output_limit);
        let stderr = spawn_reader(child.stderr.take(), self.output_limit);

        let Some(status) = wait_with_timeout(&mut child, self.timeout)? else {
            // Grandchildren may still hold the pipes; the readers are left
            // to finish on their own.
            tracing::warn!(sandbox = target_name, "sandbox command killed after timeout");
            return Err(CapabilityError::TimedOut(self.timeout.as_millis() as u64));
        };
        let (stdout, out_truncated) = join_reader(stdout);
        let (stderr, err_truncated) = join_reader(stderr);

        Ok(CapturedOutput {
            target: target_name.to_string(),
            exit_code: status.code(),
            stdout,
            stderr,
            truncated: out_truncated || err_truncated,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}

/// Polls the child until it exits or the budget runs out. On timeout the
/// child is killed and reaped, and `None` is returned.
fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Result<Option<ExitStatus>, CapabilityError> {
    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if start.elapsed() > timeout {
            let _ = child.kill();
            let _ = child.wait();
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

type Reader = Option<JoinHandle<(Vec<u8>, bool)>>;

/// Drains a pipe on its own thread so a chatty child never blocks on a full
/// pipe. Keeps at most `limit` bytes and discards the rest.
fn spawn_reader<R: Read + Send + 'static>(pipe: Option<R>, limit: usize) -> Reader {
    let mut pipe = pipe?;
    Some(thread::spawn(move || {
        let mut kept = Vec::new();
        let mut truncated = false;
        let mut chunk = [0u8; 8192];
        loop {
            match pipe.read(&mut chunk) {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    let room = limit.saturating_sub(kept.len());
                    if n > room {
                        truncated = true;
                    }
                    kept.extend_from_slice(&chunk[..n.min(room)]);
                }
            }
        }
        (kept, truncated)
    }))
}

fn join_reader(reader: Reader) -> (String, bool) {
    match reader.map(JoinHandle::join) {
        Some(Ok((bytes, truncated))) => (String::from_utf8_lossy(&bytes).to_string(), truncated),
        Some(Err(_)) | None => (String::new(), false),
    }
}

/// Text form handed back to the transcript.
pub fn render_captured(out: &CapturedOutput) -> String {
    let mut text = match out.exit_code {
        Some(code) => format!("exit status: {code}\n"),
        None => "exit status: terminated by signal\n".to_string(),
    };
    if !out.stdout.is_empty() {
        text.push_str(&out.stdout);
        if !out.stdout.ends_with('\n') {
            text.push('\n');
        }
    }
    if !out.stderr.is_empty() {
        text.push_str("--- stderr ---\n");
        text.push_str(&out.stderr);
        if !out.stderr.ends_with('\n') {
            text.push('\n');
        }
    }
    if out.truncated {
        text.push_str("(output truncated)\n");
    }
    text
}
