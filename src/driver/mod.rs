//! Native build driver
//!
//! A [`BuildBackend`] runs the external build system in two steps, configure
//! then build, against a planned layout. CMake is the only backend.
//!
//! Tool output is streamed line by line to a callback (the progress display)
//! and kept so a failure can report the tail of it.

mod cmake;

pub use cmake::CMakeBackend;

use crate::cancel::CancelToken;
use crate::error::{KilnError, KilnResult};
use crate::layout::{write_atomic, LayoutPlan};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::ErrorKind;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::debug;

/// Max number of output lines included in configure/build errors
const ERROR_TAIL_LINES: usize = 50;

/// Build record file name inside the layout root
pub const BUILD_RECORD_FILE: &str = "build-record.json";

/// Outcome of a successful step
#[derive(Debug, Clone)]
pub struct StepOutcome {
    /// Command line that was run
    pub command: String,
    pub duration: Duration,
    /// Number of output lines the tool produced
    pub output_lines: usize,
}

pub type ConfigureResult = StepOutcome;
pub type BuildResult = StepOutcome;

/// External build system
#[async_trait]
pub trait BuildBackend: Send + Sync {
    /// Human-readable backend name for display
    fn name(&self) -> &'static str;

    /// Generate the native build tree
    async fn configure(
        &self,
        plan: &LayoutPlan,
        on_output: &(dyn Fn(String) + Send + Sync),
        cancel: &CancelToken,
    ) -> KilnResult<ConfigureResult>;

    /// Build a configured tree
    async fn build(
        &self,
        plan: &LayoutPlan,
        on_output: &(dyn Fn(String) + Send + Sync),
        cancel: &CancelToken,
    ) -> KilnResult<BuildResult>;
}

/// Finished process: exit status plus every output line
pub(crate) struct Finished {
    pub status: ExitStatus,
    pub output: Vec<String>,
    pub duration: Duration,
}

/// Spawn `command`, stream its output and wait for it.
///
/// The child is killed if `cancel` fires first.
pub(crate) async fn run_streamed(
    mut command: Command,
    label: &str,
    on_output: &(dyn Fn(String) + Send + Sync),
    cancel: &CancelToken,
) -> KilnResult<Finished> {
    cancel.check()?;
    debug!("Running: {}", label);

    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let started = Instant::now();
    let mut child = command.spawn().map_err(|e| {
        if e.kind() == ErrorKind::NotFound {
            KilnError::ToolNotFound(program_of(label).to_string())
        } else {
            KilnError::command_failed(label, e)
        }
    })?;

    tokio::select! {
        result = async {
            let output = stream_child_output(&mut child, on_output).await;
            child.wait().await.map(|status| (status, output))
        } => {
            let (status, output) = result.map_err(|e| KilnError::command_failed(label, e))?;
            Ok(Finished { status, output, duration: started.elapsed() })
        }
        _ = cancel.cancelled() => {
            debug!("Killing {} after cancellation", label);
            let _ = child.kill().await;
            Err(KilnError::Cancelled)
        }
    }
}

fn program_of(label: &str) -> &str {
    label.split_whitespace().next().unwrap_or(label)
}

/// Stream stdout and stderr line by line, calling `on_output` for each.
///
/// Returns every line for error reporting. Bytes that are not UTF-8 are
/// replaced, never treated as end of stream.
pub(crate) async fn stream_child_output(
    child: &mut tokio::process::Child,
    on_output: &(dyn Fn(String) + Send + Sync),
) -> Vec<String> {
    let mut stdout_reader = child.stdout.take().map(LineStream::new);
    let mut stderr_reader = child.stderr.take().map(LineStream::new);

    let mut all_output = Vec::new();
    let mut stdout_done = stdout_reader.is_none();
    let mut stderr_done = stderr_reader.is_none();

    while !stdout_done || !stderr_done {
        tokio::select! {
            line = next_line(&mut stdout_reader), if !stdout_done => {
                match line {
                    Some(line) => {
                        on_output(line.clone());
                        all_output.push(line);
                    }
                    None => stdout_done = true,
                }
            }
            line = next_line(&mut stderr_reader), if !stderr_done => {
                match line {
                    Some(line) => {
                        on_output(line.clone());
                        all_output.push(line);
                    }
                    None => stderr_done = true,
                }
            }
        }
    }

    all_output
}

/// Raw line reader over a child pipe.
///
/// The buffer outlives each `read_until` call so a read interrupted by the
/// other `select!` branch keeps its partial line.
struct LineStream<R> {
    reader: BufReader<R>,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> LineStream<R> {
    fn new(inner: R) -> Self {
        Self {
            reader: BufReader::new(inner),
            buf: Vec::new(),
        }
    }

    async fn next_line(&mut self) -> Option<String> {
        match self.reader.read_until(b'\n', &mut self.buf).await {
            Ok(0) => None,
            Ok(_) => {
                let mut raw = std::mem::take(&mut self.buf);
                if raw.last() == Some(&b'\n') {
                    raw.pop();
                    if raw.last() == Some(&b'\r') {
                        raw.pop();
                    }
                }
                Some(String::from_utf8_lossy(&raw).into_owned())
            }
            Err(e) => {
                debug!("Stopped reading tool output: {}", e);
                None
            }
        }
    }
}

async fn next_line<R: AsyncRead + Unpin>(stream: &mut Option<LineStream<R>>) -> Option<String> {
    match stream {
        Some(stream) => stream.next_line().await,
        None => None,
    }
}

/// Last lines of tool output for an error message
pub(crate) fn output_tail(lines: &[String]) -> String {
    let start = lines.len().saturating_sub(ERROR_TAIL_LINES);
    lines[start..].join("\n")
}

/// Summary written after a successful build
#[derive(Debug, Clone, Serialize)]
pub struct BuildRecord {
    pub format_version: u32,
    pub recipe: String,
    pub settings_digest: String,
    pub graph_digest: String,
    pub backend: String,
    pub configure_ms: u128,
    pub build_ms: u128,
    pub finished_at: DateTime<Utc>,
}

impl BuildRecord {
    pub fn new(
        plan: &LayoutPlan,
        graph_digest: String,
        backend: &str,
        configure: &ConfigureResult,
        build: &BuildResult,
    ) -> Self {
        Self {
            format_version: 1,
            recipe: plan.identity.to_string(),
            settings_digest: plan.digest.to_string(),
            graph_digest,
            backend: backend.to_string(),
            configure_ms: configure.duration.as_millis(),
            build_ms: build.duration.as_millis(),
            finished_at: Utc::now(),
        }
    }

    /// Write the record into the layout root
    pub async fn write(&self, plan: &LayoutPlan) -> KilnResult<()> {
        let path = plan.root.join(BUILD_RECORD_FILE);
        let content = serde_json::to_string_pretty(self)?;
        write_atomic(&path, content.as_bytes())
            .await
            .map_err(|e| KilnError::io(format!("writing {}", path.display()), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn output_tail_keeps_last_lines() {
        let lines: Vec<String> = (0..120).map(|i| format!("line {}", i)).collect();
        let tail = output_tail(&lines);
        assert_eq!(tail.lines().count(), ERROR_TAIL_LINES);
        assert!(tail.starts_with("line 70"));
        assert!(tail.ends_with("line 119"));

        let short = vec!["only".to_string()];
        assert_eq!(output_tail(&short), "only");
    }

    #[test]
    fn program_of_label() {
        assert_eq!(program_of("cmake --build /x"), "cmake");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn run_streamed_collects_both_streams() {
        let seen = Mutex::new(Vec::new());
        let sink = |line: String| seen.lock().unwrap().push(line);

        let mut command = Command::new("sh");
        command.args(["-c", "echo out; echo err >&2; exit 3"]);
        let finished = run_streamed(command, "sh -c", &sink, &CancelToken::new())
            .await
            .unwrap();

        assert_eq!(finished.status.code(), Some(3));
        let mut output = finished.output.clone();
        output.sort();
        assert_eq!(output, vec!["err", "out"]);
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_utf8_output_keeps_draining_both_pipes() {
        let mut command = Command::new("sh");
        command.args([
            "-c",
            "printf 'bad \\377 byte\\n'; head -c 300000 /dev/zero | tr '\\0' x; echo; echo 'error: real diagnostic' >&2; exit 2",
        ]);
        let finished = tokio::time::timeout(
            Duration::from_secs(30),
            run_streamed(command, "sh -c", &|_: String| {}, &CancelToken::new()),
        )
        .await
        .expect("tool output stopped being read")
        .unwrap();

        assert_eq!(finished.status.code(), Some(2));
        assert!(finished.output.iter().any(|l| l.starts_with("bad ") && l.contains('\u{FFFD}')));
        assert!(finished.output.iter().any(|l| l.len() == 300_000));
        assert!(output_tail(&finished.output).contains("error: real diagnostic"));
    }

    #[tokio::test]
    async fn line_stream_strips_crlf_and_keeps_last_partial_line() {
        let mut stream = LineStream::new(&b"one\r\ntwo\nthree"[..]);
        assert_eq!(stream.next_line().await.as_deref(), Some("one"));
        assert_eq!(stream.next_line().await.as_deref(), Some("two"));
        assert_eq!(stream.next_line().await.as_deref(), Some("three"));
        assert_eq!(stream.next_line().await, None);
    }

    #[tokio::test]
    async fn missing_program_is_tool_not_found() {
        let command = Command::new("kiln-definitely-not-a-real-tool");
        let err = run_streamed(command, "kiln-definitely-not-a-real-tool --version", &|_: String| {}, &CancelToken::new())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, KilnError::ToolNotFound(ref p) if p == "kiln-definitely-not-a-real-tool"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn cancellation_kills_child() {
        let cancel = CancelToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let mut command = Command::new("sleep");
        command.arg("30");
        let started = Instant::now();
        let err = run_streamed(command, "sleep 30", &|_: String| {}, &cancel).await.err().unwrap();
        assert!(matches!(err, KilnError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn already_cancelled_does_not_spawn() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = run_streamed(Command::new("kiln-not-run"), "kiln-not-run", &|_: String| {}, &cancel)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, KilnError::Cancelled));
    }
}
