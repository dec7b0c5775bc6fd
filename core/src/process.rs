use crate::{Error, Result};
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Backpressure bound for the line queue; keeps a chatty engine from
/// buffering its whole run in memory when the sink is slow.
const LINE_CHANNEL_CAPACITY: usize = 64;

/// One invocation of an external program.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub envs: Vec<(String, String)>,
    pub current_dir: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
            current_dir: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }
}

/// A single line of child output, tagged by the stream it arrived on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputLine {
    Stdout(String),
    Stderr(String),
}

impl OutputLine {
    pub fn text(&self) -> &str {
        match self {
            OutputLine::Stdout(text) | OutputLine::Stderr(text) => text,
        }
    }
}

/// Runs `spec` to completion, delivering each output line to `sink` as it
/// arrives.
///
/// Stdout and stderr are read concurrently but funneled through one bounded
/// queue drained on the calling task, so `sink` is never invoked from two
/// places at once and sees each stream's lines in arrival order. Nothing is
/// buffered beyond the queue bound.
///
/// The child is always reaped: on normal exit via `wait`, and on
/// cancellation by killing it before returning [`Error::Cancelled`]. A spawn
/// failure surfaces as [`Error::ProcessStart`] and exit status
/// classification is left to the caller.
pub async fn run_streaming<F>(
    spec: &CommandSpec,
    cancel: &CancellationToken,
    mut sink: F,
) -> Result<ExitStatus>
where
    F: FnMut(OutputLine),
{
    let mut command = Command::new(&spec.program);
    command
        .args(&spec.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    for (key, value) in &spec.envs {
        command.env(key, value);
    }
    if let Some(dir) = &spec.current_dir {
        command.current_dir(dir);
    }

    debug!(program = %spec.program, args = ?spec.args, "spawning external process");

    let mut child = command.spawn().map_err(|source| Error::ProcessStart {
        command: spec.program.clone(),
        source,
    })?;

    let stdout = child.stdout.take().ok_or_else(|| Error::ProcessStart {
        command: spec.program.clone(),
        source: std::io::Error::other("stdout pipe not captured"),
    })?;
    let stderr = child.stderr.take().ok_or_else(|| Error::ProcessStart {
        command: spec.program.clone(),
        source: std::io::Error::other("stderr pipe not captured"),
    })?;

    let (tx, mut rx) = mpsc::channel(LINE_CHANNEL_CAPACITY);
    tokio::spawn(forward_lines(stdout, tx.clone(), OutputLine::Stdout));
    tokio::spawn(forward_lines(stderr, tx, OutputLine::Stderr));

    loop {
        tokio::select! {
            received = rx.recv() => match received {
                Some(line) => sink(line),
                // Both pipes hit EOF; the child is done writing.
                None => break,
            },
            _ = cancel.cancelled() => {
                debug!(program = %spec.program, "cancellation requested, killing child");
                let _ = child.kill().await;
                return Err(Error::Cancelled);
            }
        }
    }

    let status = child.wait().await?;
    debug!(program = %spec.program, code = ?status.code(), "process exited");
    Ok(status)
}

async fn forward_lines<R>(reader: R, tx: mpsc::Sender<OutputLine>, wrap: fn(String) -> OutputLine)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if tx.send(wrap(line)).await.is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn sh(script: &str) -> CommandSpec {
        CommandSpec::new("/bin/sh").arg("-c").arg(script)
    }

    #[tokio::test]
    async fn streams_stdout_in_arrival_order() {
        let mut lines = Vec::new();
        let status = run_streaming(
            &sh("echo one; echo two; echo three"),
            &CancellationToken::new(),
            |line| lines.push(line),
        )
        .await
        .unwrap();

        assert!(status.success());
        assert_eq!(
            lines,
            vec![
                OutputLine::Stdout("one".to_string()),
                OutputLine::Stdout("two".to_string()),
                OutputLine::Stdout("three".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn keeps_streams_apart() {
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        run_streaming(
            &sh("echo out; echo err 1>&2"),
            &CancellationToken::new(),
            |line| match line {
                OutputLine::Stdout(text) => stdout.push(text),
                OutputLine::Stderr(text) => stderr.push(text),
            },
        )
        .await
        .unwrap();

        assert_eq!(stdout, vec!["out"]);
        assert_eq!(stderr, vec!["err"]);
    }

    #[tokio::test]
    async fn reports_nonzero_exit_status() {
        let status = run_streaming(&sh("exit 3"), &CancellationToken::new(), |_| {})
            .await
            .unwrap();
        assert_eq!(status.code(), Some(3));
    }

    #[tokio::test]
    async fn missing_binary_is_a_start_error() {
        let spec = CommandSpec::new("/nonexistent/engine-binary");
        let err = run_streaming(&spec, &CancellationToken::new(), |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ProcessStart { .. }));
    }

    #[tokio::test]
    async fn passes_environment_to_child() {
        let mut lines = Vec::new();
        let spec = sh("echo $TEST_CRED").env("TEST_CRED", "secret");
        run_streaming(&spec, &CancellationToken::new(), |line| lines.push(line))
            .await
            .unwrap();
        assert_eq!(lines, vec![OutputLine::Stdout("secret".to_string())]);
    }

    #[tokio::test]
    async fn cancellation_kills_child_promptly() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            run_streaming(&sh("sleep 30"), &cancel, |_| {}),
        )
        .await
        .expect("cancellation must unblock the caller");

        assert!(matches!(result, Err(Error::Cancelled)));
    }
}
