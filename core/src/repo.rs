use crate::event::{parse_backup_line, BackupEvent, BackupSummary, LsEntry, Snapshot};
use crate::options::{BackupArgs, BackupOption, GenericOption, QueryArgs};
use crate::process::{run_streaming, CommandSpec, OutputLine};
use crate::retention::{RetentionPolicy, RetentionResult};
use crate::{Error, Result};
use std::collections::VecDeque;
use std::io::Write;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Engine binary used when neither [`Repo::with_command`] nor the
/// environment override names one.
pub const DEFAULT_COMMAND: &str = "restic";

/// Environment variable overriding the engine binary path.
pub const COMMAND_ENV: &str = "RESTICRUN_RESTIC_CMD";

/// Diagnostic lines kept per invocation for error reporting.
const STDERR_TAIL_LINES: usize = 16;

/// A handle to one engine-managed repository.
///
/// Binds the repository location, its credential, and any global engine
/// flags (e.g. `--no-cache`); all operations are built from that identity.
/// The credential travels to the engine via `RESTIC_PASSWORD`, never on the
/// argument vector.
///
/// A `Repo` may be used concurrently for independent operations; the engine
/// serializes conflicting repository locks itself, and a lock-contention
/// failure surfaces as an ordinary [`Error::EngineFailed`] the caller may
/// retry. This layer never retries on its own.
///
/// # Examples
///
/// ```no_run
/// use resticrun_core::{BackupOption, Repo};
/// use tokio_util::sync::CancellationToken;
///
/// #[tokio::main]
/// async fn main() -> resticrun_core::Result<()> {
///     let repo = Repo::new("/srv/backup-repo", "hunter2").with_flags(["--no-cache"]);
///     let cancel = CancellationToken::new();
///
///     repo.init(&cancel).await?;
///     let summary = repo
///         .backup(&cancel, None, &[BackupOption::paths(["/home/data"])])
///         .await?;
///     println!("snapshot {}", summary.snapshot_id);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Repo {
    uri: String,
    password: String,
    flags: Vec<String>,
    command: String,
}

impl Repo {
    pub fn new(uri: impl Into<String>, password: impl Into<String>) -> Self {
        let command =
            std::env::var(COMMAND_ENV).unwrap_or_else(|_| DEFAULT_COMMAND.to_string());
        Self {
            uri: uri.into(),
            password: password.into(),
            flags: Vec::new(),
            command,
        }
    }

    /// Global engine flags appended to every invocation.
    pub fn with_flags<I, S>(mut self, flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.flags.extend(flags.into_iter().map(Into::into));
        self
    }

    /// Overrides the engine binary for this handle.
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = command.into();
        self
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    fn command_spec(&self, subcommand: &str) -> CommandSpec {
        CommandSpec::new(&self.command)
            .arg(subcommand)
            .args(self.flags.iter().cloned())
            .env("RESTIC_REPOSITORY", &self.uri)
            .env("RESTIC_PASSWORD", &self.password)
    }

    /// Initializes repository storage at the configured location.
    ///
    /// Success means the location is ready to accept backups; a location
    /// already initialized under a different credential, or any I/O or auth
    /// failure, comes back as [`Error::EngineFailed`] with the engine's
    /// diagnostic text attached.
    pub async fn init(&self, cancel: &CancellationToken) -> Result<()> {
        let spec = self.command_spec("init");
        let mut tail = StderrTail::default();
        let status = run_streaming(&spec, cancel, |line| {
            if let OutputLine::Stderr(text) = &line {
                tail.observe(text);
            }
        })
        .await?;

        if !status.success() {
            return Err(Error::EngineFailed {
                code: status.code(),
                stderr: tail.into_string(),
            });
        }
        info!(uri = %self.uri, "repository initialized");
        Ok(())
    }

    /// Runs a backup composed from `options`, returning the terminal
    /// summary.
    ///
    /// Every parsed progress and summary event is handed to `on_event` in
    /// arrival order, one call at a time, before this method returns. The
    /// sink is best-effort notification only: passing `None` suppresses
    /// delivery without changing the outcome, and events already delivered
    /// stay delivered even if the run later fails.
    ///
    /// Fails without spawning when no path was supplied; otherwise fails
    /// with [`Error::EngineFailed`] on a non-zero exit or
    /// [`Error::MissingSummary`] when a zero exit produced no summary line.
    pub async fn backup(
        &self,
        cancel: &CancellationToken,
        mut on_event: Option<&mut dyn FnMut(&BackupEvent)>,
        options: &[BackupOption],
    ) -> Result<BackupSummary> {
        let backup_args = BackupArgs::assemble(options).to_args()?;
        let spec = self.command_spec("backup").arg("--json").args(backup_args);

        let mut summary: Option<BackupSummary> = None;
        let mut tail = StderrTail::default();
        let status = run_streaming(&spec, cancel, |line| match line {
            OutputLine::Stdout(text) => {
                if let Some(event) = parse_backup_line(&text) {
                    if let Some(sink) = on_event.as_mut() {
                        sink(&event);
                    }
                    if let BackupEvent::Summary(s) = event {
                        summary = Some(s);
                    }
                }
            }
            OutputLine::Stderr(text) => tail.observe(&text),
        })
        .await?;

        if !status.success() {
            return Err(Error::EngineFailed {
                code: status.code(),
                stderr: tail.into_string(),
            });
        }
        match summary {
            Some(summary) => {
                info!(snapshot = %summary.snapshot_id, files = summary.total_files_processed, "backup finished");
                Ok(summary)
            }
            None => Err(Error::MissingSummary),
        }
    }

    /// Lists snapshots, optionally filtered by `options`.
    ///
    /// Order follows the engine's output. A snapshot reported with a zero
    /// creation timestamp is a contract violation between this layer and
    /// the engine and surfaces as [`Error::ZeroTimestamp`]; retention
    /// ordering depends on these values being meaningful.
    pub async fn snapshots(
        &self,
        cancel: &CancellationToken,
        options: &[GenericOption],
    ) -> Result<Vec<Snapshot>> {
        let query_args = QueryArgs::assemble(options).to_args();
        let spec = self.command_spec("snapshots").arg("--json").args(query_args);

        let mut body = String::new();
        let mut tail = StderrTail::default();
        let status = run_streaming(&spec, cancel, |line| match line {
            OutputLine::Stdout(text) => {
                body.push_str(&text);
                body.push('\n');
            }
            OutputLine::Stderr(text) => tail.observe(&text),
        })
        .await?;

        if !status.success() {
            return Err(Error::EngineFailed {
                code: status.code(),
                stderr: tail.into_string(),
            });
        }

        let snapshots: Vec<Snapshot> = serde_json::from_str(body.trim())?;
        for snapshot in &snapshots {
            if snapshot.unix_time_ms() == 0 {
                return Err(Error::ZeroTimestamp {
                    id: snapshot.id.clone(),
                });
            }
        }
        debug!(count = snapshots.len(), "listed snapshots");
        Ok(snapshots)
    }

    /// Lists the entries under `path` inside snapshot `snapshot_id`.
    ///
    /// The engine reports the snapshot's own metadata first, then one entry
    /// per node: the listed path itself plus each item under it,
    /// directories included, so a directory of N items yields N + 1
    /// entries.
    pub async fn list_directory(
        &self,
        cancel: &CancellationToken,
        snapshot_id: &str,
        path: &str,
    ) -> Result<(Snapshot, Vec<LsEntry>)> {
        let spec = self
            .command_spec("ls")
            .arg("--json")
            .arg(snapshot_id)
            .arg(path);

        let mut meta: Option<Snapshot> = None;
        let mut entries: Vec<LsEntry> = Vec::new();
        let mut tail = StderrTail::default();
        let status = run_streaming(&spec, cancel, |line| match line {
            OutputLine::Stdout(text) => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    return;
                }
                if meta.is_none() {
                    if let Ok(snapshot) = serde_json::from_str::<Snapshot>(trimmed) {
                        meta = Some(snapshot);
                        return;
                    }
                }
                if let Ok(entry) = serde_json::from_str::<LsEntry>(trimmed) {
                    entries.push(entry);
                }
            }
            OutputLine::Stderr(text) => tail.observe(&text),
        })
        .await?;

        if !status.success() {
            return Err(Error::EngineFailed {
                code: status.code(),
                stderr: tail.into_string(),
            });
        }
        let meta = meta.ok_or_else(|| Error::MissingListingHeader {
            id: snapshot_id.to_string(),
        })?;
        Ok((meta, entries))
    }

    /// Applies `policy` to the current snapshot listing, prunes the Remove
    /// set, and returns the partition.
    ///
    /// The keep/remove decision is computed locally before the engine is
    /// invoked; the prune request names the removed snapshot ids
    /// explicitly. The engine's raw diagnostic text (including its
    /// human-readable prune-completion marker) is appended to `output`
    /// unparsed, and is never used for control decisions. When Remove is
    /// empty no prune runs and `output` is left untouched.
    pub async fn forget(
        &self,
        cancel: &CancellationToken,
        policy: &RetentionPolicy,
        output: &mut dyn Write,
    ) -> Result<RetentionResult> {
        let snapshots = self.snapshots(cancel, &[]).await?;
        let result = policy.apply(&snapshots);
        if result.remove.is_empty() {
            debug!("retention policy removes nothing, skipping prune");
            return Ok(result);
        }

        let mut spec = self.command_spec("forget").arg("--prune");
        for snapshot in &result.remove {
            spec = spec.arg(&snapshot.id);
        }

        let mut tail = StderrTail::default();
        let mut write_err: Option<std::io::Error> = None;
        let status = run_streaming(&spec, cancel, |line| {
            if let OutputLine::Stderr(text) = &line {
                tail.observe(text);
            }
            if write_err.is_none() {
                if let Err(err) = writeln!(output, "{}", line.text()) {
                    write_err = Some(err);
                }
            }
        })
        .await?;

        if let Some(err) = write_err {
            return Err(Error::Io(err));
        }
        if !status.success() {
            return Err(Error::EngineFailed {
                code: status.code(),
                stderr: tail.into_string(),
            });
        }
        info!(
            kept = result.keep.len(),
            removed = result.remove.len(),
            "forget completed"
        );
        Ok(result)
    }
}

/// Rolling tail of stderr lines attached to engine failures.
#[derive(Debug, Default)]
struct StderrTail {
    lines: VecDeque<String>,
}

impl StderrTail {
    fn observe(&mut self, line: &str) {
        if self.lines.len() == STDERR_TAIL_LINES {
            self.lines.pop_front();
        }
        self.lines.push_back(line.to_string());
    }

    fn into_string(self) -> String {
        let lines: Vec<String> = self.lines.into();
        lines.join("\n")
    }
}
