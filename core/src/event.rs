use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One line of the engine's `backup --json` output.
///
/// The engine interleaves structured progress with plain diagnostic text on
/// stdout; only lines tagged `message_type: status` or `message_type: summary`
/// become events. Exactly one `Summary` is emitted per successful run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "message_type", rename_all = "snake_case")]
pub enum BackupEvent {
    Status(BackupStatus),
    Summary(BackupSummary),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupStatus {
    #[serde(default)]
    pub percent_done: f64,
    #[serde(default)]
    pub total_files: u64,
    #[serde(default)]
    pub files_done: u64,
    #[serde(default)]
    pub total_bytes: u64,
    #[serde(default)]
    pub bytes_done: u64,
    #[serde(default)]
    pub current_files: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupSummary {
    #[serde(default)]
    pub files_new: u64,
    #[serde(default)]
    pub files_changed: u64,
    #[serde(default)]
    pub files_unmodified: u64,
    #[serde(default)]
    pub dirs_new: u64,
    #[serde(default)]
    pub dirs_changed: u64,
    #[serde(default)]
    pub dirs_unmodified: u64,
    #[serde(default)]
    pub data_added: u64,
    pub total_files_processed: u64,
    #[serde(default)]
    pub total_bytes_processed: u64,
    #[serde(default)]
    pub total_duration: f64,
    pub snapshot_id: String,
}

/// Decodes a single raw output line into a backup event.
///
/// Total: blank lines, plain-text noise, and unknown `message_type`s all map
/// to `None`. Malformed input never fails the caller.
pub fn parse_backup_line(line: &str) -> Option<BackupEvent> {
    let trimmed = line.trim();
    if trimmed.is_empty() || !trimmed.starts_with('{') {
        return None;
    }
    match serde_json::from_str(trimmed) {
        Ok(event) => Some(event),
        Err(err) => {
            debug!(line = trimmed, error = %err, "ignoring undecodable engine line");
            None
        }
    }
}

/// A snapshot record as reported by `snapshots --json` and the header line of
/// `ls --json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: String,
    #[serde(default)]
    pub short_id: String,
    pub time: DateTime<Utc>,
    #[serde(default)]
    pub tree: String,
    #[serde(default)]
    pub paths: Vec<String>,
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Snapshot {
    /// Creation time in milliseconds since the epoch. Retention ordering and
    /// the listing integrity check both key off this value.
    pub fn unix_time_ms(&self) -> i64 {
        self.time.timestamp_millis()
    }
}

/// One entry line of `ls --json`: the listed path's own node plus each item
/// under it, directories included.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LsEntry {
    pub name: String,
    #[serde(rename = "type", default)]
    pub node_type: String,
    pub path: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub mode: u32,
    #[serde(default)]
    pub mtime: Option<DateTime<Utc>>,
}

impl LsEntry {
    pub fn is_dir(&self) -> bool {
        self.node_type == "dir"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_status_line() {
        let line = r#"{"message_type":"status","percent_done":0.25,"total_files":100,"files_done":25,"total_bytes":4096,"bytes_done":1024,"current_files":["/data/file25"]}"#;
        match parse_backup_line(line) {
            Some(BackupEvent::Status(status)) => {
                assert_eq!(status.files_done, 25);
                assert_eq!(status.total_files, 100);
                assert_eq!(status.current_files, vec!["/data/file25"]);
            }
            other => panic!("expected status event, got {:?}", other),
        }
    }

    #[test]
    fn parses_summary_line() {
        let line = r#"{"message_type":"summary","files_new":100,"files_changed":0,"files_unmodified":0,"total_files_processed":100,"total_bytes_processed":4096,"total_duration":0.42,"snapshot_id":"a1b2c3"}"#;
        match parse_backup_line(line) {
            Some(BackupEvent::Summary(summary)) => {
                assert_eq!(summary.total_files_processed, 100);
                assert_eq!(summary.snapshot_id, "a1b2c3");
            }
            other => panic!("expected summary event, got {:?}", other),
        }
    }

    #[test]
    fn ignores_noise_and_unknown_tags() {
        assert!(parse_backup_line("").is_none());
        assert!(parse_backup_line("using parent snapshot a1b2c3").is_none());
        assert!(parse_backup_line("{not json at all").is_none());
        assert!(parse_backup_line(r#"{"message_type":"verbose_status","action":"new"}"#).is_none());
    }

    #[test]
    fn snapshot_time_is_millisecond_precise() {
        let snapshot: Snapshot = serde_json::from_str(
            r#"{"id":"abc","time":"2024-01-01T00:00:00.500Z","tags":["nightly"]}"#,
        )
        .unwrap();
        assert_eq!(snapshot.unix_time_ms(), 1_704_067_200_500);
        assert_eq!(snapshot.tags, vec!["nightly"]);
    }

    #[test]
    fn zero_epoch_time_decodes_to_zero_ms() {
        let snapshot: Snapshot =
            serde_json::from_str(r#"{"id":"abc","time":"1970-01-01T00:00:00Z"}"#).unwrap();
        assert_eq!(snapshot.unix_time_ms(), 0);
    }

    #[test]
    fn decodes_ls_entry() {
        let entry: LsEntry = serde_json::from_str(
            r#"{"name":"file1","type":"file","path":"/data/file1","size":10,"mode":420,"mtime":"2024-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(entry.name, "file1");
        assert!(!entry.is_dir());
    }
}
