use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON decode error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("no backup paths were supplied")]
    NoBackupPaths,

    #[error("failed to start {command}: {source}")]
    ProcessStart {
        command: String,
        source: std::io::Error,
    },

    #[error("engine exited with status {code:?}: {stderr}")]
    EngineFailed { code: Option<i32>, stderr: String },

    #[error("engine exited cleanly but emitted no backup summary")]
    MissingSummary,

    #[error("listing for snapshot {id} lacked a snapshot header")]
    MissingListingHeader { id: String },

    #[error("snapshot {id} has a zero creation timestamp")]
    ZeroTimestamp { id: String },

    #[error("operation cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, Error>;
