pub mod error;
pub mod event;
pub mod options;
pub mod process;
pub mod repo;
pub mod retention;

pub use error::{Error, Result};
pub use event::{BackupEvent, BackupStatus, BackupSummary, LsEntry, Snapshot};
pub use options::{BackupOption, GenericOption};
pub use process::{CommandSpec, OutputLine};
pub use repo::Repo;
pub use retention::{RetentionPolicy, RetentionResult};
