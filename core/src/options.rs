use crate::{Error, Result};
use std::path::PathBuf;

/// A single composable piece of backup configuration.
///
/// Options are applied left-to-right onto a [`BackupArgs`] builder and are
/// cumulative: two `Paths` options back up both path sets in one run, and a
/// file is excluded if it matches any one of the supplied patterns. Exclude
/// patterns are passed to the engine verbatim; no local glob matching happens
/// here.
#[derive(Debug, Clone)]
pub enum BackupOption {
    Paths(Vec<PathBuf>),
    Excludes(Vec<String>),
    Tags(Vec<String>),
}

impl BackupOption {
    pub fn paths<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        BackupOption::Paths(paths.into_iter().map(Into::into).collect())
    }

    pub fn excludes<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        BackupOption::Excludes(patterns.into_iter().map(Into::into).collect())
    }

    pub fn tags<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        BackupOption::Tags(tags.into_iter().map(Into::into).collect())
    }

    fn apply(&self, args: &mut BackupArgs) {
        match self {
            BackupOption::Paths(paths) => args.paths.extend(paths.iter().cloned()),
            BackupOption::Excludes(patterns) => args.excludes.extend(patterns.iter().cloned()),
            BackupOption::Tags(tags) => args.tags.extend(tags.iter().cloned()),
        }
    }
}

/// Assembled backup invocation arguments.
#[derive(Debug, Clone, Default)]
pub struct BackupArgs {
    paths: Vec<PathBuf>,
    excludes: Vec<String>,
    tags: Vec<String>,
}

impl BackupArgs {
    pub fn assemble(options: &[BackupOption]) -> Self {
        let mut args = BackupArgs::default();
        for option in options {
            option.apply(&mut args);
        }
        args
    }

    /// Renders the engine argument vector. Fails with
    /// [`Error::NoBackupPaths`] before any process is started if no target
    /// path was supplied.
    pub fn to_args(&self) -> Result<Vec<String>> {
        if self.paths.is_empty() {
            return Err(Error::NoBackupPaths);
        }
        let mut args = Vec::new();
        for pattern in &self.excludes {
            args.push("-e".to_string());
            args.push(pattern.clone());
        }
        for tag in &self.tags {
            args.push("--tag".to_string());
            args.push(tag.clone());
        }
        for path in &self.paths {
            args.push(path.display().to_string());
        }
        Ok(args)
    }
}

/// A composable filter for listing operations.
#[derive(Debug, Clone)]
pub enum GenericOption {
    Tags(Vec<String>),
}

impl GenericOption {
    /// Filter by tags. A snapshot matches only if it carries every listed
    /// tag (AND semantics); the tags are rendered as one comma-joined
    /// `--tag` group so the engine applies that rule itself.
    pub fn tags<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        GenericOption::Tags(tags.into_iter().map(Into::into).collect())
    }

    fn apply(&self, args: &mut QueryArgs) {
        match self {
            GenericOption::Tags(tags) => args.tags.extend(tags.iter().cloned()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueryArgs {
    tags: Vec<String>,
}

impl QueryArgs {
    pub fn assemble(options: &[GenericOption]) -> Self {
        let mut args = QueryArgs::default();
        for option in options {
            option.apply(&mut args);
        }
        args
    }

    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if !self.tags.is_empty() {
            args.push("--tag".to_string());
            args.push(self.tags.join(","));
        }
        args
    }
}
