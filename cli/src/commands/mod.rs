pub mod backup;
pub mod forget;
pub mod init;
pub mod ls;
pub mod snapshots;

use anyhow::{anyhow, Result};
use resticrun_core::Repo;

/// Builds the repository handle from the global CLI flags.
pub fn repo_from_cli(cli: &crate::Cli) -> Result<Repo> {
    let uri = cli
        .repo
        .as_ref()
        .ok_or_else(|| anyhow!("Repository location required (--repo or RESTICRUN_REPO)"))?;

    let password = cli
        .password
        .as_ref()
        .ok_or_else(|| anyhow!("Password required (--password or RESTICRUN_PASSWORD)"))?;

    let mut repo = Repo::new(uri, password);
    if let Some(command) = &cli.restic_cmd {
        repo = repo.with_command(command);
    }
    if cli.no_cache {
        repo = repo.with_flags(["--no-cache"]);
    }
    Ok(repo)
}
