use anyhow::Result;
use clap::Args;
use tokio_util::sync::CancellationToken;

#[derive(Args)]
pub struct LsCommand {
    #[arg(help = "Snapshot ID")]
    snapshot_id: String,

    #[arg(help = "Path within the snapshot")]
    path: String,
}

impl LsCommand {
    pub async fn run(&self, cli: &crate::Cli, cancel: &CancellationToken) -> Result<()> {
        let repo = super::repo_from_cli(cli)?;

        let (snapshot, entries) = repo
            .list_directory(cancel, &self.snapshot_id, &self.path)
            .await?;

        println!(
            "snapshot {} from {}",
            snapshot.short_id,
            snapshot.time.format("%Y-%m-%d %H:%M:%S")
        );
        for entry in &entries {
            let marker = if entry.is_dir() { "d" } else { "-" };
            println!("{} {:>10} {}", marker, entry.size, entry.path);
        }
        println!("{} entries", entries.len());

        Ok(())
    }
}
