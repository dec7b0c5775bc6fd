use anyhow::{anyhow, Result};
use clap::Args;
use resticrun_core::GenericOption;
use tokio_util::sync::CancellationToken;

#[derive(Args)]
pub struct SnapshotsCommand {
    #[arg(long, help = "Only snapshots carrying every listed tag")]
    tag: Vec<String>,

    #[arg(long, help = "Output format (table, json)")]
    format: Option<String>,
}

impl SnapshotsCommand {
    pub async fn run(&self, cli: &crate::Cli, cancel: &CancellationToken) -> Result<()> {
        let repo = super::repo_from_cli(cli)?;

        let mut options = Vec::new();
        if !self.tag.is_empty() {
            options.push(GenericOption::tags(self.tag.iter().cloned()));
        }

        let snapshots = repo.snapshots(cancel, &options).await?;

        if snapshots.is_empty() {
            println!("No snapshots found");
            return Ok(());
        }

        match self.format.as_deref().unwrap_or("table") {
            "table" => {
                println!(
                    "{:<12} {:<20} {:<15} {:<20} {}",
                    "ID", "Date", "Host", "Tags", "Paths"
                );
                println!("{:-<90}", "");

                for snapshot in &snapshots {
                    println!(
                        "{:<12} {:<20} {:<15} {:<20} {}",
                        snapshot.short_id,
                        snapshot.time.format("%Y-%m-%d %H:%M:%S"),
                        snapshot.hostname,
                        snapshot.tags.join(","),
                        snapshot.paths.join(",")
                    );
                }
            }
            "json" => {
                let json = serde_json::to_string_pretty(&snapshots)?;
                println!("{}", json);
            }
            other => {
                return Err(anyhow!("Unsupported format: {}", other));
            }
        }

        Ok(())
    }
}
