use anyhow::Result;
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use resticrun_core::{BackupEvent, BackupOption};
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Args)]
pub struct BackupCommand {
    #[arg(help = "Paths to backup")]
    paths: Vec<String>,

    #[arg(long, help = "Backup tags")]
    tag: Vec<String>,

    #[arg(long, short = 'e', help = "Exclude patterns")]
    exclude: Vec<String>,
}

impl BackupCommand {
    pub async fn run(&self, cli: &crate::Cli, cancel: &CancellationToken) -> Result<()> {
        let repo = super::repo_from_cli(cli)?;

        info!("Starting backup of {} paths", self.paths.len());

        let mut options = vec![BackupOption::paths(self.paths.iter().cloned())];
        if !self.exclude.is_empty() {
            options.push(BackupOption::excludes(self.exclude.iter().cloned()));
        }
        if !self.tag.is_empty() {
            options.push(BackupOption::tags(self.tag.iter().cloned()));
        }

        let pb = ProgressBar::new(100);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{bar:40.cyan/blue} {pos:>3}% {msg}")
                .unwrap(),
        );

        let mut on_event = |event: &BackupEvent| {
            if let BackupEvent::Status(status) = event {
                pb.set_position((status.percent_done * 100.0) as u64);
                pb.set_message(format!(
                    "{}/{} files",
                    status.files_done, status.total_files
                ));
            }
        };

        let summary = repo.backup(cancel, Some(&mut on_event), &options).await?;
        pb.finish_and_clear();

        println!("Backup completed successfully");
        println!("Snapshot: {}", summary.snapshot_id);
        println!("Files: {}", summary.total_files_processed);
        println!(
            "Size: {:.2} MB",
            summary.total_bytes_processed as f64 / 1024.0 / 1024.0
        );
        println!("Duration: {:.1}s", summary.total_duration);

        Ok(())
    }
}
