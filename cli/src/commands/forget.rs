use anyhow::Result;
use clap::Args;
use resticrun_core::RetentionPolicy;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Args)]
pub struct ForgetCommand {
    #[arg(long, help = "Keep the N most recent snapshots")]
    keep_last: Option<u32>,

    #[arg(long, help = "Keep hourly snapshots for N hours")]
    keep_hourly: Option<u32>,

    #[arg(long, help = "Keep daily snapshots for N days")]
    keep_daily: Option<u32>,

    #[arg(long, help = "Keep weekly snapshots for N weeks")]
    keep_weekly: Option<u32>,

    #[arg(long, help = "Keep monthly snapshots for N months")]
    keep_monthly: Option<u32>,

    #[arg(long, help = "Keep yearly snapshots for N years")]
    keep_yearly: Option<u32>,
}

impl ForgetCommand {
    pub async fn run(&self, cli: &crate::Cli, cancel: &CancellationToken) -> Result<()> {
        let repo = super::repo_from_cli(cli)?;

        let policy = RetentionPolicy {
            keep_last_n: self.keep_last.unwrap_or(0),
            keep_hourly: self.keep_hourly.unwrap_or(0),
            keep_daily: self.keep_daily.unwrap_or(0),
            keep_weekly: self.keep_weekly.unwrap_or(0),
            keep_monthly: self.keep_monthly.unwrap_or(0),
            keep_yearly: self.keep_yearly.unwrap_or(0),
        };

        info!("Applying retention policy: {:?}", policy);

        let mut output = std::io::stdout();
        let result = repo.forget(cancel, &policy, &mut output).await?;

        println!();
        println!("Kept {} snapshots:", result.keep.len());
        for snapshot in &result.keep {
            println!(
                "  {} {}",
                snapshot.short_id,
                snapshot.time.format("%Y-%m-%d %H:%M:%S")
            );
        }
        println!("Removed {} snapshots:", result.remove.len());
        for snapshot in &result.remove {
            println!(
                "  {} {}",
                snapshot.short_id,
                snapshot.time.format("%Y-%m-%d %H:%M:%S")
            );
        }

        Ok(())
    }
}
