use anyhow::Result;
use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Args)]
pub struct InitCommand {}

impl InitCommand {
    pub async fn run(&self, cli: &crate::Cli, cancel: &CancellationToken) -> Result<()> {
        let repo = super::repo_from_cli(cli)?;

        info!("Initializing repository at: {}", repo.uri());
        repo.init(cancel).await?;

        println!("Repository initialized at {}", repo.uri());
        Ok(())
    }
}
