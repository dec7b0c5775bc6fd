mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{
    backup::BackupCommand, forget::ForgetCommand, init::InitCommand, ls::LsCommand,
    snapshots::SnapshotsCommand,
};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(
    name = "resticrun",
    about = "Drive a restic repository with streamed progress and local retention",
    long_about = "Resticrun orchestrates the restic backup engine: it composes validated invocations, streams structured progress out of the engine's JSON output, and computes retention decisions before asking the engine to prune"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, env = "RESTICRUN_REPO", help = "Repository location URI")]
    repo: Option<String>,

    #[arg(long, env = "RESTICRUN_PASSWORD", help = "Repository password")]
    password: Option<String>,

    #[arg(long, env = "RESTICRUN_RESTIC_CMD", help = "Path to the restic binary")]
    restic_cmd: Option<String>,

    #[arg(long, help = "Disable the engine's local cache")]
    no_cache: bool,

    #[arg(short, long, help = "Enable verbose output")]
    verbose: bool,

    #[arg(short, long, help = "Enable quiet mode")]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Initialize a new repository")]
    Init(InitCommand),

    #[command(about = "Create a new backup")]
    Backup(BackupCommand),

    #[command(about = "List snapshots")]
    Snapshots(SnapshotsCommand),

    #[command(about = "List files in a snapshot")]
    Ls(LsCommand),

    #[command(about = "Apply a retention policy and prune removed snapshots")]
    Forget(ForgetCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.quiet);

    info!("Starting resticrun");

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    match cli.command {
        Commands::Init(ref cmd) => cmd.run(&cli, &cancel).await,
        Commands::Backup(ref cmd) => cmd.run(&cli, &cancel).await,
        Commands::Snapshots(ref cmd) => cmd.run(&cli, &cancel).await,
        Commands::Ls(ref cmd) => cmd.run(&cli, &cancel).await,
        Commands::Forget(ref cmd) => cmd.run(&cli, &cancel).await,
    }
}

fn init_tracing(verbose: bool, quiet: bool) {
    let level = if quiet {
        "warn"
    } else if verbose {
        "debug"
    } else {
        "info"
    };

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::new(format!(
            "resticrun={0},resticrun_core={0}",
            level
        )))
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Setting default subscriber failed");
}
