mod app;
mod config;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use app::App;
use config::AppConfig;

#[derive(Debug, Parser)]
#[command(name = "reflex")]
#[command(about = "Visual reaction-time test with local history and a shared ranking")]
struct Cli {
    /// TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Where results and the display name are stored
    #[arg(long = "data-dir", global = true)]
    data_dir: Option<PathBuf>,
    /// PocketBase base URL for the shared ranking
    #[arg(long = "leaderboard-url", global = true)]
    leaderboard_url: Option<String>,
    /// Never contact the remote leaderboard
    #[arg(long, global = true)]
    offline: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run reaction trials interactively (default)
    Play,
    /// List my stored results, newest first
    History,
    /// Best, mean and latest of my stored results
    Summary,
    /// Show the shared ranking
    Ranking,
    /// Show or set the display name used for submissions
    Name { name: Option<String> },
}

fn init_logging() {
    // Logs go to stderr so they never interleave with the prompt on stdout
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn resolve_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    if let Some(url) = &cli.leaderboard_url {
        config.leaderboard_url = Some(url.clone());
    }
    Ok(config)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let config = resolve_config(&cli)?;

    let mut app = App::new(&config, cli.offline)?;
    match cli.command.unwrap_or(Commands::Play) {
        Commands::Play => app.play().await?,
        Commands::History => app.print_history().await,
        Commands::Summary => app.print_summary().await,
        Commands::Ranking => app.print_ranking().await,
        Commands::Name { name: Some(name) } => app.set_name(&name).await?,
        Commands::Name { name: None } => app.show_name().await?,
    }

    Ok(())
}
