use clap::{Parser, Subcommand};
use log::info;
use std::path::PathBuf;

use vitals::{
    app::App,
    config::{self, ConfigManager},
    proc::Metric,
};

#[derive(Parser, Debug)]
#[command(about)]
struct Cli {
    #[arg(short, long, value_name = "FILE", default_value = config::DEFAULT_FILE)]
    config: PathBuf,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Sample processes and print the top ones after every tick
    Run {
        /// cpu, memory, network-in or network-out
        #[arg(short, long)]
        metric: Option<Metric>,
        /// Number of processes to show
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Validate the configuration file and print the effective settings
    Validate,
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    match cli.command {
        Some(Commands::Validate) => {
            let config = ConfigManager::load_from_file(cli.config)?;
            print!("{}", config.to_toml()?);
            Ok(())
        }
        Some(Commands::Run { metric, limit }) => run(cli.config, metric, limit).await,
        None => run(cli.config, None, None).await,
    }
}

async fn run(config: PathBuf, metric: Option<Metric>, limit: Option<usize>) -> color_eyre::Result<()> {
    info!("Logging started");
    let mut app = App::new(config, metric, limit)?;
    app.run().await
}
