use clap::Parser;
use std::path::PathBuf;

mod commands;
mod execute;
mod spec_file;

use commands::Commands;

#[derive(Parser)]
#[command(name = "taleweave")]
#[command(about = "Plan and run picture-book generation jobs", long_about = None)]
#[command(version)]
struct Cli {
    /// JSON configuration file; TALEWEAVE_* environment variables override it
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    taleweave_utils::logging::init().map_err(|e| eyre::eyre!(e))?;

    let cli = Cli::parse();
    execute::execute_command(cli.command, cli.config).await
}
