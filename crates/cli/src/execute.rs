use crate::commands::Commands;
use std::path::PathBuf;
use taleweave_config::{ConfigLoader, OrchestratorConfig};

fn load_config(path: Option<PathBuf>) -> eyre::Result<OrchestratorConfig> {
    let loader = match path {
        Some(path) => ConfigLoader::new().with_file(path),
        None => ConfigLoader::new(),
    };
    Ok(loader.load()?)
}

pub async fn execute_command(command: Commands, config: Option<PathBuf>) -> eyre::Result<()> {
    let config = load_config(config)?;
    command.execute(config).await
}
