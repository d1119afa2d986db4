use taleweave_config::OrchestratorConfig;

pub fn show(config: &OrchestratorConfig) -> eyre::Result<()> {
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}
