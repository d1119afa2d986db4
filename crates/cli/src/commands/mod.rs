use clap::Subcommand;
use std::path::PathBuf;
use taleweave_config::OrchestratorConfig;

pub mod config;
pub mod plan;
pub mod run;

#[derive(Subcommand)]
pub enum Commands {
    /// Show the task graph a story request expands into
    Plan {
        /// Story request as JSON (`-` for stdin)
        spec: PathBuf,
    },

    /// Print the content fingerprint of every task
    #[command(visible_alias = "fp")]
    Fingerprint {
        /// Story request as JSON (`-` for stdin)
        spec: PathBuf,
    },

    /// Run a story request and print the assembled story
    Run {
        /// Story request as JSON (`-` for stdin)
        spec: PathBuf,

        /// Use the offline simulated providers instead of HTTP endpoints
        #[arg(long)]
        simulate: bool,

        /// Simulated latency per provider call, in milliseconds
        #[arg(long, default_value = "0")]
        latency_ms: u64,

        /// Probability that a simulated call fails with a transient error
        #[arg(long, default_value = "0.0")]
        fail_rate: f64,
    },

    /// Print the effective configuration
    Config,
}

impl Commands {
    pub async fn execute(self, config: OrchestratorConfig) -> eyre::Result<()> {
        match self {
            Commands::Plan { spec } => plan::plan(&spec, &config),
            Commands::Fingerprint { spec } => plan::fingerprints(&spec, &config),
            Commands::Run {
                spec,
                simulate,
                latency_ms,
                fail_rate,
            } => {
                let providers = if simulate {
                    run::ProviderChoice::Simulated {
                        latency_ms,
                        fail_rate,
                    }
                } else {
                    run::ProviderChoice::Http
                };
                run::run(&spec, config, providers).await
            }
            Commands::Config => config::show(&config),
        }
    }
}
