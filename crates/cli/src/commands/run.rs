use crate::spec_file;
use eyre::{bail, eyre, WrapErr};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use taleweave_config::OrchestratorConfig;
use taleweave_core::{JobState, StoryAssembly};
use taleweave_task::{
    HttpProvider, JobManager, OrchestrationContext, Provider, ProviderRegistry, SimulatedProvider,
};

const PROGRESS_INTERVAL: Duration = Duration::from_secs(2);

pub enum ProviderChoice {
    Http,
    Simulated { latency_ms: u64, fail_rate: f64 },
}

pub async fn run(
    spec: &Path,
    config: OrchestratorConfig,
    providers: ProviderChoice,
) -> eyre::Result<()> {
    let spec = spec_file::load(spec)?;
    let providers = build_providers(&config, providers)?;
    let ctx = OrchestrationContext::builder(providers).config(config).build()?;
    let jobs = JobManager::new(Arc::new(ctx));

    let job_id = jobs.submit(spec)?;
    let mut ticker = tokio::time::interval(PROGRESS_INTERVAL);

    let story = loop {
        tokio::select! {
            story = jobs.wait(job_id) => break story?,
            _ = tokio::signal::ctrl_c() => {
                tracing::warn!("interrupted, cancelling job");
                break jobs.cancel(job_id).await?;
            }
            _ = ticker.tick() => report_progress(&jobs.poll(job_id)?),
        }
    };

    println!("{}", serde_json::to_string_pretty(&story)?);

    let stats = jobs.context().cache().stats();
    tracing::info!(
        hits = stats.hits,
        misses = stats.misses,
        entries = stats.entries,
        "cache usage"
    );

    match &story.state {
        JobState::Completed => Ok(()),
        JobState::Failed { reason } => bail!(
            "story generation failed: {reason} (failed pages: {:?})",
            story.failed_pages()
        ),
        JobState::Cancelled => bail!("story generation was cancelled"),
        JobState::Running => Err(eyre!("job ended while still running")),
    }
}

fn report_progress(story: &StoryAssembly) {
    tracing::info!(
        done = story.done_count(),
        total = story.tasks.len(),
        failed = story.failures.len(),
        "progress"
    );
}

fn build_providers(
    config: &OrchestratorConfig,
    choice: ProviderChoice,
) -> eyre::Result<ProviderRegistry> {
    match choice {
        ProviderChoice::Simulated {
            latency_ms,
            fail_rate,
        } => {
            let simulated = SimulatedProvider::new("simulated")
                .with_latency(Duration::from_millis(latency_ms))
                .with_failure_rate(fail_rate);
            Ok(ProviderRegistry::single(Arc::new(simulated)))
        }
        ProviderChoice::Http => {
            let endpoints = &config.providers;
            let api_key = match &endpoints.api_key_env {
                Some(var) => Some(
                    std::env::var(var)
                        .wrap_err_with(|| format!("API key variable {var} is not set"))?,
                ),
                None => None,
            };
            let http = |name: &str, endpoint: Option<&String>| -> eyre::Result<Arc<dyn Provider>> {
                let endpoint = endpoint.ok_or_else(|| {
                    eyre!("no {name} endpoint configured; set providers.{name}Endpoint or pass --simulate")
                })?;
                let mut provider = HttpProvider::new(name, endpoint.as_str())?;
                if let Some(key) = &api_key {
                    provider = provider.with_api_key(key.clone());
                }
                Ok(Arc::new(provider))
            };
            Ok(ProviderRegistry::new(
                http("text", endpoints.text_endpoint.as_ref())?,
                http("image", endpoints.image_endpoint.as_ref())?,
            ))
        }
    }
}
