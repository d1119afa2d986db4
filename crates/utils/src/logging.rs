//! Tracing setup and span helpers

use tracing::{span, Level, Span};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable selecting the log format (`compact` or `json`)
pub const LOG_FORMAT_ENV: &str = "TALEWEAVE_LOG_FORMAT";

/// Initialize the tracing system
///
/// Filtering follows `RUST_LOG` and defaults to `info`. Output goes to stderr
/// so that command output on stdout stays machine-readable.
pub fn init() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;

    let json = std::env::var(LOG_FORMAT_ENV)
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        let fmt_layer = fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_current_span(true)
            .with_target(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init()?;
    } else {
        let fmt_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(is_tty())
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .with_level(true);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init()?;
    }

    Ok(())
}

fn is_tty() -> bool {
    std::io::IsTerminal::is_terminal(&std::io::stderr())
}

/// Span covering one job's scheduler run
pub fn job_span(job_id: &str, total_tasks: usize) -> Span {
    span!(Level::INFO, "job", job_id = %job_id, total_tasks = %total_tasks)
}

/// Span covering one provider attempt
pub fn task_span(task_id: &str, kind: &str, attempt: u32) -> Span {
    span!(Level::INFO, "task", task_id = %task_id, kind = %kind, attempt = %attempt)
}

/// Emit a structured event for task completion
pub fn task_completed(task_id: &str, attempts: u32, from_cache: bool) {
    tracing::info!(
        task_id = %task_id,
        attempts = %attempts,
        from_cache = %from_cache,
        "task_completed"
    );
}

/// Emit a structured event for a terminal task failure
pub fn task_failed(task_id: &str, attempts: u32, category: &str) {
    tracing::warn!(
        task_id = %task_id,
        attempts = %attempts,
        category = %category,
        "task_failed"
    );
}

/// Emit a structured event for cache lookups
pub fn cache_event(task_id: &str, hit: bool) {
    if hit {
        tracing::debug!(task_id = %task_id, "cache_hit");
    } else {
        tracing::debug!(task_id = %task_id, "cache_miss");
    }
}
