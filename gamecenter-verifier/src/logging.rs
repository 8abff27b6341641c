use crate::settings::Settings;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_LEVEL: &str = "info";

/// Install a `tracing` subscriber on stderr, leaving stdout for the verdict.
///
/// `RUST_LOG` wins when set. Otherwise `GC_VERIFIER_LOG_LEVEL` applies to the
/// verifier and the CLI, and everything else (reqwest, hyper, rustls) logs at `warn`.
pub fn setup_logging(settings: &Settings) {
    let level = settings.log_level.as_deref().unwrap_or(DEFAULT_LEVEL);
    let mut rejected = None;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::try_new(default_directives(level)).unwrap_or_else(|e| {
            rejected = Some(e.to_string());
            EnvFilter::new(default_directives(DEFAULT_LEVEL))
        })
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    if let Some(reason) = rejected {
        warn!(level, %reason, "invalid log level, using {DEFAULT_LEVEL}");
    }
    debug!(level, "logging initialized");
}

fn default_directives(level: &str) -> String {
    format!("warn,gc_verifier={level},gc_verify={level}")
}
