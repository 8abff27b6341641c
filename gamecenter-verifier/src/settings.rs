use gc_verifier::identity::{Environment, VerifierConfig};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Clone, Debug, Deserialize)]
/// CLI configuration loaded from `GC_VERIFIER_*` environment variables.
pub struct Settings {
    pub bundle_id: String,

    pub log_level: Option<String>,

    #[serde(default = "def_expiry_ms")]
    pub expiry_ms: u64,

    #[serde(default)]
    pub sandbox: bool,

    #[serde(default = "def_true")]
    pub native_roots: bool,

    /// Comma separated PEM paths.
    #[serde(default)]
    pub extra_roots: Vec<PathBuf>,

    #[serde(default)]
    pub intermediates: Vec<PathBuf>,

    /// Overrides the AIA issuer host allow-list; empty disables issuer downloads.
    pub issuer_hosts: Option<Vec<String>>,

    #[serde(default = "def_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    pub max_future_skew_ms: Option<u64>,
}

impl Settings {
    /// Populates the settings from environment variables, honoring `.env`.
    pub fn from_env() -> anyhow::Result<Self> {
        let _ = dotenvy::dotenv();
        let settings: Self = envy::prefixed("GC_VERIFIER_").from_env()?;
        Ok(settings)
    }

    /// Emit the effective configuration via tracing.
    pub fn info(&self) {
        tracing::info!(
            bundle_id = %self.bundle_id,
            sandbox = self.sandbox,
            expiry_ms = self.expiry_ms,
            native_roots = self.native_roots,
            "effective config"
        );
        if self.max_future_skew_ms.is_none() {
            tracing::debug!("future timestamps are not bounded");
        }
    }

    pub fn verifier_config(&self) -> VerifierConfig {
        let mut cfg = VerifierConfig::new(self.bundle_id.clone());
        cfg.expiry_window = Duration::from_millis(self.expiry_ms);
        cfg.environment = Environment::from_sandbox_flag(self.sandbox);
        cfg.use_native_roots = self.native_roots;
        cfg.extra_root_pem_paths = self.extra_roots.clone();
        cfg.intermediate_pem_paths = self.intermediates.clone();
        if let Some(hosts) = &self.issuer_hosts {
            cfg.issuer_hosts = hosts.clone();
        }
        cfg.fetch_timeout = Duration::from_secs(self.fetch_timeout_secs);
        cfg.max_future_skew = self.max_future_skew_ms.map(Duration::from_millis);
        cfg
    }
}

fn def_expiry_ms() -> u64 {
    120_000
}

fn def_true() -> bool {
    true
}

fn def_fetch_timeout_secs() -> u64 {
    10
}
