use std::{path::PathBuf, time::Duration};

pub const PRODUCTION_KEY_HOST: &str = "static.gc.apple.com";
pub const SANDBOX_KEY_HOST: &str = "sandbox.gc.apple.com";

/// Default subject prefix of Apple's Game Center signing certificates (RFC 2253 order).
pub const APPLE_SUBJECT_PREFIX: &str = "CN=Apple Inc.,";

/// Hosts Apple's signing certificates have named in their `caIssuers` AIA entries.
pub const DEFAULT_ISSUER_HOSTS: &[&str] = &["cacerts.digicert.com", "certs.apple.com", "sv.symcb.com"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// Game Center environment; selects the key-distribution host.
pub enum Environment {
    #[default]
    Production,
    Sandbox,
}

impl Environment {
    pub fn from_sandbox_flag(sandbox: bool) -> Self {
        if sandbox {
            Environment::Sandbox
        } else {
            Environment::Production
        }
    }

    pub fn key_host(self) -> &'static str {
        match self {
            Environment::Production => PRODUCTION_KEY_HOST,
            Environment::Sandbox => SANDBOX_KEY_HOST,
        }
    }
}

#[derive(Debug, Clone)]
/// Parameters that drive request validation, trust anchors, and certificate fetching.
pub struct VerifierConfig {
    /// Bundle identifier of the app the signature was produced for.
    pub bundle_id: String,
    /// How old a signature may be before it is rejected.
    pub expiry_window: Duration,
    pub environment: Environment,
    /// Load the operating system trust store as chain anchors.
    pub use_native_roots: bool,
    /// Additional PEM files whose certificates are trusted as roots.
    pub extra_root_pem_paths: Vec<PathBuf>,
    /// PEM files with intermediates available when building chains.
    pub intermediate_pem_paths: Vec<PathBuf>,
    /// Hosts an intermediate may be downloaded from when a certificate's AIA
    /// `caIssuers` entry names its issuer. Empty disables the lookup.
    pub issuer_hosts: Vec<String>,
    /// Literal prefix the leaf subject (RFC 2253 rendering) must start with.
    pub expected_subject_prefix: String,
    /// Upper bound the HTTP transport applies to a certificate download.
    pub fetch_timeout: Duration,
    /// If set, reject timestamps further than this into the future.
    pub max_future_skew: Option<Duration>,
}

impl VerifierConfig {
    /// Production defaults for the given bundle identifier.
    pub fn new(bundle_id: impl Into<String>) -> Self {
        Self {
            bundle_id: bundle_id.into(),
            expiry_window: Duration::from_millis(120_000),
            environment: Environment::Production,
            use_native_roots: true,
            extra_root_pem_paths: Vec::new(),
            intermediate_pem_paths: Vec::new(),
            issuer_hosts: DEFAULT_ISSUER_HOSTS.iter().map(|h| h.to_string()).collect(),
            expected_subject_prefix: APPLE_SUBJECT_PREFIX.to_string(),
            fetch_timeout: Duration::from_secs(10),
            max_future_skew: None,
        }
    }

    pub fn key_host(&self) -> &'static str {
        self.environment.key_host()
    }

    pub(crate) fn expiry_window_ms(&self) -> u64 {
        u64::try_from(self.expiry_window.as_millis()).unwrap_or(u64::MAX)
    }
}
