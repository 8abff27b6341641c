use super::cache::CertificateCache;
use super::certs::{
    admit_certificate, ca_issuer_urls, split_certificate_bytes, RootStore, TrustedCertificate,
};
use super::config::VerifierConfig;
use super::errors::IdentityError;
use super::fetch::{CertificateFetcher, HttpFetcher};
use super::request::validate_request;
use super::signature::verify_identity_signature;
use super::types::{IdentityPayload, IdentityRequest, VerifiedIdentity};
use super::util::{Clock, SystemClock};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Upper bound on AIA issuer downloads made while admitting one certificate.
const MAX_ISSUER_FETCHES: usize = 4;

/// Game Center identity verifier with a process-lifetime certificate cache.
///
/// Share it behind an `Arc`; every method takes `&self`. Concurrent misses on
/// the same certificate each fetch it, since no lock is held across the download.
pub struct Verifier<F = HttpFetcher> {
    cfg: VerifierConfig,
    roots: RootStore,
    cache: CertificateCache,
    fetcher: F,
    clock: Arc<dyn Clock>,
}

impl Verifier<HttpFetcher> {
    /// Constructs a verifier that downloads certificates with `reqwest`.
    pub fn new(cfg: VerifierConfig) -> anyhow::Result<Self> {
        let fetcher = HttpFetcher::new(cfg.fetch_timeout)?;
        Self::with_fetcher(cfg, fetcher)
    }
}

impl<F: CertificateFetcher> Verifier<F> {
    /// Constructs a verifier with a caller-provided transport; trust anchors load eagerly.
    pub fn with_fetcher(cfg: VerifierConfig, fetcher: F) -> anyhow::Result<Self> {
        let roots = RootStore::load(&cfg)?;
        info!(
            bundle_id = %cfg.bundle_id,
            key_host = cfg.key_host(),
            anchors = roots.anchors.len(),
            intermediates = roots.intermediates.len(),
            "identity verifier ready"
        );
        Ok(Self {
            cfg,
            roots,
            cache: CertificateCache::new(),
            fetcher,
            clock: Arc::new(SystemClock),
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.cfg
    }

    pub fn cache(&self) -> &CertificateCache {
        &self.cache
    }

    /// Forgets every cached certificate; the next request re-fetches and re-validates.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Returns `true` only if the signature was issued by Apple for this bundle and is still fresh.
    ///
    /// The failure reason is logged, never returned.
    pub async fn verify(
        &self,
        player_id: &str,
        public_key_url: &str,
        timestamp_ms: u64,
        salt: &[u8],
        signature: &[u8],
    ) -> bool {
        let req = IdentityRequest {
            player_id: player_id.to_string(),
            public_key_url: public_key_url.to_string(),
            timestamp_ms,
            salt: salt.to_vec(),
            signature: signature.to_vec(),
        };
        self.verify_request(&req).await
    }

    pub async fn verify_request(&self, req: &IdentityRequest) -> bool {
        match self.try_verify(req).await {
            Ok(_) => true,
            Err(err) => {
                warn!(
                    kind = err.kind(),
                    error = %err,
                    player_id = ?req.player_id,
                    "identity verification failed"
                );
                false
            }
        }
    }

    /// Verifies a JSON identity payload forwarded by a game client.
    pub async fn verify_json(&self, json: &str) -> Result<VerifiedIdentity, IdentityError> {
        let payload: IdentityPayload =
            serde_json::from_str(json).map_err(|e| IdentityError::Decode(format!("json: {e}")))?;
        self.verify_payload(payload).await
    }

    pub async fn verify_payload(
        &self,
        payload: IdentityPayload,
    ) -> Result<VerifiedIdentity, IdentityError> {
        let req = payload.into_request()?;
        self.try_verify(&req).await
    }

    /// Runs validate → acquire → signature check and reports why a request failed.
    pub async fn try_verify(&self, req: &IdentityRequest) -> Result<VerifiedIdentity, IdentityError> {
        let now_ms = self.clock.now_millis();
        let cert_name = validate_request(&self.cfg, req, now_ms)?;
        let cert = self.acquire(&cert_name).await?;

        if !verify_identity_signature(
            &req.player_id,
            &self.cfg.bundle_id,
            req.timestamp_ms,
            &req.salt,
            &req.signature,
            &cert.rsa_public_key,
        ) {
            return Err(IdentityError::CryptoMismatch);
        }

        Ok(VerifiedIdentity {
            player_id: req.player_id.clone(),
            timestamp_ms: req.timestamp_ms,
            certificate_name: cert.name.clone(),
            leaf_fingerprint_sha256: cert.fingerprint_sha256.clone(),
        })
    }

    /// Returns the trusted certificate for `cert_name`, downloading and validating it on a miss.
    pub async fn acquire(&self, cert_name: &str) -> Result<Arc<TrustedCertificate>, IdentityError> {
        if let Some(cert) = self.cache.get(cert_name) {
            debug!(cert_name, "certificate cache hit");
            return Ok(cert);
        }
        debug!(cert_name, "certificate cache miss");

        let url = format!("https://{}/public-key/{}", self.cfg.key_host(), cert_name);
        let bytes = self.fetcher.fetch(&url).await?;

        let now_secs = (self.clock.now_millis() / 1000) as i64;
        let prefix = &self.cfg.expected_subject_prefix;
        let first = admit_certificate(cert_name, &bytes, &[], &self.roots, prefix, now_secs);
        let admitted = match first {
            Err(IdentityError::UntrustedCertificate(reason)) if !self.cfg.issuer_hosts.is_empty() => {
                let issuers = self.fetch_issuers(&bytes).await;
                if issuers.is_empty() {
                    return Err(IdentityError::UntrustedCertificate(reason));
                }
                debug!(cert_name, issuers = issuers.len(), "retrying chain with downloaded issuers");
                admit_certificate(cert_name, &bytes, &issuers, &self.roots, prefix, now_secs)?
            }
            other => other?,
        };
        let cert = Arc::new(admitted);

        info!(
            cert_name,
            subject = %cert.subject,
            fingerprint = %cert.fingerprint_sha256,
            "certificate admitted to cache"
        );
        self.cache.put(cert_name, cert.clone());
        Ok(cert)
    }

    /// Follows AIA `caIssuers` links upward from the downloaded certificate.
    ///
    /// Downloads go through the same fetcher, so redirects stay failures. A
    /// body that does not parse is skipped; trust is decided by `admit_certificate`.
    async fn fetch_issuers(&self, bytes: &[u8]) -> Vec<Vec<u8>> {
        let Ok((leaf_der, _)) = split_certificate_bytes(bytes) else {
            return Vec::new();
        };
        let mut pending = ca_issuer_urls(&leaf_der, &self.cfg.issuer_hosts);
        let mut visited: Vec<String> = Vec::new();
        let mut issuers = Vec::new();

        while let Some(url) = pending.pop() {
            if visited.contains(&url) {
                continue;
            }
            if visited.len() >= MAX_ISSUER_FETCHES {
                warn!(%url, "issuer download limit reached");
                break;
            }
            visited.push(url.clone());

            let body = match self.fetcher.fetch(&url).await {
                Ok(body) => body,
                Err(err) => {
                    warn!(%url, error = %err, "issuer download failed");
                    continue;
                }
            };
            match split_certificate_bytes(&body) {
                Ok((first, rest)) => {
                    pending.extend(ca_issuer_urls(&first, &self.cfg.issuer_hosts));
                    issuers.push(first);
                    issuers.extend(rest);
                }
                Err(err) => debug!(%url, error = %err, "issuer download is not a certificate"),
            }
        }
        issuers
    }
}
