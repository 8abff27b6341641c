use url::Url;

use crate::identity::config::VerifierConfig;
use crate::identity::errors::IdentityError;
use crate::identity::types::IdentityRequest;

/// Byte lengths of RSA-1024/2048/4096/8192 signatures.
const SIGNATURE_LENGTHS: [usize; 4] = [128, 256, 512, 1024];
const MAX_SALT_LEN: usize = 128;
const MAX_PLAYER_ID_CHARS: usize = 64;
const PLAYER_ID_PREFIXES: [&str; 3] = ["A:", "T:", "G:"];
const KEY_PATH_PREFIX: &str = "/public-key/gc-";
const KEY_PATH_SUFFIX: &str = ".cer";

fn malformed(reason: impl Into<String>) -> IdentityError {
    IdentityError::MalformedInput(reason.into())
}

/// Structural and bounds checks run before any network or crypto work.
///
/// Returns the certificate file name taken from the last segment of the key URL.
pub fn validate_request(
    cfg: &VerifierConfig,
    req: &IdentityRequest,
    now_ms: u64,
) -> Result<String, IdentityError> {
    if req.timestamp_ms.saturating_add(cfg.expiry_window_ms()) < now_ms {
        return Err(malformed("signature timestamp expired"));
    }
    if let Some(skew) = cfg.max_future_skew {
        let skew_ms = u64::try_from(skew.as_millis()).unwrap_or(u64::MAX);
        if req.timestamp_ms > now_ms.saturating_add(skew_ms) {
            return Err(malformed("signature timestamp too far in the future"));
        }
    }

    if !SIGNATURE_LENGTHS.contains(&req.signature.len()) {
        return Err(malformed(format!(
            "unexpected signature length {}",
            req.signature.len()
        )));
    }
    if req.salt.len() > MAX_SALT_LEN {
        return Err(malformed(format!("salt too long ({} bytes)", req.salt.len())));
    }

    validate_player_id(&req.player_id)?;
    certificate_name_from_url(&req.public_key_url, cfg.key_host())
}

fn validate_player_id(player_id: &str) -> Result<(), IdentityError> {
    if player_id.chars().count() > MAX_PLAYER_ID_CHARS {
        return Err(malformed("player id too long"));
    }
    if !PLAYER_ID_PREFIXES
        .iter()
        .any(|prefix| player_id.starts_with(prefix))
    {
        return Err(malformed("player id has unknown scheme prefix"));
    }
    Ok(())
}

/// Parses the lower-cased key URL and pins it to `key_host` and the `/public-key/gc-*.cer` path.
pub fn certificate_name_from_url(raw: &str, key_host: &str) -> Result<String, IdentityError> {
    let lowered = raw.to_lowercase();
    let url = Url::parse(&lowered).map_err(|e| malformed(format!("public key url: {e}")))?;

    if url.host_str() != Some(key_host) {
        return Err(malformed(format!(
            "public key url host {:?} is not {key_host}",
            url.host_str()
        )));
    }

    let path = url.path();
    if !(path.starts_with(KEY_PATH_PREFIX) && path.ends_with(KEY_PATH_SUFFIX)) {
        return Err(malformed(format!("public key url path {path} not allowed")));
    }

    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .ok_or_else(|| malformed("public key url has no file name"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::config::Environment;

    const NOW: u64 = 1_700_000_000_000;
    const URL: &str = "https://static.gc.apple.com/public-key/gc-prod-9.cer";

    fn request() -> IdentityRequest {
        IdentityRequest {
            player_id: "T:abc123".into(),
            public_key_url: URL.into(),
            timestamp_ms: NOW,
            salt: vec![1, 2],
            signature: vec![0; 256],
        }
    }

    fn cfg() -> VerifierConfig {
        VerifierConfig::new("com.example.app")
    }

    #[test]
    fn accepts_well_formed_request() {
        assert_eq!(validate_request(&cfg(), &request(), NOW).unwrap(), "gc-prod-9.cer");
    }

    #[test]
    fn expiry_boundary_is_inclusive() {
        let req = request();
        assert!(validate_request(&cfg(), &req, NOW + 120_000).is_ok());
        assert!(validate_request(&cfg(), &req, NOW + 120_001).is_err());
    }

    #[test]
    fn future_timestamps_pass_unless_bounded() {
        let mut req = request();
        req.timestamp_ms = NOW + 86_400_000;
        assert!(validate_request(&cfg(), &req, NOW).is_ok());

        let mut bounded = cfg();
        bounded.max_future_skew = Some(std::time::Duration::from_secs(60));
        assert!(validate_request(&bounded, &req, NOW).is_err());
    }

    #[test]
    fn signature_length_must_match_rsa_modulus() {
        for len in [0usize, 64, 127, 129, 255, 257, 2048] {
            let mut req = request();
            req.signature = vec![0; len];
            assert!(validate_request(&cfg(), &req, NOW).is_err(), "len {len}");
        }
        for len in SIGNATURE_LENGTHS {
            let mut req = request();
            req.signature = vec![0; len];
            assert!(validate_request(&cfg(), &req, NOW).is_ok(), "len {len}");
        }
    }

    #[test]
    fn salt_is_bounded() {
        let mut req = request();
        req.salt = vec![0; 128];
        assert!(validate_request(&cfg(), &req, NOW).is_ok());
        req.salt = vec![0; 129];
        assert!(validate_request(&cfg(), &req, NOW).is_err());
    }

    #[test]
    fn player_id_prefix_and_length() {
        for id in ["A:1", "T:1", "G:1"] {
            assert!(validate_player_id(id).is_ok());
        }
        for id in ["", "X:1", "a:1", "T1", ":T:1"] {
            assert!(validate_player_id(id).is_err(), "{id}");
        }
        let at_limit = format!("T:{}", "x".repeat(62));
        assert!(validate_player_id(&at_limit).is_ok());
        let over = format!("T:{}", "x".repeat(63));
        assert!(validate_player_id(&over).is_err());
    }

    #[test]
    fn url_host_and_path_are_pinned() {
        let host = Environment::Production.key_host();
        assert_eq!(
            certificate_name_from_url("HTTPS://STATIC.GC.APPLE.COM/PUBLIC-KEY/GC-PROD-9.CER", host)
                .unwrap(),
            "gc-prod-9.cer"
        );
        for bad in [
            "not a url",
            "/public-key/gc-prod-9.cer",
            "https://static.gc.apple.com.evil.com/public-key/gc-prod-9.cer",
            "https://evil.com/public-key/gc-prod-9.cer",
            "https://static.gc.apple.com@evil.com/public-key/gc-prod-9.cer",
            "https://static.gc.apple.com/public-key/prod-9.cer",
            "https://static.gc.apple.com/other/gc-prod-9.cer",
            "https://static.gc.apple.com/public-key/gc-prod-9.pem",
            "https://sandbox.gc.apple.com/public-key/gc-sb-2.cer",
        ] {
            assert!(certificate_name_from_url(bad, host).is_err(), "{bad}");
        }
    }

    #[test]
    fn sandbox_host_accepted_in_sandbox() {
        let host = Environment::Sandbox.key_host();
        assert_eq!(
            certificate_name_from_url("https://sandbox.gc.apple.com/public-key/gc-sb-2.cer", host)
                .unwrap(),
            "gc-sb-2.cer"
        );
    }
}
