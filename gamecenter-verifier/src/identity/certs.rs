use crate::identity::config::VerifierConfig;
use crate::identity::errors::IdentityError;
use crate::identity::util::sha256_fingerprint;
use anyhow::{anyhow, Context};
use ring::signature::{self, UnparsedPublicKey};
use rustls_pemfile as pemfile;
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, warn};
use url::Url;
use x509_parser::prelude::*;

const RSA_ENCRYPTION_OID: &str = "1.2.840.113549.1.1.1";
const CA_ISSUERS_OID: &str = "1.3.6.1.5.5.7.48.2";
const MAX_CHAIN_DEPTH: usize = 8;

/// A certificate that passed chain and issuer validation.
#[derive(Debug, Clone)]
pub struct TrustedCertificate {
    pub name: String,
    /// Subject rendered in RFC 2253 order.
    pub subject: String,
    pub fingerprint_sha256: String,
    /// PKCS#1 `RSAPublicKey` DER.
    pub rsa_public_key: Vec<u8>,
}

/// A trust anchor reduced to what chain validation needs.
pub struct TrustAnchor {
    pub subject_raw: Vec<u8>,
    pub subject_display: String,
    pub public_key: Vec<u8>,
}

/// Trust anchors plus the intermediates available for building chains.
pub struct RootStore {
    pub anchors: Vec<TrustAnchor>,
    pub intermediates: Vec<Vec<u8>>,
}

impl RootStore {
    /// Loads the OS trust store (if enabled), extra PEM roots, and PEM intermediates.
    pub fn load(cfg: &VerifierConfig) -> anyhow::Result<Self> {
        let mut anchors = Vec::new();

        if cfg.use_native_roots {
            let native = rustls_native_certs::load_native_certs();
            for err in &native.errors {
                warn!(error = %err, "error while loading native root certificates");
            }
            let mut skipped = 0usize;
            for der in &native.certs {
                match anchor_from_der(der.as_ref()) {
                    Ok(anchor) => anchors.push(anchor),
                    Err(_) => skipped += 1,
                }
            }
            debug!(loaded = anchors.len(), skipped, "native trust anchors");
        }

        for path in &cfg.extra_root_pem_paths {
            for der in read_pem_certs(path)? {
                let anchor = anchor_from_der(&der)
                    .map_err(|e| anyhow!("parse root certificate {:?}: {e}", path))?;
                anchors.push(anchor);
            }
        }

        anyhow::ensure!(!anchors.is_empty(), "no trust anchors loaded");

        let mut intermediates = Vec::new();
        for path in &cfg.intermediate_pem_paths {
            intermediates.extend(read_pem_certs(path)?);
        }

        Ok(Self {
            anchors,
            intermediates,
        })
    }
}

fn read_pem_certs(path: &Path) -> anyhow::Result<Vec<Vec<u8>>> {
    let bytes = std::fs::read(path).with_context(|| format!("read {:?}", path))?;
    let mut cursor = Cursor::new(&bytes);
    let certs = pemfile::certs(&mut cursor)
        .map(|res| res.map(|der| der.as_ref().to_vec()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| anyhow!("parse PEM in {:?}: {e:?}", path))?;
    anyhow::ensure!(!certs.is_empty(), "no certificates in {:?}", path);
    Ok(certs)
}

fn anchor_from_der(der: &[u8]) -> Result<TrustAnchor, String> {
    let (_, cert) = parse_x509_certificate(der).map_err(|e| e.to_string())?;
    Ok(TrustAnchor {
        subject_raw: cert.subject().as_raw().to_vec(),
        subject_display: format!("{}", cert.subject()),
        public_key: cert
            .tbs_certificate
            .subject_pki
            .subject_public_key
            .data
            .to_vec(),
    })
}

/// Runs the fixed parse → chain → issuer pipeline over downloaded certificate bytes.
///
/// `fetched_issuers` are DER intermediates downloaded for this certificate; like
/// the configured pool they only count once a signature path reaches an anchor.
pub fn admit_certificate(
    name: &str,
    bytes: &[u8],
    fetched_issuers: &[Vec<u8>],
    store: &RootStore,
    expected_subject_prefix: &str,
    now_secs: i64,
) -> Result<TrustedCertificate, IdentityError> {
    let (leaf_der, mut bundled) = split_certificate_bytes(bytes)?;
    bundled.extend_from_slice(fetched_issuers);
    let (_, leaf) = parse_x509_certificate(&leaf_der)
        .map_err(|e| IdentityError::InvalidCertificateFormat(format!("parse {name}: {e}")))?;

    verify_chain(&leaf, &bundled, store, now_secs)?;

    let subject = rfc2253_subject(leaf.subject());
    if !subject.starts_with(expected_subject_prefix) {
        return Err(IdentityError::WrongIssuer(subject));
    }

    let rsa_public_key = rsa_public_key(&leaf)?;

    Ok(TrustedCertificate {
        name: name.to_string(),
        subject,
        fingerprint_sha256: sha256_fingerprint(&leaf_der),
        rsa_public_key,
    })
}

/// Accepts a single DER certificate or a PEM bundle (leaf first, then intermediates).
pub(crate) fn split_certificate_bytes(bytes: &[u8]) -> Result<(Vec<u8>, Vec<Vec<u8>>), IdentityError> {
    if bytes.starts_with(b"-----BEGIN") {
        let mut cursor = Cursor::new(bytes);
        let mut certs = pemfile::certs(&mut cursor)
            .map(|res| res.map(|der| der.as_ref().to_vec()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| IdentityError::InvalidCertificateFormat(format!("PEM: {e}")))?;
        if certs.is_empty() {
            return Err(IdentityError::InvalidCertificateFormat(
                "PEM contains no certificate".into(),
            ));
        }
        let leaf = certs.remove(0);
        return Ok((leaf, certs));
    }

    let (rest, _) = parse_x509_certificate(bytes)
        .map_err(|e| IdentityError::InvalidCertificateFormat(format!("DER: {e}")))?;
    if !rest.is_empty() {
        return Err(IdentityError::InvalidCertificateFormat(format!(
            "{} trailing bytes after certificate",
            rest.len()
        )));
    }
    Ok((bytes.to_vec(), Vec::new()))
}

/// `caIssuers` URLs from the certificate's AIA extension that point at an allowed host.
pub(crate) fn ca_issuer_urls(der: &[u8], allowed_hosts: &[String]) -> Vec<String> {
    let Ok((_, cert)) = parse_x509_certificate(der) else {
        return Vec::new();
    };
    let mut urls = Vec::new();
    for ext in cert.extensions() {
        let ParsedExtension::AuthorityInfoAccess(aia) = ext.parsed_extension() else {
            continue;
        };
        for desc in &aia.accessdescs {
            if desc.access_method.to_string() != CA_ISSUERS_OID {
                continue;
            }
            if let GeneralName::URI(uri) = &desc.access_location {
                if issuer_host_allowed(uri, allowed_hosts) {
                    urls.push(uri.to_string());
                } else {
                    debug!(url = %uri, "caIssuers host not allowed");
                }
            }
        }
    }
    urls
}

fn issuer_host_allowed(raw: &str, allowed_hosts: &[String]) -> bool {
    let Ok(url) = Url::parse(raw) else {
        return false;
    };
    matches!(url.scheme(), "http" | "https")
        && url
            .host_str()
            .is_some_and(|host| allowed_hosts.iter().any(|h| h.eq_ignore_ascii_case(host)))
}

/// Builds a path from `leaf` to a trust anchor, checking validity, CA constraints, and signatures.
fn verify_chain(
    leaf: &X509Certificate<'_>,
    bundled: &[Vec<u8>],
    store: &RootStore,
    now: i64,
) -> Result<(), IdentityError> {
    ensure_validity(leaf, now, "leaf")?;
    ensure_basic_constraints(leaf, false)?;

    let candidates: Vec<X509Certificate<'_>> = bundled
        .iter()
        .chain(store.intermediates.iter())
        .filter_map(|der| parse_x509_certificate(der).ok().map(|(_, cert)| cert))
        .collect();

    let mut current = leaf;
    for depth in 0..MAX_CHAIN_DEPTH {
        let issuer_raw = current.issuer().as_raw();

        if let Some(anchor) = store
            .anchors
            .iter()
            .filter(|anchor| anchor.subject_raw.as_slice() == issuer_raw)
            .find(|anchor| verify_signed_by(current, &anchor.public_key).is_ok())
        {
            debug!(root = %anchor.subject_display, depth, "chain reached trust anchor");
            return Ok(());
        }

        let parent = candidates
            .iter()
            .filter(|cand| cand.subject().as_raw() == issuer_raw)
            .find(|cand| {
                let key = &cand.tbs_certificate.subject_pki.subject_public_key.data;
                verify_signed_by(current, key).is_ok()
            })
            .ok_or_else(|| {
                IdentityError::UntrustedCertificate(format!(
                    "no trusted issuer for '{}'",
                    current.subject()
                ))
            })?;

        ensure_validity(parent, now, "intermediate")?;
        ensure_basic_constraints(parent, true)?;
        current = parent;
    }

    Err(IdentityError::UntrustedCertificate(
        "certificate chain too long".into(),
    ))
}

fn verify_signed_by(cert: &X509Certificate<'_>, issuer_key: &[u8]) -> Result<(), IdentityError> {
    let alg = map_signature_oid(&cert.signature_algorithm.algorithm)
        .map_err(IdentityError::UntrustedCertificate)?;
    UnparsedPublicKey::new(alg, issuer_key)
        .verify(
            cert.tbs_certificate.as_ref(),
            cert.signature_value.data.as_ref(),
        )
        .map_err(|_| IdentityError::UntrustedCertificate("certificate signature invalid".into()))
}

fn ensure_validity(cert: &X509Certificate<'_>, now: i64, label: &str) -> Result<(), IdentityError> {
    let not_before = cert.validity().not_before.timestamp();
    let not_after = cert.validity().not_after.timestamp();
    if now < not_before || now > not_after {
        return Err(IdentityError::UntrustedCertificate(format!(
            "{label} certificate not valid at current time (nb={not_before} na={not_after} now={now})"
        )));
    }
    Ok(())
}

fn ensure_basic_constraints(cert: &X509Certificate<'_>, expect_ca: bool) -> Result<(), IdentityError> {
    let untrusted = IdentityError::UntrustedCertificate;
    let bc = cert
        .basic_constraints()
        .map_err(|e| untrusted(format!("basicConstraints parse error: {e}")))?;
    if expect_ca {
        let bc = bc.ok_or_else(|| untrusted("missing basicConstraints on CA".into()))?;
        if !bc.value.ca {
            return Err(untrusted(
                "issuer missing CA=true in basicConstraints".into(),
            ));
        }
    } else if let Some(bc) = bc {
        if bc.value.ca {
            return Err(untrusted("leaf certificate unexpectedly marked as CA".into()));
        }
    }

    let ku = cert
        .key_usage()
        .map_err(|e| untrusted(format!("keyUsage parse error: {e}")))?;
    if expect_ca {
        if let Some(ku) = ku {
            if !ku.value.key_cert_sign() {
                return Err(untrusted("CA certificate missing keyCertSign usage".into()));
            }
        }
    } else if let Some(ku) = ku {
        if !ku.value.digital_signature() {
            return Err(untrusted("leaf certificate lacks digitalSignature usage".into()));
        }
    }

    Ok(())
}

fn map_signature_oid(
    oid: &x509_parser::der_parser::oid::Oid<'_>,
) -> Result<&'static dyn signature::VerificationAlgorithm, String> {
    let oid_str = oid.to_string();
    let alg: &'static dyn signature::VerificationAlgorithm = match oid_str.as_str() {
        "1.2.840.10045.4.3.2" => &signature::ECDSA_P256_SHA256_ASN1,
        "1.2.840.10045.4.3.3" => &signature::ECDSA_P384_SHA384_ASN1,
        "1.2.840.113549.1.1.5" => &signature::RSA_PKCS1_2048_8192_SHA1_FOR_LEGACY_USE_ONLY,
        "1.2.840.113549.1.1.11" => &signature::RSA_PKCS1_2048_8192_SHA256,
        "1.2.840.113549.1.1.12" => &signature::RSA_PKCS1_2048_8192_SHA384,
        "1.2.840.113549.1.1.13" => &signature::RSA_PKCS1_2048_8192_SHA512,
        other => {
            return Err(format!(
                "unsupported certificate signature algorithm OID {other}"
            ))
        }
    };
    Ok(alg)
}

fn rsa_public_key(cert: &X509Certificate<'_>) -> Result<Vec<u8>, IdentityError> {
    let spki = &cert.tbs_certificate.subject_pki;
    let key_oid = spki.algorithm.algorithm.to_string();
    if key_oid != RSA_ENCRYPTION_OID {
        return Err(IdentityError::Internal(format!(
            "certificate key algorithm {key_oid} is not RSA"
        )));
    }
    Ok(spki.subject_public_key.data.to_vec())
}

/// Renders a distinguished name like RFC 2253: most specific RDN first, comma separated.
pub fn rfc2253_subject(name: &X509Name<'_>) -> String {
    let rdns: Vec<&RelativeDistinguishedName<'_>> = name.iter().collect();
    rdns.iter()
        .rev()
        .map(|rdn| {
            rdn.iter()
                .map(|attr| {
                    let value = attr
                        .as_str()
                        .map(escape_rfc2253)
                        .unwrap_or_else(|_| format!("#{}", hex::encode(attr.attr_value().data)));
                    format!("{}={}", attribute_short_name(attr.attr_type()), value)
                })
                .collect::<Vec<_>>()
                .join("+")
        })
        .collect::<Vec<_>>()
        .join(",")
}

fn attribute_short_name(oid: &x509_parser::der_parser::oid::Oid<'_>) -> String {
    let dotted = oid.to_string();
    let short = match dotted.as_str() {
        "2.5.4.3" => "CN",
        "2.5.4.6" => "C",
        "2.5.4.7" => "L",
        "2.5.4.8" => "ST",
        "2.5.4.9" => "STREET",
        "2.5.4.10" => "O",
        "2.5.4.11" => "OU",
        "0.9.2342.19200300.100.1.25" => "DC",
        "0.9.2342.19200300.100.1.1" => "UID",
        _ => return dotted,
    };
    short.to_string()
}

fn escape_rfc2253(value: &str) -> String {
    let last = value.chars().count().saturating_sub(1);
    let mut out = String::with_capacity(value.len());
    for (idx, ch) in value.chars().enumerate() {
        let leading = idx == 0 && (ch == ' ' || ch == '#');
        let trailing = idx == last && ch == ' ';
        if leading || trailing || matches!(ch, ',' | '+' | '"' | '\\' | '<' | '>' | ';') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}
