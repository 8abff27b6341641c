use thiserror::Error;

#[derive(Debug, Error)]
/// Reasons a Game Center identity signature is rejected.
///
/// Callers of [`Verifier::verify`](super::Verifier::verify) only ever see a
/// boolean; the variants exist for logging and for [`Verifier::try_verify`](super::Verifier::try_verify).
pub enum IdentityError {
    #[error("malformed input: {0}")]
    MalformedInput(String),
    #[error("certificate acquisition failed: {0}")]
    AcquisitionFailed(String),
    #[error("invalid certificate format: {0}")]
    InvalidCertificateFormat(String),
    #[error("untrusted certificate: {0}")]
    UntrustedCertificate(String),
    #[error("certificate subject '{0}' is not the expected issuer")]
    WrongIssuer(String),
    #[error("signature does not match payload")]
    CryptoMismatch,
    #[error("decode error: {0}")]
    Decode(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl IdentityError {
    /// Short stable label used as a structured logging field.
    pub fn kind(&self) -> &'static str {
        match self {
            IdentityError::MalformedInput(_) => "malformed_input",
            IdentityError::AcquisitionFailed(_) => "acquisition_failed",
            IdentityError::InvalidCertificateFormat(_) => "invalid_certificate_format",
            IdentityError::UntrustedCertificate(_) => "untrusted_certificate",
            IdentityError::WrongIssuer(_) => "wrong_issuer",
            IdentityError::CryptoMismatch => "crypto_mismatch",
            IdentityError::Decode(_) => "decode",
            IdentityError::Internal(_) => "internal",
        }
    }
}
