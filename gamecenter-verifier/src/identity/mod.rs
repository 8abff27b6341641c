pub mod cache;
pub mod config;
pub mod errors;
pub mod fetch;
pub mod types;
pub mod verifier;

mod certs;
mod request;
mod signature;
mod util;

pub use cache::CertificateCache;
pub use certs::TrustedCertificate;
pub use config::{Environment, VerifierConfig};
pub use errors::IdentityError;
pub use fetch::{CertificateFetcher, HttpFetcher};
pub use request::certificate_name_from_url;
pub use signature::{signed_payload, verify_identity_signature};
pub use types::{IdentityPayload, IdentityRequest, VerifiedIdentity};
pub use util::{Clock, SystemClock};
pub use verifier::Verifier;
