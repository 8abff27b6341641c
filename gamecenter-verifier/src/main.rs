use gc_verifier::identity::{IdentityError, Verifier};
use std::io::Read;
use std::{env, fs, process::ExitCode};

mod logging;
mod settings;

type CliResult<T> = Result<T, anyhow::Error>;

/// CLI entrypoint: loads configuration, reads an identity payload, and prints the verdict.
#[tokio::main]
async fn main() -> CliResult<ExitCode> {
    let settings = settings::Settings::from_env()?;
    logging::setup_logging(&settings);
    settings.info();

    let verifier = Verifier::new(settings.verifier_config())?;
    let payload = read_payload()?;

    match verifier.verify_json(&payload).await {
        Ok(result) => {
            println!("✅ Identity verified:");
            println!("  player_id      : {}", result.player_id);
            println!("  timestamp_ms   : {}", result.timestamp_ms);
            println!("  certificate    : {}", result.certificate_name);
            println!("  leaf SHA256    : {}", result.leaf_fingerprint_sha256);
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            eprintln!("❌ {}", format_identity_error(&err));
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Reads the JSON payload from the path given as first argument, or stdin.
fn read_payload() -> CliResult<String> {
    match env::args().nth(1).filter(|arg| arg != "-") {
        Some(path) => {
            fs::read_to_string(&path).map_err(|e| anyhow::anyhow!(format!("read {path}: {e}")))
        }
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
    }
}

/// Human-friendly rendering of `IdentityError` variants for CLI output.
fn format_identity_error(err: &IdentityError) -> String {
    match err {
        IdentityError::MalformedInput(reason) => format!("request rejected: {reason}"),
        IdentityError::AcquisitionFailed(reason) => {
            format!("could not download public key certificate: {reason}")
        }
        IdentityError::InvalidCertificateFormat(reason) => {
            format!("public key certificate unreadable: {reason}")
        }
        IdentityError::UntrustedCertificate(reason) => {
            format!("public key certificate not trusted: {reason}")
        }
        IdentityError::WrongIssuer(subject) => {
            format!("public key certificate issued to unexpected subject {subject}")
        }
        IdentityError::CryptoMismatch => "signature does not match".into(),
        IdentityError::Decode(reason) => format!("decode error: {reason}"),
        IdentityError::Internal(reason) => format!("internal error: {reason}"),
    }
}
