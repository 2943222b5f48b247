//! Operator CLI for the dispatch engine.
//!
//! Calling-side counterpart of the passcode gate: generates shared
//! secrets, prints the current passcode and submits batch requests to a
//! running server. Built to slot into CI jobs, so all user-facing
//! output goes to stdout.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::debug;

use herald_core::init_logging;
use herald_passcode::{generate, generate_secret, load_secret};

/// Herald operator CLI.
#[derive(Parser)]
#[command(name = "herald")]
#[command(about = "Operator CLI for the Herald mail dispatch engine")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a fresh shared secret and write it to a file
    Secret {
        /// Output path for the secret file
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Print the current 6-digit passcode for a secret
    Code {
        /// Path to the secret file
        #[arg(short, long, env = "HERALD_SECRET")]
        secret: PathBuf,
    },

    /// Submit a batch send request to a running server
    Schedule {
        /// Path to the secret file
        #[arg(short, long, env = "HERALD_SECRET")]
        secret: PathBuf,

        /// Base address of the server
        #[arg(short, long)]
        address: String,

        /// Path to the template payload file
        #[arg(short, long)]
        payload: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level);

    match cli.command {
        Commands::Secret { out } => write_secret(&out),
        Commands::Code { secret } => print_code(&secret),
        Commands::Schedule {
            secret,
            address,
            payload,
        } => request_schedule(&secret, &address, &payload).await,
    }
}

/// Generate a secret and write it out, refusing to clobber one that is
/// already provisioned.
fn write_secret(out: &Path) -> anyhow::Result<()> {
    if out.exists() {
        anyhow::bail!(
            "refusing to overwrite existing secret at {}",
            out.display()
        );
    }

    let secret = generate_secret();
    fs::write(out, &secret)
        .with_context(|| format!("failed to write secret to {}", out.display()))?;

    println!("Secret written to {}", out.display());
    Ok(())
}

fn print_code(secret_path: &Path) -> anyhow::Result<()> {
    let secret = load_secret(secret_path)?;
    let code = generate(&secret)?;
    println!("{code}");
    Ok(())
}

/// Compute the current passcode and POST the payload to the server's
/// scheduling endpoint as a multipart form.
async fn request_schedule(
    secret_path: &Path,
    address: &str,
    payload: &Path,
) -> anyhow::Result<()> {
    let secret = load_secret(secret_path)?;
    let passcode = generate(&secret)?;

    let template = fs::read(payload)
        .with_context(|| format!("failed to read payload {}", payload.display()))?;

    let endpoint = schedule_endpoint(address);
    debug!(endpoint = %endpoint, bytes = template.len(), "Submitting batch request");

    let form = reqwest::multipart::Form::new()
        .text("password", passcode)
        .part("template_data", reqwest::multipart::Part::bytes(template));

    let response = reqwest::Client::new()
        .post(&endpoint)
        .multipart(form)
        .send()
        .await
        .with_context(|| format!("request to {endpoint} failed"))?;

    if response.status() == reqwest::StatusCode::OK {
        println!("Emails sent successfully");
    } else {
        println!(
            "Unable to send the emails. HTTP status: {}",
            response.status().as_u16()
        );
    }
    Ok(())
}

/// Normalize an address so it ends in `/schedule` exactly once,
/// whatever mix of trailing slashes and route the operator pasted in.
fn schedule_endpoint(address: &str) -> String {
    let base = address
        .trim_end_matches('/')
        .trim_end_matches("/schedule")
        .trim_end_matches('/');
    format!("{base}/schedule")
}

#[cfg(test)]
mod tests {
    use super::*;

    use herald_passcode::decode_secret;

    #[test]
    fn test_schedule_endpoint_appends_route() {
        assert_eq!(
            schedule_endpoint("http://mail.example.org"),
            "http://mail.example.org/schedule"
        );
    }

    #[test]
    fn test_schedule_endpoint_keeps_existing_route() {
        assert_eq!(
            schedule_endpoint("http://mail.example.org/schedule"),
            "http://mail.example.org/schedule"
        );
        assert_eq!(
            schedule_endpoint("http://mail.example.org/schedule/"),
            "http://mail.example.org/schedule"
        );
    }

    #[test]
    fn test_schedule_endpoint_strips_trailing_slash() {
        assert_eq!(
            schedule_endpoint("http://mail.example.org/"),
            "http://mail.example.org/schedule"
        );
    }

    #[test]
    fn test_write_secret_produces_usable_secret() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secret");

        write_secret(&path).unwrap();

        let secret = load_secret(&path).unwrap();
        assert!(decode_secret(&secret).is_ok());
        assert_eq!(generate(&secret).unwrap().len(), 6);
    }

    #[test]
    fn test_write_secret_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secret");
        fs::write(&path, "KEEP").unwrap();

        let err = write_secret(&path).unwrap_err();
        assert!(err.to_string().contains("refusing to overwrite"));
        assert_eq!(fs::read_to_string(&path).unwrap(), "KEEP");
    }
}
