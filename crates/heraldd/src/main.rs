//! Dispatch daemon entry point.
//!
//! Loads the configuration and the shared passcode secret (both fatal
//! on error), builds the configured transport and runs the dispatch
//! loop until Ctrl-C.

use std::path::PathBuf;
use std::sync::atomic::Ordering;

use clap::Parser;
use tracing::{info, warn};

use herald_core::{init_logging, Config, TransportMode};
use herald_credentials::CredentialManager;
use herald_dispatch::{DispatchConfig, DispatchLoop};
use herald_passcode::load_secret;
use herald_spool::Spool;
use herald_transport::{Deliver, Transport};

/// Herald dispatch daemon.
#[derive(Parser, Debug)]
#[command(name = "heraldd")]
#[command(about = "Mail dispatch daemon: drains the message spool through SMTP or a provider API")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(long, env = "HERALD_CONFIG", default_value = "/etc/herald/config.toml")]
    config: PathBuf,

    /// Path to the shared passcode secret file.
    #[arg(long, env = "HERALD_SECRET", default_value = "/etc/herald/secret")]
    secret: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level);

    info!("Herald daemon starting...");

    let config = Config::load(&args.config)?;

    // The daemon never checks passcodes itself, but a deployment with
    // a missing or garbled secret is broken and should die at boot,
    // not when the first batch arrives.
    load_secret(&args.secret)?;
    info!(path = %args.secret.display(), "Passcode secret verified");

    info!(
        sender = %config.mail.sender,
        spool = %config.spool.dir.display(),
        tick_secs = config.dispatch.tick_secs,
        retry_delay_mins = config.dispatch.retry_delay_mins,
        "Configuration loaded"
    );

    let spool = Spool::new(
        config.spool.dir.clone(),
        config.spool.dead_letter_dir.clone(),
    );

    let credentials = if config.mail.mode == TransportMode::Api {
        config
            .api
            .as_ref()
            .map(|api| CredentialManager::new(api.token_path.clone()))
    } else {
        None
    };

    if let Some(manager) = &credentials {
        if let Err(e) = manager.ensure_fresh().await {
            warn!(
                error = %e,
                "Credential refresh failed at startup; will retry on the refresh interval"
            );
        }
    }

    let token = credentials
        .as_ref()
        .map(|manager| manager.token_handle())
        .unwrap_or_default();
    let transport = Transport::from_config(&config, token)?;
    info!(transport = %transport.kind(), "Transport ready");

    let dispatch = DispatchLoop::new(
        spool,
        transport,
        credentials,
        DispatchConfig::from(&config.dispatch),
    );
    let running = dispatch.running_flag();
    let loop_task = tokio::spawn(dispatch.run());

    tokio::signal::ctrl_c().await?;
    info!("Received shutdown signal, stopping dispatch loop...");
    running.store(false, Ordering::SeqCst);
    loop_task.await?;

    Ok(())
}
