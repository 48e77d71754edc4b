//! Edit-lock command line client.
//!
//! `watch` holds the edit lock on one change form until the process is
//! interrupted, then releases it. `force-unlock` removes another user's
//! lock after confirmation.

use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{info, warn};

use edit_lock::badge::{ForceUnlock, LOCKED_CLASS, LockBadge, remove_foreign_lock};
use edit_lock::client::LockClient;
use edit_lock::config::{Args, Command, ConnectionArgs, ForceUnlockArgs, LockConfig, WatchArgs};
use edit_lock::endpoints::{Endpoints, LockAction};
use edit_lock::error::LockError;
use edit_lock::form::{Field, FormControls};
use edit_lock::logging;
use edit_lock::session::DEFAULT_POLL_INTERVAL;
use edit_lock::surface::TerminalSurface;
use edit_lock::transport::HttpTransport;

/// Runs the selected subcommand.
#[tokio::main]
async fn main() -> Result<(), LockError> {
    logging::init_logging();

    let args = Args::parse();
    match args.command {
        Command::Watch(ref watch) => run_watch(&args.connection, watch).await,
        Command::ForceUnlock(ref unlock) => run_force_unlock(&args.connection, unlock).await,
    }
}

async fn run_watch(connection: &ConnectionArgs, watch: &WatchArgs) -> Result<(), LockError> {
    let poll_interval = Duration::from_secs(watch.poll_interval_secs);
    let transport = Arc::new(HttpTransport::new(
        connection.base_url.as_deref(),
        &connection.credentials(),
        poll_interval,
    )?);
    let config = load_config(connection, transport.as_ref()).await?;
    let endpoints = config.urls.clone().merge(watch.endpoints());
    let timing = config.timing(poll_interval)?;

    let mut fields = Vec::with_capacity(watch.fields.len());
    for spec in &watch.fields {
        let field = Field::parse(spec)
            .ok_or_else(|| LockError::Config(format!("invalid field: {spec:?}")))?;
        fields.push(field);
    }
    let surface = Arc::new(TerminalSurface::new(FormControls::new(fields), connection.yes));

    let client = LockClient::new(transport, surface, endpoints, timing);
    info!(
        client_id = %client.id(),
        lock_url = client.endpoints().get(LockAction::Lock).unwrap_or("-"),
        "watching edit lock"
    );
    client.start().await;

    shutdown_signal().await;

    match client.release_on_unload().await {
        Ok(true) => {}
        Ok(false) => info!("no lock held; nothing to release"),
        Err(err) => warn!(error = %err, "failed to release lock"),
    }
    Ok(())
}

async fn run_force_unlock(
    connection: &ConnectionArgs,
    unlock: &ForceUnlockArgs,
) -> Result<(), LockError> {
    let transport = HttpTransport::new(
        connection.base_url.as_deref(),
        &connection.credentials(),
        DEFAULT_POLL_INTERVAL,
    )?;
    let config = load_config(connection, &transport).await?;
    let endpoints = config.urls.clone().merge(Endpoints {
        lock_remove: unlock.remove_url.clone(),
        ..Endpoints::default()
    });
    let surface = TerminalSurface::new(FormControls::default(), connection.yes);
    let mut badge = LockBadge::from_attributes([
        ("class", LOCKED_CLASS),
        ("data-lock-id", unlock.lock_id.as_str()),
        ("data-locked-by", unlock.locked_by.as_str()),
    ]);

    match remove_foreign_lock(&transport, &surface, &endpoints, &mut badge).await? {
        ForceUnlock::Removed => info!(lock_id = %badge.lock_id, "lock removed"),
        ForceUnlock::Declined => info!("lock left in place"),
        ForceUnlock::NotLocked => info!(lock_id = %badge.lock_id, "object is not locked"),
        ForceUnlock::NoEndpoint => {
            return Err(LockError::Config(
                "no lock_remove url configured; pass --remove-url".into(),
            ));
        }
    }
    Ok(())
}

async fn load_config(
    connection: &ConnectionArgs,
    transport: &HttpTransport,
) -> Result<LockConfig, LockError> {
    if let Some(path) = &connection.config {
        return LockConfig::load(Path::new(path)).await;
    }
    if let Some(url) = &connection.config_url {
        return LockConfig::fetch(transport, url).await;
    }
    Ok(LockConfig::default())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Received termination signal, releasing lock");
}
