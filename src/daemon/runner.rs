//! Daemon runner: startup sequence and update dispatch loop.
//!
//! Startup is authorize, load contacts, subscribe. Any failure there is fatal.
//! Shutdown during startup ends the run cleanly before the next step.
//! After that every update is handled on its own task, so a slow send never
//! holds up the next update. Send failures are counted and the loop keeps
//! going.
//!
//! CHANGELOG:
//! - 10/16/2026 - Initial implementation
//! - 10/16/2026 - Startup steps abort on shutdown

use anyhow::{anyhow, Context, Result};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info};

use crate::config::Config;
use crate::contacts::ContactRegistry;
use crate::daemon::engine::{AutoResponder, Outcome};
use crate::daemon::ledger::ResponseLedger;
use crate::daemon::shutdown::Shutdown;
use crate::gateway::{Gateway, GatewayError, Update};

/// Counters reported when the dispatcher stops.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunStats {
    pub updates: u64,
    pub replied: u64,
    pub dropped: u64,
    pub failed: u64,
}

impl RunStats {
    fn absorb(&mut self, joined: Result<Result<Outcome, GatewayError>, JoinError>) {
        match joined {
            Ok(Ok(Outcome::Replied { .. })) => self.replied += 1,
            Ok(Ok(Outcome::Dropped(_))) => self.dropped += 1,
            Ok(Err(e)) if e.is_cancelled() => {
                debug!("handler interrupted by shutdown");
                self.failed += 1;
            }
            // Already logged by the responder with sender context.
            Ok(Err(_)) => self.failed += 1,
            Err(e) => {
                error!(error = %e, "update handler panicked");
                self.failed += 1;
            }
        }
    }
}

/// Run the daemon until shutdown or a fatal error.
pub async fn run(config: &Config, gateway: Arc<dyn Gateway>, shutdown: Shutdown) -> Result<RunStats> {
    let login = config.login();
    let Some(account) = unless_shutdown(&shutdown, gateway.authorize(&login)).await else {
        info!("shutdown requested during authorization");
        return Ok(RunStats::default());
    };
    let account = account.context("Authentication failed")?;
    info!(
        id = %account.id,
        name = %account.display_name(),
        username = account.username.as_deref().unwrap_or(""),
        "authenticated"
    );

    let contacts = Arc::new(ContactRegistry::new());
    let Some(loaded) = unless_shutdown(&shutdown, contacts.refresh(gateway.as_ref())).await else {
        info!("shutdown requested while loading contacts");
        return Ok(RunStats::default());
    };
    loaded.context("Failed to load contacts")?;

    let responder = Arc::new(AutoResponder::new(
        gateway.clone(),
        contacts,
        Arc::new(ResponseLedger::new()),
        config.response_message.clone(),
        config.cooldown(),
    ));

    let Some(updates) = unless_shutdown(&shutdown, gateway.subscribe()).await else {
        info!("shutdown requested while subscribing");
        return Ok(RunStats::default());
    };
    let updates = updates.context("Failed to subscribe to updates")?;
    info!(
        contacts = responder.contacts().len(),
        cooldown_hours = config.response_timeout_hours,
        "daemon started"
    );

    dispatch(responder, updates, shutdown).await
}

/// Drive `step` to completion unless shutdown fires first.
async fn unless_shutdown<F: Future>(shutdown: &Shutdown, step: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = shutdown.triggered() => None,
        out = step => Some(out),
    }
}

/// Hand each update to the responder on its own task.
///
/// Returns when shutdown fires (after in-flight handlers finish) or with an
/// error when the gateway closes the update stream.
pub async fn dispatch(
    responder: Arc<AutoResponder>,
    mut updates: mpsc::Receiver<Update>,
    shutdown: Shutdown,
) -> Result<RunStats> {
    let mut stats = RunStats::default();
    let mut handlers = JoinSet::new();

    let result = loop {
        tokio::select! {
            biased;
            _ = shutdown.triggered() => {
                info!("shutdown requested, no longer accepting updates");
                break Ok(());
            }
            Some(joined) = handlers.join_next(), if !handlers.is_empty() => stats.absorb(joined),
            update = updates.recv() => match update {
                Some(update) => {
                    stats.updates += 1;
                    let responder = responder.clone();
                    let shutdown = shutdown.clone();
                    handlers.spawn(async move { responder.handle(&update, &shutdown).await });
                }
                None => break Err(anyhow!("Gateway closed the update stream")),
            },
        }
    };

    while let Some(joined) = handlers.join_next().await {
        stats.absorb(joined);
    }

    info!(
        updates = stats.updates,
        replied = stats.replied,
        dropped = stats.dropped,
        failed = stats.failed,
        "dispatcher stopped"
    );

    result.map(|()| stats)
}

/// Wait for SIGINT or SIGTERM.
pub async fn wait_for_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        res = tokio::signal::ctrl_c() => res?,
        _ = terminate.recv() => {}
    }
    Ok(())
}
