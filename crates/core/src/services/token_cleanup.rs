//! Periodic removal of expired magic link tokens.

use std::time::Duration;

use tokio::{sync::watch, task::JoinHandle, time::MissedTickBehavior};

use super::magic_link::MagicLinkService;

/// Background sweep that deletes expired tokens on a fixed interval.
///
/// The task is idle until [`start`](Self::start) and exits after
/// [`stop`](Self::stop). A failed sweep is logged and retried on the next tick.
pub struct TokenCleanupTask {
    service: MagicLinkService,
    period: Duration,
    running: Option<(watch::Sender<bool>, JoinHandle<()>)>,
}

impl TokenCleanupTask {
    /// Create a stopped task that sweeps every `period`.
    #[must_use]
    pub const fn new(service: MagicLinkService, period: Duration) -> Self {
        Self {
            service,
            period,
            running: None,
        }
    }

    /// Whether the task is currently running.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Spawn the sweep loop. Starting a running task is a no-op.
    pub fn start(&mut self) {
        if self.running.is_some() {
            return;
        }

        let (tx, mut rx) = watch::channel(false);
        let service = self.service.clone();
        let period = self.period;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately; sweep on the next one.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => sweep(&service).await,
                    changed = rx.changed() => {
                        if changed.is_err() || *rx.borrow() {
                            break;
                        }
                    }
                }
            }
            tracing::info!("Token cleanup task stopped");
        });

        tracing::info!(interval_secs = period.as_secs(), "Token cleanup task started");
        self.running = Some((tx, handle));
    }

    /// Signal the loop to exit and wait for it.
    pub async fn stop(&mut self) {
        if let Some((tx, handle)) = self.running.take() {
            let _ = tx.send(true);
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Token cleanup task panicked");
            }
        }
    }
}

async fn sweep(service: &MagicLinkService) {
    match service.cleanup_expired().await {
        Ok(count) => {
            if count > 0 {
                tracing::info!(count, "Cleaned up expired magic link tokens");
            } else {
                tracing::debug!("No expired magic link tokens");
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to clean up expired magic link tokens");
        }
    }
}
