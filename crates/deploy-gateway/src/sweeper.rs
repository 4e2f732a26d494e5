//! Periodic reclamation of idle orchestrators (spec.md §5). Grounded on
//! `web_service::server::WebService`'s `oneshot::Sender<()>` shutdown
//! pattern for stopping a background task cleanly.

use crate::state::AppState;
use chrono::Duration as ChronoDuration;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

pub struct Sweeper {
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Sweeper {
    pub fn start(state: Arc<AppState>, interval: Duration, grace: ChronoDuration) -> Self {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(run(state, interval, grace, shutdown_rx));
        Self { shutdown_tx: Some(shutdown_tx), handle: Some(handle) }
    }

    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run(state: Arc<AppState>, interval: Duration, grace: ChronoDuration, mut shutdown_rx: oneshot::Receiver<()>) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => sweep_once(&state, grace),
            _ = &mut shutdown_rx => {
                tracing::info!("sweeper shutting down");
                break;
            }
        }
    }
}

/// Evict orchestrators that have been transport-less past `grace` and are
/// not currently executing a pipeline (spec.md §5: "must never reclaim one
/// currently executing a pipeline").
fn sweep_once(state: &AppState, grace: ChronoDuration) {
    let now = chrono::Utc::now();
    let stale: Vec<_> = state
        .orchestrators
        .iter()
        .filter(|entry| {
            let past_grace = entry.value().meta.lock().expect("session meta mutex poisoned").past_grace(now, grace);
            let running = entry.value().pipeline_running.load(std::sync::atomic::Ordering::SeqCst);
            let has_transport = state.transports.contains_key(entry.key());
            past_grace && !running && !has_transport
        })
        .map(|entry| entry.key().clone())
        .collect();

    for session_id in stale {
        state.orchestrators.remove(&session_id);
        tracing::info!(session_id = %session_id, "swept idle orchestrator");
    }
}
