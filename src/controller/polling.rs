//! Fixed-delay polling loop

use std::sync::atomic::Ordering;
use std::time::Duration;

use crate::config::Config;

use super::PlaybackController;

impl PlaybackController {
    /// Start reconciling every `interval`. The first cycle runs immediately and
    /// emits every facet. Calling this while running only changes the interval.
    pub fn start(&self, interval: Duration) {
        let interval_ms = (interval.as_millis() as u64).max(1);
        let previous = self.interval_ms.swap(interval_ms, Ordering::SeqCst);
        if previous != 0 {
            tracing::debug!(interval_ms, "Polling interval updated");
            return;
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::info!(interval_ms, generation, "Starting playback polling");

        let controller = self.clone();
        tokio::spawn(async move {
            controller.run_polling(generation).await;
        });
    }

    /// Start at the cadence the configuration selects
    pub fn start_with_config(&self, config: &Config) {
        self.start(config.active_poll_interval());
    }

    /// Disable the loop; it exits after the cycle in flight completes
    pub fn stop(&self) {
        if self.interval_ms.swap(0, Ordering::SeqCst) != 0 {
            tracing::info!("Stopping playback polling");
        }
    }

    pub fn is_running(&self) -> bool {
        self.interval_ms.load(Ordering::SeqCst) != 0
    }

    /// Current loop interval, `None` when stopped
    pub fn interval(&self) -> Option<Duration> {
        match self.interval_ms.load(Ordering::SeqCst) {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    async fn run_polling(&self, generation: u64) {
        let mut force_emit_all = true;
        loop {
            if !self.is_running() || !self.is_current(generation) {
                break;
            }

            if let Err(e) = self.poll(force_emit_all).await {
                tracing::warn!(error = %e, "Playback poll failed");
            } else {
                force_emit_all = false;
            }

            let interval_ms = self.interval_ms.load(Ordering::SeqCst);
            if interval_ms == 0 || !self.is_current(generation) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(interval_ms)).await;
        }
        tracing::debug!(generation, "Playback polling loop exited");
    }
}
