//! Background scheduler: a single periodic trigger invoking
//! [`crate::refresh::run_scheduled_refresh`]. No other background work
//! exists in this process.

use std::sync::Arc;
use std::time::Duration;

use crate::AppState;

/// Spawns the periodic refresh loop on the Tokio runtime. Returns
/// immediately; the loop runs for the lifetime of the process.
pub fn spawn(state: Arc<AppState>) {
    let interval = Duration::from_secs(state.config.scheduled_refresh_interval_secs);

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            tracing::info!("scheduled refresh batch starting");

            match crate::refresh::run_scheduled_refresh(&state.pool, &state.config, &state.http_client)
                .await
            {
                Ok(outcome) => tracing::info!(
                    centers_processed = outcome.centers_processed,
                    centers_failed = outcome.centers_failed,
                    cursor_after = outcome.cursor_after,
                    "scheduled refresh batch finished"
                ),
                Err(e) => tracing::error!(error = %e, "scheduled refresh batch failed"),
            }
        }
    });
}
