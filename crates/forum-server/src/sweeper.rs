use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use forum_api::AppState;

/// Background task that prunes expired sessions and OAuth states.
///
/// Expiry is already enforced on lookup; this only keeps the tables small.
pub async fn run_sweep_loop(state: AppState, interval_secs: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        interval.tick().await;

        let st = state.clone();
        let swept = tokio::task::spawn_blocking(move || {
            st.db.delete_expired_sessions(Utc::now())
        })
        .await;

        match swept {
            Ok(Ok(count)) if count > 0 => info!("Sweep: removed {} expired sessions", count),
            Ok(Ok(_)) => {}
            Ok(Err(e)) => warn!("Session sweep error: {}", e),
            Err(e) => warn!("Session sweep task failed: {}", e),
        }

        let states = state.oauth_states.sweep_expired();
        if states > 0 {
            debug!("Sweep: removed {} expired OAuth states", states);
        }
    }
}
