use std::time::Duration;

use tracing::{info, warn};

use hoopers_api::auth::AppState;

/// Background task that prunes old read notifications.
///
/// Runs on an interval and deletes notifications that were already read and
/// are older than the retention window. Unread ones are kept indefinitely.
pub async fn run_notification_prune(state: AppState, interval_secs: u64, retention_days: i64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        interval.tick().await;

        let cutoff = chrono::Utc::now() - chrono::Duration::days(retention_days);
        match state.db.prune_notifications(cutoff) {
            Ok(n) if n > 0 => info!("Cleanup: pruned {} read notifications", n),
            Ok(_) => {}
            Err(e) => warn!("Cleanup error: {}", e),
        }
    }
}
