//! Retention worker (spec.md §4.4): a 24-hour tick that deletes events
//! older than `retentionDays`. Disabled when retention is non-positive.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::store::AuditStore;

const TICK_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Runs until `cancel` fires. A non-positive `retention_days` disables the
/// worker entirely (it returns immediately without ticking).
pub async fn run(store: Arc<dyn AuditStore>, retention_days: i64, cancel: CancellationToken) {
    if retention_days <= 0 {
        tracing::info!("audit retention disabled (retentionDays <= 0)");
        return;
    }

    let mut interval = tokio::time::interval(TICK_INTERVAL);
    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                tracing::info!("audit retention worker stopping");
                return;
            }
            _ = interval.tick() => {
                let cutoff = chrono::Utc::now() - chrono::Duration::days(retention_days);
                match store.delete_older_than(cutoff).await {
                    Ok(removed) => tracing::info!(removed, "audit retention swept events"),
                    Err(err) => tracing::warn!(error = %err, "audit retention sweep failed"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryAuditStore;

    #[tokio::test]
    async fn disabled_when_retention_not_positive() {
        let store: Arc<dyn AuditStore> = Arc::new(InMemoryAuditStore::default());
        let cancel = CancellationToken::new();
        // Returns immediately rather than hanging on the first tick.
        tokio::time::timeout(Duration::from_millis(50), run(store, 0, cancel))
            .await
            .expect("disabled worker must return promptly");
    }
}
