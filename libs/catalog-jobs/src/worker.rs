//! Worker pool (spec.md §4.7): N refresh workers plus one cleanup worker,
//! draining cleanly on cancellation.

use std::sync::Arc;
use std::time::Duration;

use catalog_kit::RefresherRegistry;
use chrono::Duration as ChronoDuration;
use tokio_util::sync::CancellationToken;

use crate::entity::ALL_SOURCES;
use crate::store::JobStore;

#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    pub concurrency: usize,
    pub max_retries: i32,
    pub poll_interval: Duration,
    pub claim_timeout: Duration,
    pub retention_days: i64,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            max_retries: 3,
            poll_interval: Duration::from_secs(2),
            claim_timeout: Duration::from_secs(600),
            retention_days: 30,
        }
    }
}

async fn run_worker(
    store: Arc<dyn JobStore>,
    refreshers: Arc<RefresherRegistry>,
    config: WorkerPoolConfig,
    cancel: CancellationToken,
) {
    loop {
        if cancel.is_cancelled() {
            return;
        }
        match store.claim(config.max_retries).await {
            Ok(Some(job)) => {
                let Some(refresher) = refreshers.get(&job.plugin) else {
                    let _ = store
                        .fail(job.id, &format!("unknown plugin '{}'", job.plugin), 0)
                        .await;
                    continue;
                };

                let started = tokio::time::Instant::now();
                let outcome = if job.source_id.is_empty() || job.source_id == ALL_SOURCES {
                    refresher.refresh_all().await
                } else {
                    refresher.refresh(&job.source_id).await
                };

                match outcome {
                    Ok(result) => {
                        let duration_ms = result.duration_ms as i64;
                        let _ = store
                            .complete(
                                job.id,
                                result.entities_loaded as i64,
                                result.entities_removed as i64,
                                if duration_ms > 0 {
                                    duration_ms
                                } else {
                                    started.elapsed().as_millis() as i64
                                },
                            )
                            .await;
                    }
                    Err(err) => {
                        let _ = store.fail(job.id, &err.to_string(), config.max_retries).await;
                    }
                }
            }
            Ok(None) => {
                tokio::select! {
                    () = cancel.cancelled() => return,
                    () = tokio::time::sleep(config.poll_interval) => {}
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "job claim failed");
                tokio::select! {
                    () = cancel.cancelled() => return,
                    () = tokio::time::sleep(config.poll_interval) => {}
                }
            }
        }
    }
}

async fn run_cleanup(store: Arc<dyn JobStore>, config: WorkerPoolConfig, cancel: CancellationToken) {
    let tick = Duration::from_secs(60);
    loop {
        tokio::select! {
            () = cancel.cancelled() => return,
            () = tokio::time::sleep(tick) => {
                let timeout = ChronoDuration::from_std(config.claim_timeout).unwrap_or(ChronoDuration::seconds(600));
                if let Err(err) = store.cleanup_stuck_jobs(timeout).await {
                    tracing::warn!(error = %err, "stuck-job cleanup failed");
                }
                if config.retention_days > 0 {
                    let cutoff = chrono::Utc::now() - ChronoDuration::days(config.retention_days);
                    if let Err(err) = store.delete_older_than(cutoff).await {
                        tracing::warn!(error = %err, "job retention sweep failed");
                    }
                }
            }
        }
    }
}

/// Spawns `config.concurrency` refresh workers plus one cleanup worker,
/// returning their join handles. Callers await all of them after firing
/// `cancel` to ensure the pool drains before the process exits.
#[must_use]
pub fn spawn(
    store: Arc<dyn JobStore>,
    refreshers: Arc<RefresherRegistry>,
    config: WorkerPoolConfig,
    cancel: CancellationToken,
) -> Vec<tokio::task::JoinHandle<()>> {
    let mut handles = Vec::with_capacity(config.concurrency + 1);
    for _ in 0..config.concurrency {
        handles.push(tokio::spawn(run_worker(
            store.clone(),
            refreshers.clone(),
            config.clone(),
            cancel.clone(),
        )));
    }
    handles.push(tokio::spawn(run_cleanup(store, config, cancel)));
    handles
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{JobState, Model};
    use crate::store::NewJob;
    use crate::ListFilter;
    use async_trait::async_trait;
    use catalog_errors::CatalogError;
    use catalog_kit::{PluginRefresher, RefreshOutcome};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeRefresher {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl PluginRefresher for FakeRefresher {
        async fn refresh(&self, _source_id: &str) -> anyhow::Result<RefreshOutcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(RefreshOutcome::default())
        }
        async fn refresh_all(&self) -> anyhow::Result<RefreshOutcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(RefreshOutcome::default())
        }
    }

    struct OneShotStore {
        claimed: std::sync::atomic::AtomicBool,
    }

    #[async_trait]
    impl JobStore for OneShotStore {
        async fn enqueue(&self, _job: NewJob) -> Result<Model, CatalogError> {
            unimplemented!()
        }
        async fn claim(&self, _max_retries: i32) -> Result<Option<Model>, CatalogError> {
            if self.claimed.swap(true, Ordering::SeqCst) {
                return Ok(None);
            }
            Ok(Some(Model {
                id: uuid::Uuid::new_v4(),
                namespace: "default".into(),
                plugin: "model".into(),
                source_id: ALL_SOURCES.into(),
                requested_by: "alice".into(),
                requested_at: chrono::Utc::now(),
                state: JobState::Running,
                attempt_count: 1,
                last_error: None,
                started_at: Some(chrono::Utc::now()),
                finished_at: None,
                idempotency_key: None,
                entities_loaded: None,
                entities_removed: None,
                duration_ms: None,
                message: None,
            }))
        }
        async fn complete(&self, _id: uuid::Uuid, _l: i64, _r: i64, _d: i64) -> Result<(), CatalogError> {
            Ok(())
        }
        async fn fail(&self, _id: uuid::Uuid, _e: &str, _m: i32) -> Result<(), CatalogError> {
            Ok(())
        }
        async fn cancel(&self, _id: uuid::Uuid) -> Result<(), CatalogError> {
            Ok(())
        }
        async fn get(&self, _id: uuid::Uuid) -> Result<Option<Model>, CatalogError> {
            Ok(None)
        }
        async fn list(&self, _f: ListFilter) -> Result<crate::store::ListPage, CatalogError> {
            Ok(crate::store::ListPage { items: vec![], next_page_token: None })
        }
        async fn cleanup_stuck_jobs(&self, _t: chrono::Duration) -> Result<u64, CatalogError> {
            Ok(0)
        }
        async fn delete_older_than(&self, _c: chrono::DateTime<chrono::Utc>) -> Result<u64, CatalogError> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn worker_dispatches_claimed_job_to_refresher() {
        let calls = Arc::new(AtomicUsize::new(0));
        let store: Arc<dyn JobStore> = Arc::new(OneShotStore { claimed: false.into() });
        let refreshers = Arc::new(RefresherRegistry::default());
        refreshers.register("model", Arc::new(FakeRefresher { calls: calls.clone() }));

        let cancel = CancellationToken::new();
        let config = WorkerPoolConfig {
            concurrency: 1,
            poll_interval: Duration::from_millis(5),
            ..Default::default()
        };
        let handles = spawn(store, refreshers, config, cancel.clone());
        tokio::time::sleep(Duration::from_millis(30)).await;
        cancel.cancel();
        for h in handles {
            let _ = h.await;
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
