//! Git-backed source refresh: a background task per git-type source that
//! periodically pulls the configured repository and re-parses matching
//! files, with a cancellation handle so `Refresh`/`Stop`/`Delete` can
//! cleanly terminate the previous run before starting a new one.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct GitSourceSpec {
    pub source_id: String,
    pub repo_url: String,
    pub reference: String,
    pub checkout_dir: PathBuf,
    pub poll_interval: Duration,
}

/// Tracks one cancellation token per source id so a second `Refresh` call
/// or a `Delete` can cancel the source's currently-running background pull
/// before the new one starts.
#[derive(Default)]
pub struct GitRefreshSupervisor {
    handles: DashMap<String, CancellationToken>,
}

impl GitRefreshSupervisor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns (or restarts) the periodic puller for `spec`. `on_pulled` is
    /// invoked with the checkout directory after every successful pull.
    pub fn spawn<F>(self: &Arc<Self>, spec: GitSourceSpec, on_pulled: F)
    where
        F: Fn(&std::path::Path) + Send + Sync + 'static,
    {
        self.cancel(&spec.source_id);
        let token = CancellationToken::new();
        self.handles.insert(spec.source_id.clone(), token.clone());

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = token.cancelled() => {
                        tracing::debug!(source = %spec.source_id, "git refresher cancelled");
                        return;
                    }
                    () = tokio::time::sleep(spec.poll_interval) => {}
                }
                match clone_or_pull(&spec) {
                    Ok(()) => on_pulled(&spec.checkout_dir),
                    Err(err) => {
                        tracing::warn!(source = %spec.source_id, error = %err, "git pull failed");
                    }
                }
            }
        });
    }

    /// Cancels the background task for `source_id`, if any. Idempotent.
    pub fn cancel(&self, source_id: &str) {
        if let Some((_, token)) = self.handles.remove(source_id) {
            token.cancel();
        }
    }

    pub fn cancel_all(&self) {
        for entry in self.handles.iter() {
            entry.value().cancel();
        }
        self.handles.clear();
    }
}

#[cfg(feature = "git")]
fn clone_or_pull(spec: &GitSourceSpec) -> anyhow::Result<()> {
    if spec.checkout_dir.join(".git").exists() {
        let repo = git2::Repository::open(&spec.checkout_dir)?;
        let mut remote = repo.find_remote("origin")?;
        remote.fetch(&[&spec.reference], None, None)?;
        let fetch_head = repo.find_reference("FETCH_HEAD")?;
        let commit = repo.reference_to_annotated_commit(&fetch_head)?;
        repo.set_head_detached(commit.id())?;
        repo.checkout_head(Some(git2::build::CheckoutBuilder::new().force()))?;
    } else {
        std::fs::create_dir_all(&spec.checkout_dir)?;
        git2::Repository::clone(&spec.repo_url, &spec.checkout_dir)?;
    }
    Ok(())
}

#[cfg(not(feature = "git"))]
fn clone_or_pull(_spec: &GitSourceSpec) -> anyhow::Result<()> {
    anyhow::bail!("git support disabled at build time")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancel_is_idempotent_and_stops_future_work() {
        let sup = Arc::new(GitRefreshSupervisor::new());
        sup.cancel("nonexistent");

        let spec = GitSourceSpec {
            source_id: "s1".into(),
            repo_url: "https://example.invalid/repo.git".into(),
            reference: "main".into(),
            checkout_dir: std::env::temp_dir().join("catalog-git-test-s1"),
            poll_interval: Duration::from_secs(3600),
        };
        sup.spawn(spec, |_| {});
        assert_eq!(sup.handles.len(), 1);
        sup.cancel("s1");
        assert_eq!(sup.handles.len(), 0);
        sup.cancel("s1");
    }
}
