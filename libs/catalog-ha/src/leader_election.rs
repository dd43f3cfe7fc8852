//! Leader election (spec.md §4.6): optional, off by default. Uses a
//! Kubernetes `Lease` so singleton workers (retention, job pool, config
//! reconciliation) run on exactly one replica.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct LeaderElectionConfig {
    pub enabled: bool,
    pub lease_name: String,
    pub lease_namespace: String,
    pub lease_duration: Duration,
    pub identity: String,
}

impl LeaderElectionConfig {
    #[must_use]
    pub fn identity_from_env() -> String {
        std::env::var("POD_NAME")
            .ok()
            .or_else(|| hostname())
            .unwrap_or_else(|| "unknown".to_owned())
    }
}

fn hostname() -> Option<String> {
    std::env::var("HOSTNAME").ok()
}

impl Default for LeaderElectionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            lease_name: "catalog-server-leader".to_owned(),
            lease_namespace: "default".to_owned(),
            lease_duration: Duration::from_secs(15),
            identity: Self::identity_from_env(),
        }
    }
}

/// When disabled, every replica is "leader" — this mirrors spec.md's
/// default deployment mode where singleton workers simply run everywhere.
pub async fn run_disabled<F, Fut>(on_started_leading: F, cancel: CancellationToken)
where
    F: FnOnce(CancellationToken) -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    on_started_leading(cancel).await;
}

#[cfg(feature = "leader-election")]
pub use kube_backed::run_with_lease;

#[cfg(feature = "leader-election")]
mod kube_backed {
    use super::LeaderElectionConfig;
    use chrono::Utc;
    use k8s_openapi::api::coordination::v1::{Lease, LeaseSpec};
    use kube::api::{Api, Patch, PatchParams};
    use kube::Client;
    use tokio_util::sync::CancellationToken;

    /// Drives a simple lease-based election loop: attempt to hold the
    /// lease by renewing `holderIdentity`; invoke `on_started_leading` once
    /// acquired, `on_stop_leading` on loss or cancellation.
    pub async fn run_with_lease<S, L, SFut, LFut>(
        client: Client,
        config: LeaderElectionConfig,
        on_started_leading: S,
        on_stop_leading: L,
        cancel: CancellationToken,
    ) where
        S: FnOnce(CancellationToken) -> SFut,
        L: FnOnce() -> LFut,
        SFut: std::future::Future<Output = ()>,
        LFut: std::future::Future<Output = ()>,
    {
        let leases: Api<Lease> = Api::namespaced(client, &config.lease_namespace);
        let mut is_leader = false;
        let worker_cancel = CancellationToken::new();

        loop {
            if cancel.is_cancelled() {
                if is_leader {
                    on_stop_leading().await;
                }
                worker_cancel.cancel();
                return;
            }

            let acquired = try_acquire_or_renew(&leases, &config).await;
            if acquired && !is_leader {
                is_leader = true;
                tracing::info!(identity = %config.identity, "acquired leader lease");
                let cancel_for_worker = worker_cancel.clone();
                tokio::spawn(on_started_leading(cancel_for_worker));
            } else if !acquired && is_leader {
                is_leader = false;
                tracing::warn!("lost leader lease");
                worker_cancel.cancel();
                on_stop_leading().await;
            }

            tokio::select! {
                () = cancel.cancelled() => {}
                () = tokio::time::sleep(config.lease_duration / 3) => {}
            }
        }
    }

    async fn try_acquire_or_renew(leases: &Api<Lease>, config: &LeaderElectionConfig) -> bool {
        let existing = leases.get_opt(&config.lease_name).await.ok().flatten();
        let now = Utc::now();

        let holder_is_stale = existing.as_ref().is_none_or(|lease| {
            let spec = lease.spec.as_ref();
            let holder = spec.and_then(|s| s.holder_identity.clone());
            let renewed = spec.and_then(|s| s.renew_time.clone());
            holder.as_deref() != Some(&config.identity)
                && renewed.is_none_or(|t| {
                    now.signed_duration_since(t.0)
                        > chrono::Duration::from_std(config.lease_duration).unwrap_or_default()
                })
        });

        let already_mine = existing
            .as_ref()
            .and_then(|l| l.spec.as_ref())
            .and_then(|s| s.holder_identity.as_deref())
            == Some(config.identity.as_str());

        if !holder_is_stale && !already_mine {
            return false;
        }

        let lease = Lease {
            metadata: kube::api::ObjectMeta {
                name: Some(config.lease_name.clone()),
                ..Default::default()
            },
            spec: Some(LeaseSpec {
                holder_identity: Some(config.identity.clone()),
                lease_duration_seconds: Some(config.lease_duration.as_secs() as i32),
                renew_time: Some(k8s_openapi::apimachinery::pkg::apis::meta::v1::MicroTime(now)),
                acquire_time: existing
                    .and_then(|l| l.spec.and_then(|s| s.acquire_time))
                    .or(Some(k8s_openapi::apimachinery::pkg::apis::meta::v1::MicroTime(now))),
                ..Default::default()
            }),
        };

        leases
            .patch(
                &config.lease_name,
                &PatchParams::apply("catalog-server"),
                &Patch::Apply(&lease),
            )
            .await
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_mode_always_runs_the_workers() {
        let cancel = CancellationToken::new();
        let ran = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let ran2 = ran.clone();
        run_disabled(
            |_cancel| async move {
                ran2.store(true, std::sync::atomic::Ordering::SeqCst);
            },
            cancel,
        )
        .await;
        assert!(ran.load(std::sync::atomic::Ordering::SeqCst));
    }
}
