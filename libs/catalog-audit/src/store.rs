//! `AuditStore`: append-only event storage with pagination and retention.

use async_trait::async_trait;
use catalog_errors::CatalogError;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use crate::model::AuditEvent;

#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn append(&self, event: AuditEvent) -> Result<(), CatalogError>;
    async fn get(&self, namespace: &str, id: Uuid) -> Result<Option<AuditEvent>, CatalogError>;
    async fn list(&self, namespace: &str) -> Result<Vec<AuditEvent>, CatalogError>;
    /// Deletes events older than `cutoff`, returning the number removed.
    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, CatalogError>;
}

/// A process-local store. Suitable for single-replica deployments and
/// tests; multi-replica deployments need a durable `AuditStore`.
#[derive(Default)]
pub struct InMemoryAuditStore {
    events: RwLock<Vec<AuditEvent>>,
}

#[async_trait]
impl AuditStore for InMemoryAuditStore {
    async fn append(&self, event: AuditEvent) -> Result<(), CatalogError> {
        self.events.write().push(event);
        Ok(())
    }

    async fn get(&self, namespace: &str, id: Uuid) -> Result<Option<AuditEvent>, CatalogError> {
        Ok(self
            .events
            .read()
            .iter()
            .find(|e| e.namespace == namespace && e.id == id)
            .cloned())
    }

    async fn list(&self, namespace: &str) -> Result<Vec<AuditEvent>, CatalogError> {
        Ok(self
            .events
            .read()
            .iter()
            .filter(|e| e.namespace == namespace)
            .cloned()
            .collect())
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, CatalogError> {
        let mut events = self.events.write();
        let before = events.len();
        events.retain(|e| e.created_at >= cutoff);
        Ok((before - events.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::Map;

    fn event(namespace: &str, age: Duration) -> AuditEvent {
        AuditEvent {
            id: Uuid::new_v4(),
            namespace: namespace.to_owned(),
            correlation_id: "c1".into(),
            event_type: "management".into(),
            actor: "alice".into(),
            request_id: "r1".into(),
            plugin: Some("model".into()),
            resource_type: Some("sources".into()),
            resource_ids: vec![],
            action: "POST".into(),
            action_verb: Some("create".into()),
            outcome: crate::model::Outcome::Success,
            status_code: 201,
            reason: None,
            old_value: None,
            new_value: None,
            metadata: Map::new(),
            created_at: Utc::now() - age,
        }
    }

    #[tokio::test]
    async fn append_then_list_is_namespace_scoped() {
        let store = InMemoryAuditStore::default();
        store.append(event("team-a", Duration::zero())).await.unwrap();
        store.append(event("team-b", Duration::zero())).await.unwrap();
        assert_eq!(store.list("team-a").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn delete_older_than_respects_cutoff() {
        let store = InMemoryAuditStore::default();
        store.append(event("default", Duration::days(10))).await.unwrap();
        store.append(event("default", Duration::hours(1))).await.unwrap();
        let removed = store
            .delete_older_than(Utc::now() - Duration::days(1))
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.list("default").await.unwrap().len(), 1);
    }
}
