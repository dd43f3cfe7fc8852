//! `JobStore` contract (spec.md §4.7 / C7) and its sea-orm backed and
//! in-memory implementations.

use async_trait::async_trait;
use catalog_errors::CatalogError;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseBackend, DatabaseConnection,
    EntityTrait, FromQueryResult, QueryFilter, QueryOrder, QuerySelect, Set, Statement,
    TransactionTrait,
};
use uuid::Uuid;

use crate::entity::{ActiveModel, Column, Entity as RefreshJob, JobState, Model, ALL_SOURCES};

const MAX_PAGE_SIZE: u32 = 100;
const DEFAULT_PAGE_SIZE: u32 = 20;

#[derive(Debug, Clone, Default)]
pub struct NewJob {
    pub namespace: Option<String>,
    pub plugin: String,
    pub source_id: String,
    pub requested_by: String,
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub namespace: Option<String>,
    pub plugin: Option<String>,
    pub source_id: Option<String>,
    pub state: Option<JobState>,
    pub requested_by: Option<String>,
    pub page_size: Option<u32>,
    pub page_token: Option<String>,
}

pub struct ListPage {
    pub items: Vec<Model>,
    pub next_page_token: Option<String>,
}

#[must_use]
pub fn clamp_page_size(requested: Option<u32>) -> u32 {
    requested.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
}

fn encode_page_token(requested_at: DateTime<Utc>) -> String {
    requested_at.to_rfc3339_opts(chrono::SecondsFormat::Nanos, true)
}

fn decode_page_token(token: &str) -> Result<DateTime<Utc>, CatalogError> {
    DateTime::parse_from_rfc3339(token)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| CatalogError::bad_request("malformed pageToken"))
}

#[async_trait]
pub trait JobStore: Send + Sync {
    async fn enqueue(&self, job: NewJob) -> Result<Model, CatalogError>;
    async fn claim(&self, max_retries: i32) -> Result<Option<Model>, CatalogError>;
    async fn complete(
        &self,
        id: Uuid,
        loaded: i64,
        removed: i64,
        duration_ms: i64,
    ) -> Result<(), CatalogError>;
    async fn fail(&self, id: Uuid, err: &str, max_retries: i32) -> Result<(), CatalogError>;
    async fn cancel(&self, id: Uuid) -> Result<(), CatalogError>;
    async fn get(&self, id: Uuid) -> Result<Option<Model>, CatalogError>;
    async fn list(&self, filter: ListFilter) -> Result<ListPage, CatalogError>;
    async fn cleanup_stuck_jobs(&self, timeout: chrono::Duration) -> Result<u64, CatalogError>;
    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, CatalogError>;
}

/// Backed by any database sea-orm supports; uses `SELECT … FOR UPDATE SKIP
/// LOCKED` on Postgres and a plain `SELECT … LIMIT 1` fallback elsewhere.
pub struct SeaOrmJobStore {
    db: DatabaseConnection,
}

impl SeaOrmJobStore {
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn db_err(err: sea_orm::DbErr) -> CatalogError {
    CatalogError::internal(format!("job store: {err}"))
}

#[async_trait]
impl JobStore for SeaOrmJobStore {
    async fn enqueue(&self, job: NewJob) -> Result<Model, CatalogError> {
        let namespace = job.namespace.unwrap_or_else(|| "default".to_owned());
        let txn = self.db.begin().await.map_err(db_err)?;

        if let Some(key) = job.idempotency_key.clone().filter(|k| !k.is_empty()) {
            let existing = RefreshJob::find()
                .filter(Column::IdempotencyKey.eq(key.clone()))
                .all(&txn)
                .await
                .map_err(db_err)?;
            if let Some(non_terminal) = existing.iter().find(|m| !m.state.is_terminal()) {
                txn.commit().await.map_err(db_err)?;
                return Ok(non_terminal.clone());
            }
            // Clear the key on any terminal rows sharing it to dodge the unique index.
            for terminal in existing.iter().filter(|m| m.state.is_terminal()) {
                let mut am: ActiveModel = terminal.clone().into();
                am.idempotency_key = Set(None);
                am.update(&txn).await.map_err(db_err)?;
            }
        }

        let model = ActiveModel {
            id: Set(Uuid::new_v4()),
            namespace: Set(namespace),
            plugin: Set(job.plugin),
            source_id: Set(if job.source_id.is_empty() {
                ALL_SOURCES.to_owned()
            } else {
                job.source_id
            }),
            requested_by: Set(job.requested_by),
            requested_at: Set(Utc::now()),
            state: Set(JobState::Queued),
            attempt_count: Set(0),
            last_error: Set(None),
            started_at: Set(None),
            finished_at: Set(None),
            idempotency_key: Set(job.idempotency_key.filter(|k| !k.is_empty())),
            entities_loaded: Set(None),
            entities_removed: Set(None),
            duration_ms: Set(None),
            message: Set(None),
        };
        let inserted = model.insert(&txn).await.map_err(db_err)?;
        txn.commit().await.map_err(db_err)?;
        Ok(inserted)
    }

    async fn claim(&self, max_retries: i32) -> Result<Option<Model>, CatalogError> {
        let txn = self.db.begin().await.map_err(db_err)?;
        let backend = txn.get_database_backend();

        let candidate = if backend == DatabaseBackend::Postgres {
            let stmt = Statement::from_sql_and_values(
                backend,
                r#"SELECT * FROM "refresh_jobs" WHERE "state" = 'queued' AND "attempt_count" <= $1
                   ORDER BY "requested_at" ASC LIMIT 1 FOR UPDATE SKIP LOCKED"#,
                [max_retries.into()],
            );
            Model::find_by_statement(stmt).one(&txn).await.map_err(db_err)?
        } else {
            RefreshJob::find()
                .filter(Column::State.eq(JobState::Queued))
                .filter(Column::AttemptCount.lte(max_retries))
                .order_by_asc(Column::RequestedAt)
                .limit(1)
                .one(&txn)
                .await
                .map_err(db_err)?
        };

        let Some(candidate) = candidate else {
            txn.commit().await.map_err(db_err)?;
            return Ok(None);
        };

        let mut am: ActiveModel = candidate.into();
        am.state = Set(JobState::Running);
        am.started_at = Set(Some(Utc::now()));
        let attempt = *am.attempt_count.as_ref() + 1;
        am.attempt_count = Set(attempt);
        let updated = am.update(&txn).await.map_err(db_err)?;
        txn.commit().await.map_err(db_err)?;
        Ok(Some(updated))
    }

    async fn complete(
        &self,
        id: Uuid,
        loaded: i64,
        removed: i64,
        duration_ms: i64,
    ) -> Result<(), CatalogError> {
        let Some(job) = RefreshJob::find_by_id(id).one(&self.db).await.map_err(db_err)? else {
            return Err(CatalogError::not_found(format!("job {id}")));
        };
        let mut am: ActiveModel = job.into();
        am.state = Set(JobState::Succeeded);
        am.finished_at = Set(Some(Utc::now()));
        am.entities_loaded = Set(Some(loaded));
        am.entities_removed = Set(Some(removed));
        am.duration_ms = Set(Some(duration_ms));
        am.message = Set(Some(format!("loaded {loaded}, removed {removed}")));
        am.update(&self.db).await.map_err(db_err)?;
        Ok(())
    }

    async fn fail(&self, id: Uuid, err: &str, max_retries: i32) -> Result<(), CatalogError> {
        let Some(job) = RefreshJob::find_by_id(id).one(&self.db).await.map_err(db_err)? else {
            return Err(CatalogError::not_found(format!("job {id}")));
        };
        let mut am: ActiveModel = job.clone().into();
        am.last_error = Set(Some(err.to_owned()));
        if job.attempt_count < max_retries {
            am.state = Set(JobState::Queued);
            am.started_at = Set(None);
            am.finished_at = Set(None);
        } else {
            am.state = Set(JobState::Failed);
            am.finished_at = Set(Some(Utc::now()));
            am.message = Set(Some("Max retries exceeded".to_owned()));
        }
        am.update(&self.db).await.map_err(db_err)?;
        Ok(())
    }

    async fn cancel(&self, id: Uuid) -> Result<(), CatalogError> {
        let Some(job) = RefreshJob::find_by_id(id).one(&self.db).await.map_err(db_err)? else {
            return Err(CatalogError::not_found(format!("job {id}")));
        };
        if job.state != JobState::Queued {
            return Err(CatalogError::conflict(format!(
                "job {id} is {:?}, only queued jobs can be canceled",
                job.state
            )));
        }
        let mut am: ActiveModel = job.into();
        am.state = Set(JobState::Canceled);
        am.finished_at = Set(Some(Utc::now()));
        am.update(&self.db).await.map_err(db_err)?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Model>, CatalogError> {
        RefreshJob::find_by_id(id).one(&self.db).await.map_err(db_err)
    }

    async fn list(&self, filter: ListFilter) -> Result<ListPage, CatalogError> {
        let page_size = clamp_page_size(filter.page_size);
        let mut query = RefreshJob::find();
        if let Some(ns) = &filter.namespace {
            query = query.filter(Column::Namespace.eq(ns.clone()));
        }
        if let Some(plugin) = &filter.plugin {
            query = query.filter(Column::Plugin.eq(plugin.clone()));
        }
        if let Some(source_id) = &filter.source_id {
            query = query.filter(Column::SourceId.eq(source_id.clone()));
        }
        if let Some(state) = filter.state {
            query = query.filter(Column::State.eq(state));
        }
        if let Some(requested_by) = &filter.requested_by {
            query = query.filter(Column::RequestedBy.eq(requested_by.clone()));
        }
        if let Some(token) = &filter.page_token {
            let cursor = decode_page_token(token)?;
            query = query.filter(Column::RequestedAt.lt(cursor));
        }

        let items = query
            .order_by_desc(Column::RequestedAt)
            .limit(u64::from(page_size) + 1)
            .all(&self.db)
            .await
            .map_err(db_err)?;

        let has_more = items.len() > page_size as usize;
        let mut items = items;
        items.truncate(page_size as usize);
        let next_page_token = if has_more {
            items.last().map(|m| encode_page_token(m.requested_at))
        } else {
            None
        };

        Ok(ListPage { items, next_page_token })
    }

    async fn cleanup_stuck_jobs(&self, timeout: chrono::Duration) -> Result<u64, CatalogError> {
        let cutoff = Utc::now() - timeout;
        let stuck = RefreshJob::find()
            .filter(Column::State.eq(JobState::Running))
            .filter(Column::StartedAt.lt(cutoff))
            .all(&self.db)
            .await
            .map_err(db_err)?;
        let count = stuck.len() as u64;
        for job in stuck {
            let mut am: ActiveModel = job.into();
            am.state = Set(JobState::Queued);
            am.started_at = Set(None);
            am.last_error = Set(Some("Timed out (stuck job recovery)".to_owned()));
            am.update(&self.db).await.map_err(db_err)?;
        }
        Ok(count)
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, CatalogError> {
        let result = RefreshJob::delete_many()
            .filter(Column::State.is_in([JobState::Succeeded, JobState::Failed, JobState::Canceled]))
            .filter(Column::FinishedAt.lt(cutoff))
            .exec(&self.db)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_page_size_into_bounds() {
        assert_eq!(clamp_page_size(None), 20);
        assert_eq!(clamp_page_size(Some(0)), 1);
        assert_eq!(clamp_page_size(Some(500)), 100);
        assert_eq!(clamp_page_size(Some(50)), 50);
    }

    #[test]
    fn page_token_roundtrips_through_rfc3339_nano() {
        let now = Utc::now();
        let token = encode_page_token(now);
        let decoded = decode_page_token(&token).unwrap();
        assert_eq!(decoded.timestamp_nanos_opt(), now.timestamp_nanos_opt());
    }

    #[test]
    fn malformed_page_token_is_bad_request() {
        assert!(decode_page_token("not-a-date").is_err());
    }
}
