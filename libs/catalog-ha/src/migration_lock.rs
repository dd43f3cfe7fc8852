//! Migration lock (spec.md §4.6 / C6): acquired before schema migrations
//! and released after, so multiple replicas starting concurrently never
//! race to migrate the same database.

use catalog_errors::CatalogError;
use chrono::{DateTime, Duration, Utc};
use sea_orm::{ConnectionTrait, DatabaseBackend, DatabaseConnection, DbBackend, FromQueryResult, Statement};

const LOCK_NAME: &str = "catalog-server-migration";
const STALE_CUTOFF: Duration = Duration::minutes(5);
const MAX_RETRIES: u32 = 20;
const RETRY_BACKOFF: std::time::Duration = std::time::Duration::from_millis(250);

fn advisory_lock_key() -> i64 {
    i64::from(crc32fast::hash(LOCK_NAME.as_bytes()))
}

/// Holds the migration lock until dropped scope calls `release`.
/// PostgreSQL uses `pg_advisory_lock`; other backends fall back to a
/// single-row `migration_lock` table with a 5-minute stale cutoff.
pub struct MigrationLock<'a> {
    db: &'a DatabaseConnection,
    holder: String,
    acquired_via_row: bool,
}

async fn ensure_lock_table(db: &DatabaseConnection) -> Result<(), CatalogError> {
    let backend = db.get_database_backend();
    let sql = match backend {
        DatabaseBackend::Postgres => {
            "CREATE TABLE IF NOT EXISTS migration_lock (name VARCHAR(255) PRIMARY KEY, holder VARCHAR(255) NOT NULL, acquired_at TIMESTAMPTZ NOT NULL)"
        }
        _ => {
            "CREATE TABLE IF NOT EXISTS migration_lock (name TEXT PRIMARY KEY, holder TEXT NOT NULL, acquired_at TEXT NOT NULL)"
        }
    };
    db.execute(Statement::from_string(backend, sql))
        .await
        .map_err(|e| CatalogError::internal(format!("migration lock table: {e}")))?;
    Ok(())
}

async fn try_take_row_lock(db: &DatabaseConnection, holder: &str) -> Result<bool, CatalogError> {
    let backend = db.get_database_backend();
    #[derive(Debug, sea_orm::FromQueryResult)]
    struct Row {
        holder: String,
        acquired_at: String,
    }

    let existing = Row::find_by_statement(Statement::from_string(
        backend,
        "SELECT holder, acquired_at FROM migration_lock WHERE name = 'catalog-server-migration'",
    ))
    .one(db)
    .await
    .map_err(|e| CatalogError::internal(format!("migration lock query: {e}")))?;

    if let Some(row) = existing {
        let age_ok = row
            .acquired_at
            .parse::<DateTime<Utc>>()
            .map(|acquired_at| Utc::now() - acquired_at > STALE_CUTOFF)
            .unwrap_or(true);
        if !age_ok {
            return Ok(false);
        }
        db.execute(Statement::from_sql_and_values(
            backend,
            "UPDATE migration_lock SET holder = $1, acquired_at = $2 WHERE name = 'catalog-server-migration'",
            [holder.into(), Utc::now().to_rfc3339().into()],
        ))
        .await
        .map_err(|e| CatalogError::internal(format!("migration lock steal: {e}")))?;
        return Ok(true);
    }

    let inserted = db
        .execute(Statement::from_sql_and_values(
            backend,
            "INSERT INTO migration_lock (name, holder, acquired_at) VALUES ('catalog-server-migration', $1, $2)",
            [holder.into(), Utc::now().to_rfc3339().into()],
        ))
        .await;
    Ok(inserted.is_ok())
}

/// Blocks (with backoff) until the lock is acquired or `MAX_RETRIES` is
/// exceeded.
pub async fn acquire<'a>(db: &'a DatabaseConnection, holder: &str) -> Result<MigrationLock<'a>, CatalogError> {
    if db.get_database_backend() == DbBackend::Postgres {
        db.execute(Statement::from_sql_and_values(
            DbBackend::Postgres,
            "SELECT pg_advisory_lock($1)",
            [advisory_lock_key().into()],
        ))
        .await
        .map_err(|e| CatalogError::internal(format!("pg_advisory_lock: {e}")))?;
        return Ok(MigrationLock {
            db,
            holder: holder.to_owned(),
            acquired_via_row: false,
        });
    }

    ensure_lock_table(db).await?;
    for attempt in 0..MAX_RETRIES {
        if try_take_row_lock(db, holder).await? {
            return Ok(MigrationLock {
                db,
                holder: holder.to_owned(),
                acquired_via_row: true,
            });
        }
        tracing::debug!(attempt, "migration lock held by another replica, retrying");
        tokio::time::sleep(RETRY_BACKOFF).await;
    }
    Err(CatalogError::unavailable("could not acquire migration lock"))
}

impl MigrationLock<'_> {
    pub async fn release(self) -> Result<(), CatalogError> {
        if self.acquired_via_row {
            self.db
                .execute(Statement::from_sql_and_values(
                    self.db.get_database_backend(),
                    "DELETE FROM migration_lock WHERE name = 'catalog-server-migration' AND holder = $1",
                    [self.holder.clone().into()],
                ))
                .await
                .map_err(|e| CatalogError::internal(format!("migration lock release: {e}")))?;
        } else {
            self.db
                .execute(Statement::from_sql_and_values(
                    DbBackend::Postgres,
                    "SELECT pg_advisory_unlock($1)",
                    [advisory_lock_key().into()],
                ))
                .await
                .map_err(|e| CatalogError::internal(format!("pg_advisory_unlock: {e}")))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advisory_lock_key_is_stable() {
        assert_eq!(advisory_lock_key(), advisory_lock_key());
    }
}
