//! SQLite persistence for run records. One table; the full record is a
//! JSON blob, with status and timestamps broken out as columns for the
//! purge query.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use uuid::Uuid;

use woonrapport_common::{ReportError, RunRecord};
use woonrapport_engine::RunStore;

pub struct SqliteRunStore {
    pool: SqlitePool,
}

impl SqliteRunStore {
    pub async fn connect(database_url: &str) -> Result<Self, ReportError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| ReportError::Database(e.to_string()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        // Single-user app: one connection keeps writes serialized and
        // makes in-memory databases behave in tests.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| ReportError::Database(e.to_string()))?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), ReportError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS runs (
                id TEXT PRIMARY KEY,
                status TEXT NOT NULL,
                record TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| ReportError::Database(e.to_string()))?;
        Ok(())
    }
}

fn encode(run: &RunRecord) -> Result<String, ReportError> {
    serde_json::to_string(run).map_err(|e| ReportError::Database(e.to_string()))
}

fn decode(record: &str) -> Result<RunRecord, ReportError> {
    serde_json::from_str(record).map_err(|e| ReportError::Database(e.to_string()))
}

#[async_trait]
impl RunStore for SqliteRunStore {
    async fn insert(&self, run: &RunRecord) -> Result<(), ReportError> {
        sqlx::query("INSERT INTO runs (id, status, record, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5)")
            .bind(run.id.to_string())
            .bind(run.status.as_str())
            .bind(encode(run)?)
            .bind(run.created_at.timestamp())
            .bind(run.updated_at.timestamp())
            .execute(&self.pool)
            .await
            .map_err(|e| ReportError::Database(e.to_string()))?;
        Ok(())
    }

    async fn load(&self, id: Uuid) -> Result<Option<RunRecord>, ReportError> {
        let record: Option<String> =
            sqlx::query_scalar("SELECT record FROM runs WHERE id = ?1")
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| ReportError::Database(e.to_string()))?;
        record.as_deref().map(decode).transpose()
    }

    async fn update(&self, run: &RunRecord) -> Result<(), ReportError> {
        let result =
            sqlx::query("UPDATE runs SET status = ?2, record = ?3, updated_at = ?4 WHERE id = ?1")
                .bind(run.id.to_string())
                .bind(run.status.as_str())
                .bind(encode(run)?)
                .bind(run.updated_at.timestamp())
                .execute(&self.pool)
                .await
                .map_err(|e| ReportError::Database(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(ReportError::RunNotFound(run.id));
        }
        Ok(())
    }

    async fn purge_terminal_before(&self, cutoff: DateTime<Utc>) -> Result<u64, ReportError> {
        let result = sqlx::query(
            "DELETE FROM runs WHERE status IN ('done', 'failed') AND updated_at < ?1",
        )
        .bind(cutoff.timestamp())
        .execute(&self.pool)
        .await
        .map_err(|e| ReportError::Database(e.to_string()))?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use woonrapport_common::{RunInput, RunStatus};

    async fn memory_store() -> SqliteRunStore {
        SqliteRunStore::connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn insert_then_load_round_trips() {
        let store = memory_store().await;
        let run = RunRecord::new(RunInput {
            url: Some("https://listing.example/huis".into()),
            ..Default::default()
        });

        store.insert(&run).await.unwrap();
        let loaded = store.load(run.id).await.unwrap().unwrap();
        assert_eq!(loaded, run);
    }

    #[tokio::test]
    async fn load_unknown_id_is_none() {
        let store = memory_store().await;
        assert!(store.load(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_overwrites_the_record() {
        let store = memory_store().await;
        let mut run = RunRecord::new(RunInput::default());
        store.insert(&run).await.unwrap();

        run.status = RunStatus::Failed;
        run.error = Some("cancelled by user".into());
        store.update(&run).await.unwrap();

        let loaded = store.load(run.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, RunStatus::Failed);
        assert_eq!(loaded.error.as_deref(), Some("cancelled by user"));
    }

    #[tokio::test]
    async fn update_of_missing_run_errors() {
        let store = memory_store().await;
        let run = RunRecord::new(RunInput::default());
        assert!(matches!(
            store.update(&run).await,
            Err(ReportError::RunNotFound(_))
        ));
    }

    #[tokio::test]
    async fn purge_removes_only_old_terminal_runs() {
        let store = memory_store().await;

        let mut old_done = RunRecord::new(RunInput::default());
        old_done.status = RunStatus::Done;
        old_done.updated_at = Utc::now() - Duration::days(40);
        store.insert(&old_done).await.unwrap();

        let mut fresh_done = RunRecord::new(RunInput::default());
        fresh_done.status = RunStatus::Done;
        store.insert(&fresh_done).await.unwrap();

        let mut old_waiting = RunRecord::new(RunInput::default());
        old_waiting.status = RunStatus::WaitingInput;
        old_waiting.updated_at = Utc::now() - Duration::days(40);
        store.insert(&old_waiting).await.unwrap();

        let purged = store
            .purge_terminal_before(Utc::now() - Duration::days(30))
            .await
            .unwrap();

        assert_eq!(purged, 1);
        assert!(store.load(old_done.id).await.unwrap().is_none());
        assert!(store.load(fresh_done.id).await.unwrap().is_some());
        assert!(store.load(old_waiting.id).await.unwrap().is_some());
    }
}
