// Append-only audit log of container actions. SQLite when configured, memory otherwise.

use crate::models::AuditRecord;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use tracing::instrument;

pub enum AuditRepo {
    Sqlite(SqlitePool),
    Memory(std::sync::Mutex<Vec<AuditRecord>>),
}

impl AuditRepo {
    pub async fn connect(path: &str) -> anyhow::Result<Self> {
        if let Some(parent) = Path::new(path).parent() {
            std::fs::create_dir_all(parent)?;
        }
        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}", path))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(5))
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);
        let pool = SqlitePoolOptions::new().connect_with(opts).await?;
        let repo = AuditRepo::Sqlite(pool);
        repo.init().await?;
        Ok(repo)
    }

    pub fn in_memory() -> Self {
        AuditRepo::Memory(std::sync::Mutex::new(Vec::new()))
    }

    async fn init(&self) -> anyhow::Result<()> {
        if let AuditRepo::Sqlite(pool) = self {
            sqlx::query(
                r#"
                CREATE TABLE IF NOT EXISTS audit_logs (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id TEXT NOT NULL,
                    action TEXT NOT NULL,
                    container_id TEXT NOT NULL,
                    container_name TEXT NOT NULL,
                    created_at TEXT NOT NULL
                )
                "#,
            )
            .execute(pool)
            .await?;
        }
        Ok(())
    }

    #[instrument(skip(self, record), fields(repo = "audit", operation = "record", action = %record.action, container_id = %record.container_id))]
    pub async fn record(&self, record: &AuditRecord) -> anyhow::Result<()> {
        match self {
            AuditRepo::Sqlite(pool) => {
                sqlx::query(
                    "INSERT INTO audit_logs (user_id, action, container_id, container_name, created_at) VALUES ($1, $2, $3, $4, $5)",
                )
                .bind(&record.user_id)
                .bind(record.action.as_str())
                .bind(&record.container_id)
                .bind(&record.container_name)
                .bind(&record.timestamp)
                .execute(pool)
                .await?;
            }
            AuditRepo::Memory(records) => {
                records
                    .lock()
                    .map_err(|e| anyhow::anyhow!("audit lock poisoned: {}", e))?
                    .push(record.clone());
            }
        }
        Ok(())
    }

    /// Records held by the in-memory sink; empty for SQLite.
    pub fn memory_records(&self) -> Vec<AuditRecord> {
        match self {
            AuditRepo::Memory(records) => records
                .lock()
                .map(|r| r.clone())
                .unwrap_or_default(),
            AuditRepo::Sqlite(_) => Vec::new(),
        }
    }
}
