use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::{Row, SqlitePool};
use tracing::warn;

/// Append-only log of organize transactions, newest last.
#[derive(Clone)]
pub struct Journal {
    pool: SqlitePool,
}

#[derive(Debug, Clone)]
pub struct JournalEntry<T> {
    pub id: i64,
    pub created_at: i64,
    pub payload: T,
}

impl Journal {
    pub async fn open(database_url: &str) -> anyhow::Result<Self> {
        let pool = crate::connect(database_url).await?;
        crate::migrate(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn append<T: Serialize>(&self, payload: &T) -> anyhow::Result<i64> {
        let body = serde_json::to_string(payload)?;
        let res = sqlx::query("INSERT INTO transactions (payload_json, created_at) VALUES (?1, ?2)")
            .bind(body)
            .bind(chrono::Utc::now().timestamp())
            .execute(&self.pool)
            .await?;
        Ok(res.last_insert_rowid())
    }

    /// All entries, oldest first. Rows whose payload no longer decodes are
    /// skipped.
    pub async fn entries<T: DeserializeOwned>(&self) -> anyhow::Result<Vec<JournalEntry<T>>> {
        let rows = sqlx::query("SELECT id, payload_json, created_at FROM transactions ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?;
        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let id: i64 = row.get(0);
            let payload: String = row.get(1);
            match serde_json::from_str(&payload) {
                Ok(payload) => entries.push(JournalEntry {
                    id,
                    created_at: row.get(2),
                    payload,
                }),
                Err(e) => warn!(id, "skipping undecodable journal entry: {e}"),
            }
        }
        Ok(entries)
    }

    pub async fn remove(&self, id: i64) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM transactions WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    pub async fn len(&self) -> anyhow::Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM transactions")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
