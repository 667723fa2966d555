//! SQLite-backed [`AgentStore`].
//!
//! State is stored as one JSON document per agent; turn history is a plain
//! append table. Factory reset deletes both inside a single transaction so a
//! crash can never leave an agent half-erased.

use crate::{AgentRecord, AgentStore, TurnLog};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{sqlite::SqlitePoolOptions, Pool, Row, Sqlite};
use std::path::Path;
use uuid::Uuid;

#[derive(Clone)]
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    pub async fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_url = format!("sqlite://{}?mode=rwc", db_path.as_ref().display());
        let pool = SqlitePoolOptions::new()
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    sqlx::query("PRAGMA foreign_keys = ON").execute(conn).await?;
                    Ok(())
                })
            })
            .connect(&db_url)
            .await
            .context("Failed to connect to SQLite database")?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// In-memory database for tests and ephemeral sessions.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .context("Failed to open in-memory SQLite database")?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS agents (
                id TEXT PRIMARY KEY,
                state TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create agents table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS turns (
                id TEXT PRIMARY KEY,
                agent_id TEXT NOT NULL,
                author TEXT NOT NULL,
                message TEXT NOT NULL,
                reply TEXT NOT NULL,
                timestamp INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create turns table")?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_turns_agent ON turns(agent_id, timestamp)")
            .execute(&self.pool)
            .await
            .context("Failed to create turns index")?;

        Ok(())
    }
}

#[async_trait]
impl AgentStore for SqliteStore {
    async fn load(&self, agent_id: &str) -> Result<Option<AgentRecord>> {
        let row = sqlx::query("SELECT state FROM agents WHERE id = ?")
            .bind(agent_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to load agent state")?;

        match row {
            Some(row) => {
                let json: String = row.get("state");
                let record: AgentRecord = serde_json::from_str(&json)
                    .context("Persisted agent state is not valid JSON")?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    async fn save(&self, agent_id: &str, record: &AgentRecord) -> Result<()> {
        let json = serde_json::to_string(record).context("Failed to serialize agent state")?;
        sqlx::query(
            "INSERT INTO agents (id, state, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET state = excluded.state, updated_at = excluded.updated_at",
        )
        .bind(agent_id)
        .bind(&json)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .context("Failed to save agent state")?;
        Ok(())
    }

    async fn append_turn(&self, agent_id: &str, turn: &TurnLog) -> Result<()> {
        sqlx::query(
            "INSERT INTO turns (id, agent_id, author, message, reply, timestamp)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(turn.id.to_string())
        .bind(agent_id)
        .bind(&turn.author)
        .bind(&turn.message)
        .bind(&turn.reply)
        .bind(turn.timestamp)
        .execute(&self.pool)
        .await
        .context("Failed to append turn")?;
        Ok(())
    }

    async fn recent_turns(&self, agent_id: &str, limit: u32) -> Result<Vec<TurnLog>> {
        let rows = sqlx::query(
            "SELECT id, author, message, reply, timestamp FROM turns
             WHERE agent_id = ? ORDER BY timestamp DESC LIMIT ?",
        )
        .bind(agent_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch recent turns")?;

        let mut turns: Vec<TurnLog> = rows
            .into_iter()
            .map(|row| {
                let id: String = row.get("id");
                TurnLog {
                    id: Uuid::parse_str(&id).unwrap_or_else(|_| Uuid::nil()),
                    author: row.get("author"),
                    message: row.get("message"),
                    reply: row.get("reply"),
                    timestamp: row.get("timestamp"),
                }
            })
            .collect();
        turns.reverse(); // newest last
        Ok(turns)
    }

    async fn factory_reset(&self, agent_id: &str) -> Result<()> {
        let mut tx = self.pool.begin().await.context("Failed to begin reset")?;
        sqlx::query("DELETE FROM turns WHERE agent_id = ?")
            .bind(agent_id)
            .execute(&mut *tx)
            .await
            .context("Failed to clear turn history")?;
        sqlx::query("DELETE FROM agents WHERE id = ?")
            .bind(agent_id)
            .execute(&mut *tx)
            .await
            .context("Failed to clear agent state")?;
        tx.commit().await.context("Failed to commit reset")?;
        tracing::info!(agent_id, "factory reset committed");
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
