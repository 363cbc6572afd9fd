// Copyright (c) 2024-2026 The Courier Authors
//
// SPDX-License-Identifier: MIT
//! Persistence abstraction for paused-execution state. An in-memory backend
//! for tests and single-process use; a relational (sqlite) backend for
//! durable, tenant-scoped storage.
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use courier_model::Message;
use rusqlite::params;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::delegation::PendingToolCall;

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("checkpoint not found: {0}")]
    NotFound(String),
    #[error("storage error: {0}")]
    Storage(String),
}

/// Frozen execution state captured at an interrupt, keyed by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub id: String,
    pub thread_id: String,
    pub agent_name: String,
    pub tenant_id: String,
    pub session_id: String,
    pub messages: Vec<Message>,
    pub pending_tools: Vec<PendingToolCall>,
    pub interrupt_type: String,
    pub interrupt_data: Value,
    pub provider_continuity_token: Option<String>,
    pub created_at: i64,
}

#[async_trait]
pub trait Checkpointer: Send + Sync {
    async fn save(&self, tenant_id: &str, cp: Checkpoint) -> Result<String, CheckpointError>;
    async fn load(&self, tenant_id: &str, id: &str) -> Result<Checkpoint, CheckpointError>;
    async fn load_by_thread(
        &self,
        tenant_id: &str,
        thread_id: &str,
    ) -> Result<Checkpoint, CheckpointError>;
    async fn delete(&self, tenant_id: &str, id: &str) -> Result<(), CheckpointError>;
    /// Atomic load-then-delete; used on resume to guarantee at-most-once replay.
    async fn load_and_delete(&self, tenant_id: &str, id: &str) -> Result<Checkpoint, CheckpointError>;
}

/// In-memory checkpointer guarded by a single read/write lock. Checkpoints
/// are serialized to JSON and back across the boundary so a caller cannot
/// mutate the stored copy through a held reference.
#[derive(Default)]
pub struct InMemoryCheckpointer {
    store: RwLock<HashMap<String, (String, Vec<u8>)>>,
}

impl InMemoryCheckpointer {
    pub fn new() -> Self {
        Self::default()
    }

    fn encode(cp: &Checkpoint) -> Vec<u8> {
        serde_json::to_vec(cp).expect("Checkpoint always serializes")
    }

    fn decode(bytes: &[u8]) -> Checkpoint {
        serde_json::from_slice(bytes).expect("stored checkpoint bytes are always valid")
    }
}

#[async_trait]
impl Checkpointer for InMemoryCheckpointer {
    async fn save(&self, tenant_id: &str, cp: Checkpoint) -> Result<String, CheckpointError> {
        let id = cp.id.clone();
        let bytes = Self::encode(&cp);
        self.store
            .write()
            .await
            .insert(id.clone(), (tenant_id.to_string(), bytes));
        Ok(id)
    }

    async fn load(&self, tenant_id: &str, id: &str) -> Result<Checkpoint, CheckpointError> {
        let store = self.store.read().await;
        match store.get(id) {
            Some((owner, bytes)) if owner == tenant_id => Ok(Self::decode(bytes)),
            _ => Err(CheckpointError::NotFound(id.to_string())),
        }
    }

    async fn load_by_thread(
        &self,
        tenant_id: &str,
        thread_id: &str,
    ) -> Result<Checkpoint, CheckpointError> {
        let store = self.store.read().await;
        store
            .values()
            .filter(|(owner, _)| owner == tenant_id)
            .map(|(_, bytes)| Self::decode(bytes))
            .filter(|cp| cp.thread_id == thread_id)
            .max_by_key(|cp| cp.created_at)
            .ok_or_else(|| CheckpointError::NotFound(thread_id.to_string()))
    }

    async fn delete(&self, tenant_id: &str, id: &str) -> Result<(), CheckpointError> {
        let mut store = self.store.write().await;
        match store.get(id) {
            Some((owner, _)) if owner == tenant_id => {
                store.remove(id);
                Ok(())
            }
            _ => Err(CheckpointError::NotFound(id.to_string())),
        }
    }

    async fn load_and_delete(&self, tenant_id: &str, id: &str) -> Result<Checkpoint, CheckpointError> {
        let mut store = self.store.write().await;
        match store.get(id) {
            Some((owner, _)) if owner == tenant_id => {
                let (_, bytes) = store.remove(id).unwrap();
                Ok(Self::decode(&bytes))
            }
            _ => Err(CheckpointError::NotFound(id.to_string())),
        }
    }
}

/// Relational (sqlite) checkpointer. Every operation is filtered on
/// `tenant_id`; `load_and_delete` runs in a single transaction.
pub struct SqliteCheckpointer {
    path: std::path::PathBuf,
}

impl SqliteCheckpointer {
    pub fn new(path: impl Into<std::path::PathBuf>) -> Result<Self, CheckpointError> {
        let path = path.into();
        let conn = rusqlite::Connection::open(&path).map_err(|e| CheckpointError::Storage(e.to_string()))?;
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS checkpoints (
                id TEXT PRIMARY KEY,
                tenant_id TEXT NOT NULL,
                thread_id TEXT NOT NULL,
                agent_name TEXT NOT NULL,
                messages TEXT NOT NULL,
                pending_tools TEXT NOT NULL,
                interrupt_type TEXT NOT NULL,
                interrupt_data TEXT,
                session_id TEXT NOT NULL,
                provider_continuity_token TEXT,
                created_at INTEGER NOT NULL
            )
            "#,
            [],
        )
        .map_err(|e| CheckpointError::Storage(e.to_string()))?;
        Ok(Self { path })
    }

    fn open(&self) -> Result<rusqlite::Connection, CheckpointError> {
        rusqlite::Connection::open(&self.path).map_err(|e| CheckpointError::Storage(e.to_string()))
    }

    fn row_to_checkpoint(row: &rusqlite::Row) -> rusqlite::Result<Checkpoint> {
        let messages_json: String = row.get("messages")?;
        let pending_json: String = row.get("pending_tools")?;
        let interrupt_data_json: Option<String> = row.get("interrupt_data")?;
        Ok(Checkpoint {
            id: row.get("id")?,
            tenant_id: row.get("tenant_id")?,
            thread_id: row.get("thread_id")?,
            agent_name: row.get("agent_name")?,
            session_id: row.get("session_id")?,
            messages: serde_json::from_str(&messages_json).unwrap_or_default(),
            pending_tools: serde_json::from_str(&pending_json).unwrap_or_default(),
            interrupt_type: row.get("interrupt_type")?,
            interrupt_data: interrupt_data_json
                .and_then(|s| serde_json::from_str(&s).ok())
                .unwrap_or(Value::Null),
            provider_continuity_token: row.get("provider_continuity_token")?,
            created_at: row.get("created_at")?,
        })
    }
}

#[async_trait]
impl Checkpointer for SqliteCheckpointer {
    async fn save(&self, tenant_id: &str, cp: Checkpoint) -> Result<String, CheckpointError> {
        let tenant_id = tenant_id.to_string();
        let path = self.path.clone();
        let id = cp.id.clone();
        tokio::task::spawn_blocking(move || {
            let conn = rusqlite::Connection::open(&path).map_err(|e| CheckpointError::Storage(e.to_string()))?;
            conn.execute(
                r#"
                INSERT OR REPLACE INTO checkpoints
                (id, tenant_id, thread_id, agent_name, messages, pending_tools,
                 interrupt_type, interrupt_data, session_id, provider_continuity_token, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                "#,
                params![
                    cp.id,
                    tenant_id,
                    cp.thread_id,
                    cp.agent_name,
                    serde_json::to_string(&cp.messages).map_err(|e| CheckpointError::Storage(e.to_string()))?,
                    serde_json::to_string(&cp.pending_tools).map_err(|e| CheckpointError::Storage(e.to_string()))?,
                    cp.interrupt_type,
                    serde_json::to_string(&cp.interrupt_data).ok(),
                    cp.session_id,
                    cp.provider_continuity_token,
                    cp.created_at,
                ],
            )
            .map_err(|e| CheckpointError::Storage(e.to_string()))?;
            Ok(())
        })
        .await
        .map_err(|e| CheckpointError::Storage(e.to_string()))??;
        Ok(id)
    }

    async fn load(&self, tenant_id: &str, id: &str) -> Result<Checkpoint, CheckpointError> {
        let tenant_id = tenant_id.to_string();
        let id = id.to_string();
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            let conn = rusqlite::Connection::open(&path).map_err(|e| CheckpointError::Storage(e.to_string()))?;
            conn.query_row(
                "SELECT * FROM checkpoints WHERE id = ?1 AND tenant_id = ?2",
                params![id, tenant_id],
                Self::row_to_checkpoint,
            )
            .map_err(|_| CheckpointError::NotFound(id.clone()))
        })
        .await
        .map_err(|e| CheckpointError::Storage(e.to_string()))?
    }

    async fn load_by_thread(
        &self,
        tenant_id: &str,
        thread_id: &str,
    ) -> Result<Checkpoint, CheckpointError> {
        let tenant_id = tenant_id.to_string();
        let thread_id = thread_id.to_string();
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            let conn = rusqlite::Connection::open(&path).map_err(|e| CheckpointError::Storage(e.to_string()))?;
            conn.query_row(
                "SELECT * FROM checkpoints WHERE tenant_id = ?1 AND thread_id = ?2 ORDER BY created_at DESC LIMIT 1",
                params![tenant_id, thread_id],
                Self::row_to_checkpoint,
            )
            .map_err(|_| CheckpointError::NotFound(thread_id.clone()))
        })
        .await
        .map_err(|e| CheckpointError::Storage(e.to_string()))?
    }

    async fn delete(&self, tenant_id: &str, id: &str) -> Result<(), CheckpointError> {
        let tenant_id = tenant_id.to_string();
        let id = id.to_string();
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            let conn = rusqlite::Connection::open(&path).map_err(|e| CheckpointError::Storage(e.to_string()))?;
            let affected = conn
                .execute(
                    "DELETE FROM checkpoints WHERE id = ?1 AND tenant_id = ?2",
                    params![id, tenant_id],
                )
                .map_err(|e| CheckpointError::Storage(e.to_string()))?;
            if affected == 0 {
                Err(CheckpointError::NotFound(id.clone()))
            } else {
                Ok(())
            }
        })
        .await
        .map_err(|e| CheckpointError::Storage(e.to_string()))?
    }

    async fn load_and_delete(&self, tenant_id: &str, id: &str) -> Result<Checkpoint, CheckpointError> {
        let tenant_id = tenant_id.to_string();
        let id = id.to_string();
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn =
                rusqlite::Connection::open(&path).map_err(|e| CheckpointError::Storage(e.to_string()))?;
            let tx = conn
                .transaction()
                .map_err(|e| CheckpointError::Storage(e.to_string()))?;
            let cp = tx
                .query_row(
                    "SELECT * FROM checkpoints WHERE id = ?1 AND tenant_id = ?2",
                    params![id, tenant_id],
                    Self::row_to_checkpoint,
                )
                .map_err(|_| CheckpointError::NotFound(id.clone()))?;
            tx.execute(
                "DELETE FROM checkpoints WHERE id = ?1 AND tenant_id = ?2",
                params![id, tenant_id],
            )
            .map_err(|e| CheckpointError::Storage(e.to_string()))?;
            tx.commit().map_err(|e| CheckpointError::Storage(e.to_string()))?;
            Ok(cp)
        })
        .await
        .map_err(|e| CheckpointError::Storage(e.to_string()))?
    }
}

/// Shared handle to any checkpointer backend.
pub type SharedCheckpointer = Arc<dyn Checkpointer>;

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(id: &str, tenant: &str, thread: &str, created_at: i64) -> Checkpoint {
        Checkpoint {
            id: id.to_string(),
            thread_id: thread.to_string(),
            agent_name: "main".to_string(),
            tenant_id: tenant.to_string(),
            session_id: "sess-1".to_string(),
            messages: vec![],
            pending_tools: vec![],
            interrupt_type: "ask_user_question".to_string(),
            interrupt_data: Value::Null,
            provider_continuity_token: None,
            created_at,
        }
    }

    #[tokio::test]
    async fn save_then_load_roundtrips() {
        let cp_store = InMemoryCheckpointer::new();
        let id = cp_store.save("tenant-a", sample("cp1", "tenant-a", "t1", 1)).await.unwrap();
        let loaded = cp_store.load("tenant-a", &id).await.unwrap();
        assert_eq!(loaded.thread_id, "t1");
    }

    #[tokio::test]
    async fn load_and_delete_is_atomic() {
        let cp_store = InMemoryCheckpointer::new();
        cp_store.save("tenant-a", sample("cp1", "tenant-a", "t1", 1)).await.unwrap();
        cp_store.load_and_delete("tenant-a", "cp1").await.unwrap();
        assert!(matches!(
            cp_store.load("tenant-a", "cp1").await,
            Err(CheckpointError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn tenant_isolation_on_load() {
        let cp_store = InMemoryCheckpointer::new();
        cp_store.save("tenant-a", sample("cp1", "tenant-a", "t1", 1)).await.unwrap();
        assert!(matches!(
            cp_store.load("tenant-b", "cp1").await,
            Err(CheckpointError::NotFound(_))
        ));
        assert!(matches!(
            cp_store.load_by_thread("tenant-b", "t1").await,
            Err(CheckpointError::NotFound(_))
        ));
        assert!(matches!(
            cp_store.delete("tenant-b", "cp1").await,
            Err(CheckpointError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn load_by_thread_returns_latest() {
        let cp_store = InMemoryCheckpointer::new();
        cp_store.save("tenant-a", sample("cp1", "tenant-a", "t1", 1)).await.unwrap();
        cp_store.save("tenant-a", sample("cp2", "tenant-a", "t1", 2)).await.unwrap();
        let latest = cp_store.load_by_thread("tenant-a", "t1").await.unwrap();
        assert_eq!(latest.id, "cp2");
    }

    #[tokio::test]
    async fn delete_unknown_is_not_found() {
        let cp_store = InMemoryCheckpointer::new();
        assert!(matches!(
            cp_store.delete("tenant-a", "nope").await,
            Err(CheckpointError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn sqlite_backend_save_load_and_delete_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("checkpoints.sqlite");
        let cp_store = SqliteCheckpointer::new(&db_path).unwrap();
        cp_store.save("tenant-a", sample("cp1", "tenant-a", "t1", 1)).await.unwrap();
        let loaded = cp_store.load("tenant-a", "cp1").await.unwrap();
        assert_eq!(loaded.thread_id, "t1");
        cp_store.load_and_delete("tenant-a", "cp1").await.unwrap();
        assert!(matches!(
            cp_store.load("tenant-a", "cp1").await,
            Err(CheckpointError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn sqlite_backend_enforces_tenant_isolation() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("checkpoints.sqlite");
        let cp_store = SqliteCheckpointer::new(&db_path).unwrap();
        cp_store.save("tenant-a", sample("cp1", "tenant-a", "t1", 1)).await.unwrap();
        assert!(matches!(
            cp_store.load("tenant-b", "cp1").await,
            Err(CheckpointError::NotFound(_))
        ));
    }
}
