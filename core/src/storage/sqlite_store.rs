use crate::storage::SettingsStore;
use anyhow::Context;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

const DB_FILE_NAME: &str = "netsnare_settings.sqlite";

/// Settings persisted in a SQLite key/value table
pub struct SqliteSettingsStore {
    db: Arc<Mutex<Connection>>,
    db_path: PathBuf,
}

impl SqliteSettingsStore {
    pub fn new(base_path: &Path) -> anyhow::Result<Self> {
        if !base_path.exists() {
            fs::create_dir_all(base_path)
                .with_context(|| format!("creating storage directory {:?}", base_path))?;
        }
        let db_path = base_path.join(DB_FILE_NAME);
        let conn = Connection::open(&db_path)
            .with_context(|| format!("opening database at {:?}", db_path))?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );
            ",
        )?;

        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
            db_path,
        })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}

#[async_trait]
impl SettingsStore for SqliteSettingsStore {
    async fn load_raw(&self, key: &str) -> anyhow::Result<Option<Value>> {
        let db = Arc::clone(&self.db);
        let key = key.to_string();
        let text = tokio::task::spawn_blocking({
            let key = key.clone();
            move || -> anyhow::Result<Option<String>> {
                let conn = db.lock().expect("db mutex poisoned");
                conn.query_row(
                    "SELECT value FROM settings WHERE key = ?1",
                    params![key],
                    |row| row.get::<_, String>(0),
                )
                .optional()
                .context("reading setting")
            }
        })
        .await??;

        Ok(text.and_then(|text| match serde_json::from_str(&text) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!("Setting {} holds unreadable JSON, ignoring: {}", key, err);
                None
            }
        }))
    }

    async fn save_raw(&self, key: &str, value: Value) -> anyhow::Result<()> {
        let db = Arc::clone(&self.db);
        let key = key.to_string();
        let payload = serde_json::to_string(&value)?;
        tokio::task::spawn_blocking(move || {
            let conn = db.lock().expect("db mutex poisoned");
            conn.execute(
                "INSERT OR REPLACE INTO settings (key, value, updated_at)
                 VALUES (?1, ?2, ?3)",
                params![key, payload, chrono::Utc::now().timestamp_millis()],
            )
            .context("writing setting")
        })
        .await??;
        Ok(())
    }
}
