use crate::models::{Account, Settings};
use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, warn};

pub const ACCOUNTS_KEY: &str = "yemen_net_accounts_v2";
const SETTINGS_SINGLETON_ID: i64 = 1;

/// SQLite-backed store. One connection is opened on first use and kept.
#[derive(Debug)]
pub struct AppStore {
    pub base_dir: PathBuf,
    pub db_path: PathBuf,
    conn: Mutex<Option<Connection>>,
}

impl AppStore {
    pub fn new(base_dir: PathBuf) -> Self {
        let db_path = base_dir.join("yemen-net.db");
        Self {
            base_dir,
            db_path,
            conn: Mutex::new(None),
        }
    }

    pub fn init(&self) -> Result<()> {
        std::fs::create_dir_all(&self.base_dir)
            .with_context(|| format!("failed to create data dir: {}", self.base_dir.display()))?;
        self.with_conn(|conn| {
            conn.execute_batch(
                r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            CREATE TABLE IF NOT EXISTS kv_store (
              key TEXT PRIMARY KEY,
              value TEXT NOT NULL,
              updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS app_settings (
              id INTEGER PRIMARY KEY CHECK (id = 1),
              refresh_interval_minutes INTEGER NOT NULL DEFAULT 60,
              notification_threshold_gb REAL NOT NULL DEFAULT 5,
              updated_at TEXT NOT NULL
            );
        "#,
            )
            .context("failed to initialize database")?;
            conn.execute(
                r#"
            INSERT INTO app_settings(id, updated_at)
            VALUES (?1, ?2)
            ON CONFLICT(id) DO NOTHING
        "#,
                params![SETTINGS_SINGLETON_ID, now()],
            )
            .context("failed to seed settings")?;
            Ok(())
        })
    }

    fn open_conn(&self) -> Result<Connection> {
        Connection::open(&self.db_path)
            .with_context(|| format!("failed to open database: {}", self.db_path.display()))
    }

    /// Runs `f` on the cached connection, opening it if this is the first use.
    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let mut slot = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        let conn = match slot.take() {
            Some(conn) => conn,
            None => self.open_conn()?,
        };
        let result = f(&conn);
        *slot = Some(conn);
        result
    }

    pub fn get_blob(&self, key: &str) -> Result<Option<String>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .with_context(|| format!("failed to read key {key}"))
        })
    }

    pub fn put_blob(&self, key: &str, value: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                r#"
            INSERT INTO kv_store(key, value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
                params![key, value, now()],
            )
            .with_context(|| format!("failed to write key {key}"))?;
            Ok(())
        })
    }

    /// Never fails: an absent, unreadable or corrupt blob yields an empty list.
    pub fn load_accounts(&self) -> Vec<Account> {
        let blob = match self.get_blob(ACCOUNTS_KEY) {
            Ok(Some(blob)) => blob,
            Ok(None) => return Vec::new(),
            Err(error) => {
                warn!(error = %error, "account blob unreadable, starting empty");
                return Vec::new();
            }
        };
        match serde_json::from_str::<Vec<Account>>(&blob) {
            Ok(accounts) => {
                debug!(count = accounts.len(), "loaded accounts");
                accounts
            }
            Err(error) => {
                warn!(error = %error, "discarding corrupt account blob");
                Vec::new()
            }
        }
    }

    pub fn save_accounts(&self, accounts: &[Account]) -> Result<()> {
        let blob = serde_json::to_string(accounts).context("failed to serialize accounts")?;
        self.put_blob(ACCOUNTS_KEY, &blob)
    }

    pub fn load_settings(&self) -> Settings {
        let loaded = self.with_conn(|conn| {
            conn.query_row(
                r#"
                SELECT refresh_interval_minutes, notification_threshold_gb
                FROM app_settings WHERE id = ?1
                "#,
                params![SETTINGS_SINGLETON_ID],
                |row| {
                    Ok(Settings {
                        refresh_interval_minutes: row.get::<_, i64>(0)?.clamp(0, u32::MAX as i64)
                            as u32,
                        notification_threshold_gb: row.get(1)?,
                    })
                },
            )
            .optional()
            .context("failed to read settings")
        });
        match loaded {
            Ok(Some(settings)) => settings,
            Ok(None) => Settings::default(),
            Err(error) => {
                warn!(error = %error, "settings unreadable, using defaults");
                Settings::default()
            }
        }
    }

    pub fn save_settings(&self, settings: &Settings) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                r#"
            INSERT INTO app_settings(id, refresh_interval_minutes, notification_threshold_gb, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(id) DO UPDATE SET
              refresh_interval_minutes = excluded.refresh_interval_minutes,
              notification_threshold_gb = excluded.notification_threshold_gb,
              updated_at = excluded.updated_at
            "#,
                params![
                    SETTINGS_SINGLETON_ID,
                    settings.refresh_interval_minutes as i64,
                    settings.notification_threshold_gb,
                    now()
                ],
            )
            .context("failed to update settings")?;
            Ok(())
        })
    }
}

pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
        .join("yemen-net-dashboard")
}

pub fn now() -> String {
    Utc::now().to_rfc3339()
}
