// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Persistent scan preferences backed by SQLite.
//
// Stores the last selected scan mode and the effective fallback
// configuration per profile, so a relaunched app resumes with the settings
// the user (or a remote config push) left behind.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use tracing::{debug, info, instrument};

use veriscan_core::config::FallbackConfig;
use veriscan_core::error::{Result, VeriscanError};
use veriscan_core::types::ScanMode;

/// SQLite schema for the prefs table.
const CREATE_TABLE_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS prefs (
        profile TEXT PRIMARY KEY,
        scan_mode TEXT NOT NULL,
        fallback_config TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
"#;

/// One profile's stored preferences.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanPrefs {
    pub mode: ScanMode,
    pub config: FallbackConfig,
    pub updated_at: DateTime<Utc>,
}

/// Persistent preference store backed by a SQLite database.
///
/// All methods are synchronous because `rusqlite` does not support async
/// natively.  In an async context, wrap calls in `tokio::task::spawn_blocking`.
pub struct PrefsStore {
    conn: Connection,
}

impl PrefsStore {
    /// Open (or create) the preferences database at the given path.
    ///
    /// Applies WAL journal mode for better concurrent-read performance on
    /// mobile devices and creates the `prefs` table if it does not exist.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())
            .map_err(|e| VeriscanError::Database(format!("open: {e}")))?;

        // WAL mode is better for concurrent readers (UI thread + background
        // sync) and survives unclean shutdowns more gracefully.
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| VeriscanError::Database(format!("WAL pragma: {e}")))?;

        conn.execute_batch(CREATE_TABLE_SQL)
            .map_err(|e| VeriscanError::Database(format!("create table: {e}")))?;

        info!("preferences database opened");
        Ok(Self { conn })
    }

    /// Open an in-memory database (useful for tests).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| VeriscanError::Database(format!("open in-memory: {e}")))?;

        conn.execute_batch(CREATE_TABLE_SQL)
            .map_err(|e| VeriscanError::Database(format!("create table: {e}")))?;

        debug!("in-memory preferences database opened");
        Ok(Self { conn })
    }

    /// Store (or replace) the preferences for a profile.
    #[instrument(skip(self, config))]
    pub fn save(&self, profile: &str, mode: ScanMode, config: &FallbackConfig) -> Result<()> {
        let mode_json = serde_json::to_string(&mode)
            .map_err(|e| VeriscanError::Database(format!("serialize mode: {e}")))?;
        let config_json = serde_json::to_string(config)
            .map_err(|e| VeriscanError::Database(format!("serialize config: {e}")))?;
        let now = Utc::now().to_rfc3339();

        self.conn
            .execute(
                "INSERT INTO prefs (profile, scan_mode, fallback_config, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(profile) DO UPDATE SET
                     scan_mode = excluded.scan_mode,
                     fallback_config = excluded.fallback_config,
                     updated_at = excluded.updated_at",
                params![profile, mode_json, config_json, now],
            )
            .map_err(|e| VeriscanError::Database(format!("save prefs: {e}")))?;

        debug!(profile, "preferences saved");
        Ok(())
    }

    /// Retrieve the preferences for a profile.
    ///
    /// Returns `None` if the profile has never been saved.
    #[instrument(skip(self))]
    pub fn load(&self, profile: &str) -> Result<Option<ScanPrefs>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT scan_mode, fallback_config, updated_at
                 FROM prefs WHERE profile = ?1",
            )
            .map_err(|e| VeriscanError::Database(format!("prepare load: {e}")))?;

        let mut rows = stmt
            .query_map(params![profile], row_to_prefs)
            .map_err(|e| VeriscanError::Database(format!("query load: {e}")))?;

        match rows.next() {
            Some(Ok(prefs)) => Ok(Some(prefs)),
            Some(Err(e)) => Err(VeriscanError::Database(format!("row parse: {e}"))),
            None => Ok(None),
        }
    }

    /// Preferences to boot the engine with: the stored profile if present,
    /// otherwise defaults.  A stored configuration that no longer validates
    /// (e.g. written by a newer build) also falls back to defaults rather
    /// than failing startup.
    #[instrument(skip(self))]
    pub fn load_initial(&self, profile: &str) -> Result<ScanPrefs> {
        if let Some(prefs) = self.load(profile)? {
            if prefs.config.validate().is_ok() {
                return Ok(prefs);
            }
            tracing::warn!(profile, "stored config failed validation — using defaults");
        }
        Ok(ScanPrefs {
            mode: ScanMode::default(),
            config: FallbackConfig::default(),
            updated_at: Utc::now(),
        })
    }

    /// Delete a profile's preferences.
    ///
    /// Returns `Ok(())` even if the profile did not exist (idempotent).
    #[instrument(skip(self))]
    pub fn delete(&self, profile: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM prefs WHERE profile = ?1", params![profile])
            .map_err(|e| VeriscanError::Database(format!("delete prefs: {e}")))?;

        debug!(profile, "preferences deleted");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

/// Map a SQLite row to `ScanPrefs`.
///
/// Column indices must match the SELECT order used in the query methods above.
fn row_to_prefs(row: &rusqlite::Row<'_>) -> rusqlite::Result<ScanPrefs> {
    let mode_json: String = row.get(0)?;
    let config_json: String = row.get(1)?;
    let updated_at_str: String = row.get(2)?;

    let mode: ScanMode = serde_json::from_str(&mode_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let config: FallbackConfig = serde_json::from_str(&config_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let updated_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&updated_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(ScanPrefs {
        mode,
        config,
        updated_at,
    })
}
