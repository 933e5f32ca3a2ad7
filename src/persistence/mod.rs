//! SQLite persistence for pair state.
//!
//! Durable storage for:
//! - Which asset each pair currently holds
//! - A history of executed rotations

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

/// One row of rotation history.
#[derive(Debug, Clone)]
pub struct RotationRecord {
    pub timestamp: DateTime<Utc>,
    pub pair: String,
    pub from_asset: String,
    pub to_asset: String,
    pub sold_qty: Decimal,
    pub bought_qty: Option<Decimal>,
    /// Terminal phase the rotation reached (e.g. "RotationComplete")
    pub phase: String,
}

/// SQLite-backed store for pair state.
pub struct StateStore {
    conn: Connection,
}

impl StateStore {
    /// Open (and initialize if needed) the state database.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path.as_ref())
            .with_context(|| format!("Failed to open database at {:?}", db_path.as_ref()))?;

        let store = Self { conn };
        store.init_schema()?;

        info!("State store initialized at {:?}", db_path.as_ref());
        Ok(store)
    }

    /// Initialize database schema.
    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            -- Which asset each pair currently holds
            CREATE TABLE IF NOT EXISTS pair_states (
                name TEXT PRIMARY KEY,
                current_asset TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            -- Executed rotations (sell leg committed)
            CREATE TABLE IF NOT EXISTS rotations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                pair TEXT NOT NULL,
                from_asset TEXT NOT NULL,
                to_asset TEXT NOT NULL,
                sold_qty TEXT NOT NULL,
                bought_qty TEXT,
                phase TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_rotations_timestamp ON rotations(timestamp);
            CREATE INDEX IF NOT EXISTS idx_rotations_pair ON rotations(pair);
            "#,
        )?;

        debug!("Database schema initialized");
        Ok(())
    }

    /// Load the held asset for a pair, if one has been recorded.
    pub fn load(&self, name: &str) -> Result<Option<String>> {
        let asset = self
            .conn
            .query_row(
                "SELECT current_asset FROM pair_states WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(asset)
    }

    /// Load the held asset for a pair, initializing it on first reference.
    pub fn load_or_init(&self, name: &str, default_asset: &str) -> Result<String> {
        if let Some(asset) = self.load(name)? {
            return Ok(asset);
        }

        self.save(name, default_asset)?;
        debug!(pair = %name, asset = %default_asset, "Initialized pair state");
        Ok(default_asset.to_string())
    }

    /// Persist the held asset for a pair.
    pub fn save(&self, name: &str, asset: &str) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO pair_states (name, current_asset, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(name) DO UPDATE SET
                current_asset = ?2,
                updated_at = ?3
            "#,
            params![name, asset, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// All known pair states, for the status command.
    pub fn all_states(&self) -> Result<Vec<(String, String, DateTime<Utc>)>> {
        let mut stmt = self.conn.prepare(
            "SELECT name, current_asset, updated_at FROM pair_states ORDER BY name",
        )?;

        let states: Vec<(String, String, DateTime<Utc>)> = stmt
            .query_map([], |row| {
                let name: String = row.get(0)?;
                let asset: String = row.get(1)?;
                let updated: String = row.get(2)?;
                Ok((
                    name,
                    asset,
                    DateTime::parse_from_rfc3339(&updated)
                        .map(|dt| dt.with_timezone(&Utc))
                        .unwrap_or_else(|_| Utc::now()),
                ))
            })?
            .filter_map(|r| r.ok())
            .collect();

        Ok(states)
    }

    /// Record an executed rotation (the sell leg committed).
    pub fn record_rotation(
        &self,
        pair: &str,
        from_asset: &str,
        to_asset: &str,
        sold_qty: Decimal,
        bought_qty: Option<Decimal>,
        phase: &str,
    ) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO rotations (timestamp, pair, from_asset, to_asset, sold_qty, bought_qty, phase)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                Utc::now().to_rfc3339(),
                pair,
                from_asset,
                to_asset,
                sold_qty.to_string(),
                bought_qty.map(|q| q.to_string()),
                phase,
            ],
        )?;
        Ok(())
    }

    /// Most recent rotations, newest first.
    pub fn recent_rotations(&self, limit: usize) -> Result<Vec<RotationRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT timestamp, pair, from_asset, to_asset, sold_qty, bought_qty, phase
            FROM rotations
            ORDER BY id DESC
            LIMIT ?1
            "#,
        )?;

        let records: Vec<RotationRecord> = stmt
            .query_map([limit], |row| {
                let ts: String = row.get(0)?;
                let sold: String = row.get(4)?;
                let bought: Option<String> = row.get(5)?;
                Ok(RotationRecord {
                    timestamp: DateTime::parse_from_rfc3339(&ts)
                        .map(|dt| dt.with_timezone(&Utc))
                        .unwrap_or_else(|_| Utc::now()),
                    pair: row.get(1)?,
                    from_asset: row.get(2)?,
                    to_asset: row.get(3)?,
                    sold_qty: Decimal::from_str(&sold).unwrap_or_default(),
                    bought_qty: bought.and_then(|q| Decimal::from_str(&q).ok()),
                    phase: row.get(6)?,
                })
            })?
            .filter_map(|r| r.ok())
            .collect();

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_load_or_init_defaults_to_coin_a() {
        let store = StateStore::new(":memory:").unwrap();

        assert_eq!(store.load("HBAR_DOGE").unwrap(), None);
        assert_eq!(store.load_or_init("HBAR_DOGE", "HBAR").unwrap(), "HBAR");
        // Second call reads the persisted row, not the default.
        assert_eq!(store.load_or_init("HBAR_DOGE", "DOGE").unwrap(), "HBAR");
    }

    #[test]
    fn test_save_overwrites() {
        let store = StateStore::new(":memory:").unwrap();

        store.save("HBAR_DOGE", "HBAR").unwrap();
        store.save("HBAR_DOGE", "DOGE").unwrap();
        assert_eq!(store.load("HBAR_DOGE").unwrap(), Some("DOGE".to_string()));

        let states = store.all_states().unwrap();
        assert_eq!(states.len(), 1);
        assert_eq!(states[0].1, "DOGE");
    }

    #[test]
    fn test_rotation_history_roundtrip() {
        let store = StateStore::new(":memory:").unwrap();

        store
            .record_rotation(
                "HBAR_DOGE",
                "HBAR",
                "DOGE",
                dec!(100),
                Some(dec!(300)),
                "RotationComplete",
            )
            .unwrap();
        store
            .record_rotation("HBAR_DOGE", "DOGE", "HBAR", dec!(300), None, "BuyAttempted")
            .unwrap();

        let records = store.recent_rotations(10).unwrap();
        assert_eq!(records.len(), 2);
        // Newest first
        assert_eq!(records[0].to_asset, "HBAR");
        assert_eq!(records[0].bought_qty, None);
        assert_eq!(records[1].sold_qty, dec!(100));
        assert_eq!(records[1].bought_qty, Some(dec!(300)));
    }
}
