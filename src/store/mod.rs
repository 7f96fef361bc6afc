use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// Thread-safe per-bot SQLite store (single connection with mutex).
///
/// Holds the opaque session state the browser-automation adapter needs to
/// resume (cookies, access token), the last bankroll snapshot, and an audit
/// log of placed bets.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

const KEY_SESSION_COOKIES: &str = "session_cookies";
const KEY_ACCESS_TOKEN: &str = "access_token";
const KEY_BANKROLL: &str = "bankroll";

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS kv_store (
    key        TEXT PRIMARY KEY,
    value      TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS placed_bets (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    event_id  TEXT NOT NULL,
    market    TEXT NOT NULL,
    selection TEXT NOT NULL,
    odds      REAL NOT NULL,
    stake     REAL NOT NULL,
    edge      REAL NOT NULL,
    dry_run   INTEGER NOT NULL,
    placed_at TEXT NOT NULL
);
";

/// One row of the placed-bet audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacedBet {
    pub id: Option<i64>,
    pub event_id: String,
    pub market: String,
    pub selection: String,
    pub odds: f64,
    pub stake: f64,
    pub edge: f64,
    pub dry_run: bool,
    pub placed_at: DateTime<Utc>,
}

impl Store {
    /// Open (or create) the store at the given path. `:memory:` works too.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Store {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().unwrap();
        let value = conn
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, Utc::now()],
        )?;
        Ok(())
    }

    pub fn get_session_cookies(&self) -> Result<Option<String>> {
        self.get(KEY_SESSION_COOKIES)
    }

    pub fn set_session_cookies(&self, cookies: &str) -> Result<()> {
        self.set(KEY_SESSION_COOKIES, cookies)
    }

    pub fn get_access_token(&self) -> Result<Option<String>> {
        self.get(KEY_ACCESS_TOKEN)
    }

    pub fn set_access_token(&self, token: &str) -> Result<()> {
        self.set(KEY_ACCESS_TOKEN, token)
    }

    pub fn get_bankroll_snapshot(&self) -> Result<Option<f64>> {
        Ok(self.get(KEY_BANKROLL)?.and_then(|v| v.parse().ok()))
    }

    pub fn set_bankroll_snapshot(&self, bankroll: f64) -> Result<()> {
        self.set(KEY_BANKROLL, &bankroll.to_string())
    }

    /// Append one placed bet to the audit log.
    pub fn record_bet(&self, bet: &PlacedBet) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO placed_bets (event_id, market, selection, odds, stake, edge, dry_run, placed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                bet.event_id,
                bet.market,
                bet.selection,
                bet.odds,
                bet.stake,
                bet.edge,
                bet.dry_run,
                bet.placed_at,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Most recent placed bets, newest first.
    pub fn recent_bets(&self, limit: u32) -> Result<Vec<PlacedBet>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, event_id, market, selection, odds, stake, edge, dry_run, placed_at
             FROM placed_bets ORDER BY id DESC LIMIT ?1",
        )?;
        let bets = stmt
            .query_map(params![limit], |row| {
                Ok(PlacedBet {
                    id: row.get(0)?,
                    event_id: row.get(1)?,
                    market: row.get(2)?,
                    selection: row.get(3)?,
                    odds: row.get(4)?,
                    stake: row.get(5)?,
                    edge: row.get(6)?,
                    dry_run: row.get(7)?,
                    placed_at: row.get(8)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(bets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> Store {
        Store::open(":memory:").unwrap()
    }

    #[test]
    fn test_kv_roundtrip_and_overwrite() {
        let s = store();
        assert_eq!(s.get_access_token().unwrap(), None);
        s.set_access_token("tok-1").unwrap();
        assert_eq!(s.get_access_token().unwrap().as_deref(), Some("tok-1"));
        s.set_access_token("tok-2").unwrap();
        assert_eq!(s.get_access_token().unwrap().as_deref(), Some("tok-2"));
    }

    #[test]
    fn test_bankroll_snapshot_roundtrip() {
        let s = store();
        assert_eq!(s.get_bankroll_snapshot().unwrap(), None);
        s.set_bankroll_snapshot(1234.56).unwrap();
        assert_eq!(s.get_bankroll_snapshot().unwrap(), Some(1234.56));
    }

    #[test]
    fn test_bet_log_newest_first() {
        let s = store();
        for i in 0..3 {
            s.record_bet(&PlacedBet {
                id: None,
                event_id: format!("ev-{}", i),
                market: "Total Goals".into(),
                selection: "Over".into(),
                odds: 2.2,
                stake: 5.0,
                edge: 8.1,
                dry_run: true,
                placed_at: Utc::now(),
            })
            .unwrap();
        }
        let bets = s.recent_bets(2).unwrap();
        assert_eq!(bets.len(), 2);
        assert_eq!(bets[0].event_id, "ev-2");
        assert_eq!(bets[1].event_id, "ev-1");
    }
}
