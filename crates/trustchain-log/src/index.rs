//! `index.db` — the rebuildable read-side projection.
//!
//! One row per record: `(seq, content_id, tool, timestamp, signature,
//! session_id, latency_ms, record_json)`, indexed on tool, timestamp,
//! session id, and content id, as specified for the verifiable log's
//! query surface. This table is never the source of truth — `chain.log`
//! is — so it is always safe to drop and rebuild from the journal.

use crate::record::{Record, Result, ToolCount};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

pub fn open(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS records (
            seq         INTEGER PRIMARY KEY,
            content_id  TEXT NOT NULL UNIQUE,
            tool        TEXT NOT NULL,
            timestamp   TEXT NOT NULL,
            signature   TEXT NOT NULL,
            session_id  TEXT,
            latency_ms  INTEGER NOT NULL,
            record_json TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_records_tool ON records(tool);
        CREATE INDEX IF NOT EXISTS idx_records_timestamp ON records(timestamp);
        CREATE INDEX IF NOT EXISTS idx_records_session ON records(session_id);
        ",
    )?;
    Ok(conn)
}

/// The highest `seq` currently projected, or 0 if the index is empty.
pub fn max_seq(conn: &Connection) -> Result<u64> {
    let value: Option<i64> = conn.query_row("SELECT MAX(seq) FROM records", [], |row| row.get(0))?;
    Ok(value.unwrap_or(0).max(0) as u64)
}

pub fn insert(conn: &Connection, record: &Record) -> Result<()> {
    let record_json = serde_json::to_string(record)?;
    conn.execute(
        "INSERT INTO records (seq, content_id, tool, timestamp, signature, session_id, latency_ms, record_json)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            record.seq as i64,
            record.id,
            record.tool_id,
            record.timestamp,
            record.signature,
            record.session_id,
            record.latency_ms as i64,
            record_json,
        ],
    )?;
    Ok(())
}

/// Truncates the index and reinserts every record, in order. The
/// disaster-recovery path: delete `index.db`, call this, queries resume.
pub fn rebuild(conn: &Connection, records: &[Record]) -> Result<()> {
    conn.execute("DELETE FROM records", [])?;
    let tx = conn.unchecked_transaction()?;
    for record in records {
        insert(&tx, record)?;
    }
    tx.commit()?;
    Ok(())
}

pub fn all_in_order(conn: &Connection) -> Result<Vec<Record>> {
    let mut stmt = conn.prepare("SELECT record_json FROM records ORDER BY seq ASC")?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
    let mut records = Vec::new();
    for row in rows {
        records.push(serde_json::from_str(&row?)?);
    }
    Ok(records)
}

pub fn all_reverse(conn: &Connection) -> Result<Vec<Record>> {
    let mut stmt = conn.prepare("SELECT record_json FROM records ORDER BY seq DESC")?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
    let mut records = Vec::new();
    for row in rows {
        records.push(serde_json::from_str(&row?)?);
    }
    Ok(records)
}

pub fn by_content_id(conn: &Connection, content_id: &str) -> Result<Option<Record>> {
    let record_json: Option<String> = conn
        .query_row(
            "SELECT record_json FROM records WHERE content_id = ?1",
            params![content_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(record_json.map(|s| serde_json::from_str(&s)).transpose()?)
}

pub fn by_seq(conn: &Connection, seq: u64) -> Result<Option<Record>> {
    let record_json: Option<String> = conn
        .query_row(
            "SELECT record_json FROM records WHERE seq = ?1",
            params![seq as i64],
            |row| row.get(0),
        )
        .optional()?;
    Ok(record_json.map(|s| serde_json::from_str(&s)).transpose()?)
}

/// Aggregate stats behind `status()`: total/distinct-tool counts, the
/// timestamp span, and average latency — one query, mirroring the
/// original's single `status()` aggregate `SELECT`.
pub struct Stats {
    pub total: u64,
    pub tools_count: u64,
    pub first_operation: Option<String>,
    pub last_operation: Option<String>,
    pub avg_latency_ms: f64,
}

pub fn stats(conn: &Connection) -> Result<Stats> {
    let row = conn.query_row(
        "SELECT COUNT(*), COUNT(DISTINCT tool), MIN(timestamp), MAX(timestamp), AVG(latency_ms)
         FROM records",
        [],
        |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, Option<f64>>(4)?,
            ))
        },
    )?;
    Ok(Stats {
        total: row.0.max(0) as u64,
        tools_count: row.1.max(0) as u64,
        first_operation: row.2,
        last_operation: row.3,
        avg_latency_ms: row.4.unwrap_or(0.0),
    })
}

/// Per-tool call counts, highest-first.
pub fn tool_counts(conn: &Connection) -> Result<Vec<ToolCount>> {
    let mut stmt =
        conn.prepare("SELECT tool, COUNT(*) as cnt FROM records GROUP BY tool ORDER BY cnt DESC")?;
    let rows = stmt.query_map([], |row| {
        Ok(ToolCount {
            tool: row.get(0)?,
            count: row.get::<_, i64>(1)?.max(0) as u64,
        })
    })?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

pub fn by_tool(conn: &Connection, tool: &str) -> Result<Vec<Record>> {
    let mut stmt = conn.prepare(
        "SELECT record_json FROM records WHERE tool = ?1 ORDER BY seq ASC",
    )?;
    let rows = stmt.query_map(params![tool], |row| row.get::<_, String>(0))?;
    let mut records = Vec::new();
    for row in rows {
        records.push(serde_json::from_str(&row?)?);
    }
    Ok(records)
}
