//! `chain.log` — the append-only binary journal.
//!
//! Format per record: 4-byte big-endian payload length, canonical-JSON
//! payload bytes, single newline separator. The separator is advisory;
//! the length prefix is authoritative. A trailing frame whose declared
//! length promises more bytes than are present is a crash artifact, not
//! corruption, and is discarded silently; the next append overwrites it.

use crate::record::{LogError, Record, Result};
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::Path;
use trustchain_canon::{hash_canonical, Hash};

/// Reads every complete framed record from `path` in order, returning
/// each record's leaf hash (SHA-256 of its canonical JSON) alongside the
/// record itself. Returns empty vectors if the journal does not exist
/// yet.
///
/// A trailing truncated frame (length prefix promising more bytes than
/// are on disk) is discarded without error. A frame whose declared
/// bytes are fully present but fail to parse as JSON is treated the
/// same way: scanning stops at that frame and nothing from it onward is
/// counted. This is deliberate — `scan` never raises on-disk tampering
/// as a hard error, because [`crate::VerifiableLog::open`] must still
/// succeed against a tampered journal so that `verify` can report the
/// mismatch between the journal's recomputed root and the `HEAD` that
/// was witnessed before the tamper. A log that refused to open at all
/// would make that comparison impossible.
pub fn scan(path: &Path) -> Result<(Vec<Hash>, Vec<Record>)> {
    if !path.exists() {
        return Ok((Vec::new(), Vec::new()));
    }

    let mut file = File::open(path)?;
    let mut buf = Vec::new();
    file.read_to_end(&mut buf)?;

    let mut leaves = Vec::new();
    let mut records = Vec::new();
    let mut offset = 0usize;

    loop {
        if offset + 4 > buf.len() {
            break;
        }
        let len = u32::from_be_bytes(buf[offset..offset + 4].try_into().unwrap()) as usize;
        let payload_start = offset + 4;
        if payload_start + len > buf.len() {
            // Declared length exceeds what's on disk: a crash mid-append.
            break;
        }
        let payload = &buf[payload_start..payload_start + len];
        let record: Record = match serde_json::from_slice(payload) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(
                    offset,
                    error = %e,
                    "frame failed to parse as a record, discarding it and everything after"
                );
                break;
            }
        };

        let leaf = hash_canonical(&serde_json::to_value(&record)?);
        leaves.push(leaf);
        records.push(record);

        offset = payload_start + len;
        if offset < buf.len() && buf[offset] == b'\n' {
            offset += 1;
        }
    }

    Ok((leaves, records))
}

/// Opens (creating if absent) `chain.log` for appending.
pub fn open_for_append(path: &Path) -> Result<File> {
    Ok(OpenOptions::new().create(true).append(true).open(path)?)
}

/// Appends one framed record and flushes to the OS, per the append
/// pipeline's step 4 (the only step that must survive a crash to make
/// the record durable).
pub fn append_frame(file: &mut File, record: &Record) -> Result<()> {
    let canonical = trustchain_canon::canonicalize(&serde_json::to_value(record)?);
    let payload = canonical.as_bytes();
    let len = u32::try_from(payload.len())
        .map_err(|_| LogError::Corrupt("record too large to frame".into()))?;

    file.write_all(&len.to_be_bytes())?;
    file.write_all(payload)?;
    file.write_all(b"\n")?;
    file.flush()?;
    file.sync_data()?;
    Ok(())
}
