//! `HEAD` — a text file holding the current Merkle root.
//!
//! Absent or empty denotes an empty log. On open, a stale `HEAD` left
//! by a crash between the journal write and the `HEAD` write (§4.4
//! steps 4 and 6) is advanced to match the rebuilt Merkle tree. A
//! `HEAD` that does not correspond to any such in-flight append is left
//! untouched instead — see [`crate::VerifiableLog::open`]'s
//! reconciliation logic — so that `verify` can still report the
//! divergence caused by a tampered journal.

use crate::record::Result;
use std::fs;
use std::path::Path;

pub fn read(path: &Path) -> Result<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = fs::read_to_string(path)?;
    let trimmed = contents.trim();
    if trimmed.is_empty() {
        Ok(None)
    } else {
        Ok(Some(trimmed.to_string()))
    }
}

pub fn write(path: &Path, root_hex: Option<&str>) -> Result<()> {
    match root_hex {
        Some(hex) => fs::write(path, format!("{hex}\n"))?,
        None => fs::write(path, "")?,
    }
    Ok(())
}
