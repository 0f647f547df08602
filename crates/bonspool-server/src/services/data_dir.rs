// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Data directory resolution.

use std::path::PathBuf;

use bonspool_core::error::Result;

/// Return the spool data directory, creating it if needed.
///
/// `BONSPOOL_DATA_DIR` wins; otherwise the XDG data home, then
/// `~/.local/share`, each with a `bonspool` subdirectory.
pub fn data_dir() -> Result<PathBuf> {
    let dir = resolve(|key| std::env::var(key).ok());
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

fn resolve(lookup: impl Fn(&str) -> Option<String>) -> PathBuf {
    let set = |key: &str| lookup(key).filter(|v| !v.is_empty());

    if let Some(dir) = set("BONSPOOL_DATA_DIR") {
        return PathBuf::from(dir);
    }
    if let Some(xdg) = set("XDG_DATA_HOME") {
        return PathBuf::from(xdg).join("bonspool");
    }
    if let Some(home) = set("HOME") {
        return PathBuf::from(home).join(".local").join("share").join("bonspool");
    }
    // Last resort
    std::env::temp_dir().join("bonspool")
}
