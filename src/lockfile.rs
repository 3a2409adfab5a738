//! Version ledger: which release of each addon is installed, per scope.
//!
//! On disk this is `addons.lock.json`. Older lockfiles are a flat
//! `{name: id}` object; those load into the unnamed scope `""`.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};

/// Scope used by manifests that list addons without prefixes.
pub const UNSCOPED: &str = "";

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum LedgerDoc {
    Scoped(BTreeMap<String, BTreeMap<String, u64>>),
    Flat(BTreeMap<String, u64>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ledger {
    versions: BTreeMap<String, BTreeMap<String, u64>>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installed release id, or 0 when the addon was never installed.
    pub fn get(&self, scope: &str, name: &str) -> u64 {
        self.versions
            .get(scope)
            .and_then(|m| m.get(name))
            .copied()
            .unwrap_or(0)
    }

    pub fn put(&mut self, scope: &str, name: &str, version: u64) {
        self.versions
            .entry(scope.to_string())
            .or_default()
            .insert(name.to_string(), version);
    }

    pub fn len(&self) -> usize {
        self.versions.values().map(BTreeMap::len).sum()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            SyncError::io(format!("couldn't open lockfile {}", path.display()), e)
        })?;
        let doc: LedgerDoc = serde_json::from_str(&text).map_err(|e| {
            SyncError::json(format!("couldn't decode lockfile {}", path.display()), e)
        })?;

        let versions = match doc {
            LedgerDoc::Scoped(versions) => versions,
            LedgerDoc::Flat(flat) if flat.is_empty() => BTreeMap::new(),
            LedgerDoc::Flat(flat) => BTreeMap::from([(UNSCOPED.to_string(), flat)]),
        };
        Ok(Ledger { versions })
    }

    /// Loads the ledger, falling back to an empty one. The error, if any, is
    /// handed back so the caller can report it.
    pub fn load_or_default(path: &Path) -> (Self, Option<SyncError>) {
        match Self::load(path) {
            Ok(ledger) => (ledger, None),
            Err(e) => (Self::new(), Some(e)),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let only_unscoped = self.versions.keys().all(|scope| scope == UNSCOPED);
        let doc = if only_unscoped {
            LedgerDoc::Flat(self.versions.get(UNSCOPED).cloned().unwrap_or_default())
        } else {
            LedgerDoc::Scoped(self.versions.clone())
        };
        let text = serde_json::to_string_pretty(&doc)
            .map_err(|e| SyncError::json("couldn't encode lockfile", e))?;

        fs::write(path, text + "\n").map_err(|e| {
            SyncError::io(format!("couldn't write lockfile {}", path.display()), e)
        })
    }
}
