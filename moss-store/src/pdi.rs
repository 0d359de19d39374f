// SPDX-License-Identifier: MIT OR Apache-2.0

//! The persistent distributed index: the global append-only sequence of
//! encrypted entries nodes replicate from.
//!
//! This in-memory log stands in for the shared storage medium; the wire
//! transport synchronizing it between machines lives outside the core.
//! Its append order is the canonical global order, which node ingest
//! preserves.
use std::sync::RwLock;

use moss_core::EntryCrypt;

use crate::channel::StoreError;

/// Shared append-only log of encrypted entries.
///
/// `peek` is stateless; every consuming node maintains its own cursor.
#[derive(Debug, Default)]
pub struct Pdi {
    entries: RwLock<Vec<EntryCrypt>>,
}

impl Pdi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry and return its index.
    pub fn push(&self, entry: EntryCrypt) -> Result<u64, StoreError> {
        let mut entries = self.entries.write().map_err(|_| StoreError::Poisoned)?;
        entries.push(entry);
        Ok(entries.len() as u64 - 1)
    }

    /// Read the entry at `index` without consuming it.
    pub fn peek(&self, index: u64) -> Result<EntryCrypt, StoreError> {
        let entries = self.entries.read().map_err(|_| StoreError::Poisoned)?;
        entries
            .get(index as usize)
            .cloned()
            .ok_or(StoreError::OutOfRange {
                index,
                len: entries.len() as u64,
            })
    }

    /// Number of entries pushed so far.
    pub fn len(&self) -> Result<u64, StoreError> {
        let entries = self.entries.read().map_err(|_| StoreError::Poisoned)?;
        Ok(entries.len() as u64)
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }
}
