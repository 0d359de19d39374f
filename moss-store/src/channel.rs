// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-channel append-only entry log.
use std::collections::BTreeMap;
use std::sync::RwLock;

use moss_core::{AccessChannelId, Body, ChannelId, Entry, IdentityAddr};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Community-public parameters of a channel.
///
/// `is_access_channel` and `entries_are_final` are immutable once set at
/// channel genesis.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChannelProperties {
    /// Who issued this set of channel properties.
    pub author: IdentityAddr,

    /// Whether this channel publishes member sets and key material for
    /// other channels.
    pub is_access_channel: bool,

    /// Whether entries in this channel may be revoked or superseded.
    pub entries_are_final: bool,

    /// This channel's id.
    pub channel_id: ChannelId,

    /// The access channel asserting domain over this channel.
    pub owning_access_channel_id: AccessChannelId,

    /// Revision of the owning access channel in effect when these
    /// properties were authored.
    pub owning_access_channel_rev: u64,

    /// Free-form channel parameters, e.g. title and content protocol.
    pub params: Option<BTreeMap<String, String>>,
}

/// An ordered, append-only log of decrypted entries for one channel.
///
/// Entry indices are dense, zero-based and immutable once assigned; within
/// a channel, index order is append order. Many readers, one writer.
#[derive(Debug, Default)]
pub struct ChannelStore {
    entries: RwLock<Vec<Entry>>,
}

impl ChannelStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry and return its index.
    pub fn store(&self, entry: Entry) -> Result<u64, StoreError> {
        let mut entries = self.entries.write().map_err(|_| StoreError::Poisoned)?;
        entries.push(entry);
        Ok(entries.len() as u64 - 1)
    }

    /// Random-access read of the entry at `index`.
    pub fn get(&self, index: u64) -> Result<Entry, StoreError> {
        let entries = self.entries.read().map_err(|_| StoreError::Poisoned)?;
        entries
            .get(index as usize)
            .cloned()
            .ok_or(StoreError::OutOfRange {
                index,
                len: entries.len() as u64,
            })
    }

    /// Number of entries stored so far.
    pub fn len(&self) -> Result<u64, StoreError> {
        let entries = self.entries.read().map_err(|_| StoreError::Poisoned)?;
        Ok(entries.len() as u64)
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    /// Cache a decrypted body on a stored entry.
    ///
    /// Whether cleartext bodies are retained after a read is node policy;
    /// the store itself only offers the slot.
    pub fn fill_body(&self, index: u64, body: Body) -> Result<(), StoreError> {
        let mut entries = self.entries.write().map_err(|_| StoreError::Poisoned)?;
        let len = entries.len() as u64;
        let entry = entries
            .get_mut(index as usize)
            .ok_or(StoreError::OutOfRange { index, len })?;
        entry.body = Some(body);
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    /// Index beyond the current length of the log.
    #[error("index {index} beyond end of log with {len} entries")]
    OutOfRange { index: u64, len: u64 },

    #[error("store lock is poisoned")]
    Poisoned,
}

#[cfg(test)]
mod tests {
    use moss_core::{
        Body, BodyPart, ChannelId, CommunityKeyId, Entry, EntryCrypt, EntryHash, EntryInfo,
        EntrySig, Header, IdentityAddr, Verb,
    };

    use super::{ChannelStore, StoreError};

    fn dummy_entry(tag: u8) -> Entry {
        let crypt = EntryCrypt {
            sig: EntrySig::from_bytes([tag; 64]),
            hash: EntryHash::from_bytes([tag; 32]),
            info: EntryInfo::V1,
            community_key_id: CommunityKeyId::from_bytes([tag; 16]),
            header_crypt: vec![tag; 40],
            body_crypt: vec![tag; 40],
        };
        Entry {
            crypt,
            header: Header {
                timestamp: tag as u64,
                verb: Verb::PostEntry,
                channel_id: ChannelId::from_bytes([tag; 20]),
                author: IdentityAddr::from_bytes([tag; 20]),
                access_channel_id: ChannelId::ROOT_ACCESS,
                access_channel_rev: 0,
                aux: None,
            },
            body: None,
        }
    }

    #[test]
    fn append_only_indices() {
        let store = ChannelStore::new();
        assert!(store.is_empty().unwrap());

        for i in 0..5u8 {
            assert_eq!(store.store(dummy_entry(i)).unwrap(), i as u64);
        }
        for i in 0..5u8 {
            assert_eq!(store.get(i as u64).unwrap(), dummy_entry(i));
        }
        assert!(matches!(
            store.get(5),
            Err(StoreError::OutOfRange { index: 5, len: 5 })
        ));
    }

    #[test]
    fn concurrent_writers_get_distinct_dense_indices() {
        use std::sync::Arc;

        let store = Arc::new(ChannelStore::new());
        let handles: Vec<_> = (0..4u8)
            .map(|tag| {
                let store = store.clone();
                std::thread::spawn(move || {
                    (0..25)
                        .map(|_| store.store(dummy_entry(tag)).unwrap())
                        .collect::<Vec<u64>>()
                })
            })
            .collect();

        let mut indices: Vec<u64> = handles
            .into_iter()
            .flat_map(|handle| handle.join().unwrap())
            .collect();
        indices.sort_unstable();
        assert_eq!(indices, (0..100).collect::<Vec<u64>>());
    }

    #[test]
    fn fill_body_materializes_in_place() {
        let store = ChannelStore::new();
        store.store(dummy_entry(1)).unwrap();

        let body = Body::single(BodyPart::with_codec("/moss/talk/1", b"hi".to_vec()));
        store.fill_body(0, body.clone()).unwrap();
        assert_eq!(store.get(0).unwrap().body, Some(body));

        assert!(matches!(
            store.fill_body(9, Body::default()),
            Err(StoreError::OutOfRange { .. })
        ));
    }
}
