// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-node ingest pipeline.
//!
//! A node walks the shared index with its own cursor. For every entry it
//! decrypts the header, resolves the author against the cited
//! access-channel revision, verifies the signature and dispatches the
//! entry to the per-channel store; bodies stay sealed until read. Entries
//! whose community key has not arrived yet are parked and drained once a
//! vouch delivers the key.
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use moss_core::cbor::{self, DecodeError};
use moss_core::{
    Body, ChannelId, CommunityKeyId, Entry, EntryCrypt, Header, IdentityAddr, IdentityPublicKey,
    Verb,
};
use moss_ski::{verify, KeyringError, Ski, SkiError};
use moss_store::{AccessChannel, AccessError, ChannelStore, KeyEntry, Pdi, RevRecord, StoreError};
use thiserror::Error;
use tracing::{debug, warn};

use crate::author::VouchPackage;

/// Node-level options.
#[derive(Clone, Copy, Debug)]
pub struct NodeConfig {
    /// Unique across peers sharing one index.
    pub node_id: u64,

    /// Keep decrypted bodies on stored entries after the first read.
    /// Defaults to off: cleartext is re-derived on every read.
    pub retain_bodies: bool,
}

impl NodeConfig {
    pub fn new(node_id: u64) -> Self {
        Self {
            node_id,
            retain_bodies: false,
        }
    }
}

/// One consumer of the shared index, holding the local per-channel stores.
#[derive(Debug)]
pub struct Node {
    config: NodeConfig,
    pdi: Arc<Pdi>,
    ski: Arc<Ski>,
    channels: RwLock<HashMap<ChannelId, Arc<ChannelStore>>>,
    cursor: Mutex<u64>,
    parked: Mutex<HashMap<CommunityKeyId, Vec<EntryCrypt>>>,
}

impl Node {
    pub fn new(config: NodeConfig, pdi: Arc<Pdi>, ski: Arc<Ski>) -> Self {
        Self {
            config,
            pdi,
            ski,
            channels: RwLock::new(HashMap::new()),
            cursor: Mutex::new(0),
            parked: Mutex::new(HashMap::new()),
        }
    }

    pub fn node_id(&self) -> u64 {
        self.config.node_id
    }

    /// The local store of a channel, if one exists.
    pub fn channel(&self, id: &ChannelId) -> Option<Arc<ChannelStore>> {
        self.channels.read().ok()?.get(id).cloned()
    }

    /// Install a pre-populated channel store, e.g. the genesis revision of
    /// an access channel obtained out-of-band. An access channel cannot
    /// authorize its own first entry, so bootstrap seeds it here.
    pub fn install_channel(&self, id: ChannelId, store: Arc<ChannelStore>) -> Result<(), NodeError> {
        self.channels
            .write()
            .map_err(|_| StoreError::Poisoned)?
            .insert(id, store);
        Ok(())
    }

    /// Append an entry to the shared index on behalf of this node's
    /// author. Does not move the node's own cursor.
    pub fn push(&self, entry: EntryCrypt) -> Result<u64, NodeError> {
        Ok(self.pdi.push(entry)?)
    }

    /// Consume the next entry from the shared index.
    ///
    /// On success returns the channel the entry was dispatched to and its
    /// index there. The cursor advances whenever an entry was available,
    /// so a failed entry is dropped and ingest continues with the next
    /// one; an entry sealed under an unknown community key is parked
    /// instead of dropped and reported as [`NodeError::Parked`].
    pub fn pop(&self) -> Result<(ChannelId, u64), NodeError> {
        let crypt = {
            let mut cursor = self
                .cursor
                .lock()
                .map_err(|_| NodeError::Store(StoreError::Poisoned))?;
            let crypt = self.pdi.peek(*cursor)?;
            *cursor += 1;
            crypt
        };

        match self.ingest(crypt) {
            Ok(dispatched) => Ok(dispatched),
            Err(err @ NodeError::Parked(_)) => {
                debug!(node = self.config.node_id, "{err}");
                Err(err)
            }
            Err(err) => {
                warn!(node = self.config.node_id, "entry dropped: {err}");
                Err(err)
            }
        }
    }

    /// Move this node's cursor, e.g. to replay the index from an earlier
    /// position. Positions up to one past the last entry are valid.
    pub fn seek(&self, position: u64) -> Result<(), NodeError> {
        let len = self.pdi.len()?;
        if position > len {
            return Err(NodeError::Store(StoreError::OutOfRange {
                index: position,
                len,
            }));
        }
        let mut cursor = self
            .cursor
            .lock()
            .map_err(|_| NodeError::Store(StoreError::Poisoned))?;
        *cursor = position;
        Ok(())
    }

    /// Read a body from a channel, decrypting it on demand.
    pub fn read(&self, channel_id: &ChannelId, index: u64) -> Result<Body, NodeError> {
        let store = self
            .channel(channel_id)
            .ok_or(NodeError::UnknownChannel(*channel_id))?;
        let entry = store.get(index)?;

        if let Some(body) = entry.body {
            return Ok(body);
        }

        let bytes = self
            .ski
            .decrypt(&entry.crypt.community_key_id, &entry.crypt.body_crypt)?;
        let body: Body = cbor::from_bytes(&bytes)?;

        if self.config.retain_bodies {
            store.fill_body(index, body.clone())?;
        }
        Ok(body)
    }

    /// Install the community key a vouch entry carries for us, then drain
    /// every entry that was parked waiting for that key.
    ///
    /// `recipient` is our own public encryption key; the sender's keys and
    /// the entry's index come out-of-band inside the package.
    pub fn accept_vouch(
        &self,
        recipient: &IdentityPublicKey,
        package: &VouchPackage,
    ) -> Result<CommunityKeyId, NodeError> {
        let crypt = self.pdi.peek(package.entry_index)?;

        if crypt.hash != crypt.compute_hash() {
            return Err(NodeError::HashMismatch);
        }
        if !verify(&package.signing_key, &crypt.hash, &crypt.sig) {
            let author = IdentityAddr::from_signing_key(&package.signing_key);
            return Err(NodeError::BadSignature(author));
        }

        let key_id =
            self.ski
                .accept_vouch(recipient, &crypt.body_crypt, &package.encryption_key)?;

        let waiting = self
            .parked
            .lock()
            .map_err(|_| NodeError::Store(StoreError::Poisoned))?
            .remove(&key_id);
        if let Some(entries) = waiting {
            debug!(
                node = self.config.node_id,
                count = entries.len(),
                "draining entries parked for community key {key_id}"
            );
            for crypt in entries {
                if let Err(err) = self.ingest(crypt) {
                    warn!(node = self.config.node_id, "parked entry dropped: {err}");
                }
            }
        }
        Ok(key_id)
    }

    fn ingest(&self, crypt: EntryCrypt) -> Result<(ChannelId, u64), NodeError> {
        let header_bytes = match self
            .ski
            .decrypt(&crypt.community_key_id, &crypt.header_crypt)
        {
            Ok(bytes) => bytes,
            Err(SkiError::Keyring(KeyringError::UnknownCommunityKey(id))) => {
                self.park(id, crypt)?;
                return Err(NodeError::Parked(id));
            }
            Err(err) => return Err(err.into()),
        };
        let header: Header = cbor::from_bytes(&header_bytes)?;

        if crypt.hash != crypt.compute_hash() {
            return Err(NodeError::HashMismatch);
        }

        let author = self.resolve_author(&header)?;
        if !verify(&author.signing_key, &crypt.hash, &crypt.sig) {
            return Err(NodeError::BadSignature(header.author));
        }
        check_permissions(&author, header.verb, &header.author)?;

        let channel_id = header.channel_id;
        let store = self.channel_or_create(&channel_id)?;
        let index = store.store(Entry {
            crypt,
            header,
            body: None,
        })?;
        Ok((channel_id, index))
    }

    /// Resolve the author's key entry at the access-channel revision the
    /// entry cites. The revision record's body is decrypted on demand when
    /// the local copy still holds it sealed.
    fn resolve_author(&self, header: &Header) -> Result<KeyEntry, NodeError> {
        let store = self
            .channel(&header.access_channel_id)
            .ok_or(NodeError::UnknownChannel(header.access_channel_id))?;

        let access = AccessChannel::new(&store);
        match access.member(header.access_channel_rev, &header.author) {
            Ok(member) => Ok(member),
            Err(AccessError::BodyNotDecrypted(rev)) => {
                let rev_entry = store.get(rev)?;
                let bytes = self.ski.decrypt(
                    &rev_entry.crypt.community_key_id,
                    &rev_entry.crypt.body_crypt,
                )?;
                let record = RevRecord::from_body(&cbor::from_bytes(&bytes)?)?;
                Ok(record.member(&header.author)?)
            }
            Err(err) => Err(err.into()),
        }
    }

    fn channel_or_create(&self, id: &ChannelId) -> Result<Arc<ChannelStore>, NodeError> {
        let mut channels = self
            .channels
            .write()
            .map_err(|_| NodeError::Store(StoreError::Poisoned))?;
        Ok(channels.entry(*id).or_default().clone())
    }

    fn park(&self, key_id: CommunityKeyId, crypt: EntryCrypt) -> Result<(), NodeError> {
        self.parked
            .lock()
            .map_err(|_| NodeError::Store(StoreError::Poisoned))?
            .entry(key_id)
            .or_default()
            .push(crypt);
        Ok(())
    }
}

/// Evaluate an author's permission bits against what the verb requires.
///
/// No bits are assigned yet; every verb is accepted.
fn check_permissions(
    member: &KeyEntry,
    verb: Verb,
    author: &IdentityAddr,
) -> Result<(), NodeError> {
    let _ = (member.permissions, verb, author);
    Ok(())
}

#[derive(Debug, Error)]
pub enum NodeError {
    /// No local store exists for the referenced channel.
    #[error("no channel store installed for {0}")]
    UnknownChannel(ChannelId),

    /// The entry is retained until the community key arrives.
    #[error("entry parked awaiting community key {0}")]
    Parked(CommunityKeyId),

    /// The entry's declared hash does not match its sealed fields.
    #[error("entry hash does not match its sealed fields")]
    HashMismatch,

    /// The signature does not verify under the key advertised for the
    /// author at the cited revision.
    #[error("signature rejected for author {0}")]
    BadSignature(IdentityAddr),

    /// Reserved: the permissions check failed.
    #[error("author {0} lacks permission for {1:?}")]
    Unauthorized(IdentityAddr, Verb),

    #[error(transparent)]
    Ski(#[from] SkiError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Access(#[from] AccessError),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use moss_core::ChannelId;
    use moss_ski::Ski;
    use moss_store::{Pdi, StoreError};

    use super::{Node, NodeConfig, NodeError};

    #[test]
    fn pop_on_an_empty_index_does_not_advance() {
        let node = Node::new(
            NodeConfig::new(1),
            Arc::new(Pdi::new()),
            Arc::new(Ski::new()),
        );
        assert!(matches!(
            node.pop(),
            Err(NodeError::Store(StoreError::OutOfRange { index: 0, .. }))
        ));
        // Still waiting on index 0.
        assert!(matches!(
            node.pop(),
            Err(NodeError::Store(StoreError::OutOfRange { index: 0, .. }))
        ));
    }

    #[test]
    fn seek_stays_within_the_index() {
        let pdi = Arc::new(Pdi::new());
        let node = Node::new(NodeConfig::new(1), pdi.clone(), Arc::new(Ski::new()));

        // One past the end is the "caught up" position.
        node.seek(0).unwrap();
        assert!(matches!(
            node.seek(1),
            Err(NodeError::Store(StoreError::OutOfRange { index: 1, len: 0 }))
        ));
    }

    #[test]
    fn read_from_an_unknown_channel_fails() {
        let node = Node::new(
            NodeConfig::new(1),
            Arc::new(Pdi::new()),
            Arc::new(Ski::new()),
        );
        let channel = ChannelId::from_bytes([7; 20]);
        assert!(matches!(
            node.read(&channel, 0),
            Err(NodeError::UnknownChannel(_))
        ));
    }
}
