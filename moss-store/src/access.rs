// SPDX-License-Identifier: MIT OR Apache-2.0

//! Projection of an access channel into an authorization lookup surface.
//!
//! Each entry of an access channel is one revision of its member set. A
//! revision record names the community key subsequent entries shall seal
//! their headers with and maps member addresses to their public keys and
//! permission bits. Entries elsewhere cite the revision they were authored
//! under; lookups re-read the record at that index, which gives stable
//! historical authorization without mutation.
use std::collections::BTreeMap;

use moss_core::cbor::{self, DecodeError, EncodeError};
use moss_core::{Body, BodyPart, CommunityKeyId, IdentityAddr, IdentityPublicKey};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::channel::{ChannelStore, StoreError};

/// Codec advertised by the body part of a revision record entry.
pub const ACCESS_REV_CODEC: &str = "/moss/access/rev/1";

/// A member's public keys and permissions at one revision.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KeyEntry {
    /// Identity signing public key advertised for this member.
    pub signing_key: IdentityPublicKey,

    /// Public encryption key private messages to this member are sealed
    /// for.
    pub encryption_key: IdentityPublicKey,

    /// Reserved permission bitmask. No bits are assigned yet; the
    /// permissions check accepts every verb.
    pub permissions: u32,
}

/// Decoded body of one access-channel revision.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RevRecord {
    /// The community key entries under this revision seal their headers
    /// with.
    pub community_key_id: CommunityKeyId,

    /// Authorized members at this revision.
    pub members: BTreeMap<IdentityAddr, KeyEntry>,
}

impl RevRecord {
    /// Encode this record as the single body part of an access-channel
    /// entry.
    pub fn to_body_part(&self) -> Result<BodyPart, EncodeError> {
        Ok(BodyPart::with_codec(ACCESS_REV_CODEC, cbor::to_bytes(self)?))
    }

    /// Decode a revision record from a decrypted entry body.
    pub fn from_body(body: &Body) -> Result<Self, AccessError> {
        let [part] = body.parts.as_slice() else {
            return Err(AccessError::Malformed("expected exactly one body part"));
        };
        if part.codec() != Some(ACCESS_REV_CODEC) {
            return Err(AccessError::Malformed("missing revision codec header"));
        }
        Ok(cbor::from_bytes(&part.content)?)
    }

    /// Look up a member of this revision.
    pub fn member(&self, addr: &IdentityAddr) -> Result<KeyEntry, AccessError> {
        self.members
            .get(addr)
            .cloned()
            .ok_or(AccessError::UnknownMember(*addr))
    }
}

/// Read-only authorization view over a channel store playing the access
/// channel role.
///
/// The view decodes revision records on demand from entries whose bodies
/// have been decrypted; it performs no crypto itself.
#[derive(Debug)]
pub struct AccessChannel<'a> {
    store: &'a ChannelStore,
}

impl<'a> AccessChannel<'a> {
    pub fn new(store: &'a ChannelStore) -> Self {
        Self { store }
    }

    /// Fetch and decode the revision record at index `rev`.
    pub fn rev(&self, rev: u64) -> Result<RevRecord, AccessError> {
        let entry = self.store.get(rev).map_err(|err| match err {
            StoreError::OutOfRange { .. } => AccessError::UnknownRevision(rev),
            other => AccessError::Store(other),
        })?;
        let body = entry.body.as_ref().ok_or(AccessError::BodyNotDecrypted(rev))?;
        RevRecord::from_body(body)
    }

    /// Look up a specific member at a specific revision.
    pub fn member(&self, rev: u64, addr: &IdentityAddr) -> Result<KeyEntry, AccessError> {
        self.rev(rev)?.member(addr)
    }
}

#[derive(Debug, Error)]
pub enum AccessError {
    /// The access channel has no entry at the cited revision.
    #[error("access channel has no revision {0}")]
    UnknownRevision(u64),

    /// The revision entry exists but its body has not been decrypted.
    #[error("access channel entry {0} has no decrypted body")]
    BodyNotDecrypted(u64),

    /// The revision entry body does not hold a revision record.
    #[error("malformed revision record: {0}")]
    Malformed(&'static str),

    /// The address is not in the member set at the cited revision.
    #[error("address {0} is not a member at this revision")]
    UnknownMember(IdentityAddr),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use moss_core::{
        Body, BodyPart, ChannelId, CommunityKeyId, Entry, EntryCrypt, EntryHash, EntryInfo,
        EntrySig, Header, IdentityAddr, IdentityPublicKey, Verb,
    };

    use crate::channel::ChannelStore;

    use super::{AccessChannel, AccessError, KeyEntry, RevRecord};

    fn member(tag: u8) -> (IdentityAddr, KeyEntry) {
        (
            IdentityAddr::from_bytes([tag; 20]),
            KeyEntry {
                signing_key: IdentityPublicKey::from_bytes([tag; 32]),
                encryption_key: IdentityPublicKey::from_bytes([tag + 1; 32]),
                permissions: 0,
            },
        )
    }

    fn rev_entry(record: &RevRecord) -> Entry {
        Entry {
            crypt: EntryCrypt {
                sig: EntrySig::from_bytes([0; 64]),
                hash: EntryHash::from_bytes([0; 32]),
                info: EntryInfo::V1,
                community_key_id: record.community_key_id,
                header_crypt: vec![],
                body_crypt: vec![],
            },
            header: Header {
                timestamp: 0,
                verb: Verb::ChannelAdmin,
                channel_id: ChannelId::ROOT_ACCESS,
                author: IdentityAddr::from_bytes([1; 20]),
                access_channel_id: ChannelId::ROOT_ACCESS,
                access_channel_rev: 0,
                aux: None,
            },
            body: Some(Body::single(record.to_body_part().unwrap())),
        }
    }

    #[test]
    fn member_lookup_by_revision() {
        let (alice_addr, alice_keys) = member(1);
        let record = RevRecord {
            community_key_id: CommunityKeyId::from_bytes([8; 16]),
            members: BTreeMap::from([(alice_addr, alice_keys.clone())]),
        };

        let store = ChannelStore::new();
        store.store(rev_entry(&record)).unwrap();

        let access = AccessChannel::new(&store);
        assert_eq!(access.rev(0).unwrap(), record);
        assert_eq!(access.member(0, &alice_addr).unwrap(), alice_keys);

        let (bob_addr, _) = member(2);
        assert!(matches!(
            access.member(0, &bob_addr),
            Err(AccessError::UnknownMember(_))
        ));
        assert!(matches!(
            access.rev(1),
            Err(AccessError::UnknownRevision(1))
        ));
    }

    #[test]
    fn undecrypted_body_is_reported() {
        let (alice_addr, alice_keys) = member(1);
        let record = RevRecord {
            community_key_id: CommunityKeyId::from_bytes([8; 16]),
            members: BTreeMap::from([(alice_addr, alice_keys)]),
        };

        let mut entry = rev_entry(&record);
        entry.body = None;

        let store = ChannelStore::new();
        store.store(entry).unwrap();

        let access = AccessChannel::new(&store);
        assert!(matches!(
            access.rev(0),
            Err(AccessError::BodyNotDecrypted(0))
        ));
    }

    #[test]
    fn foreign_bodies_are_rejected() {
        let mut entry = rev_entry(&RevRecord::default());
        entry.body = Some(Body::single(BodyPart::with_codec(
            "/moss/talk/1",
            b"chatter".to_vec(),
        )));

        let store = ChannelStore::new();
        store.store(entry).unwrap();

        let access = AccessChannel::new(&store);
        assert!(matches!(access.rev(0), Err(AccessError::Malformed(_))));
    }
}
