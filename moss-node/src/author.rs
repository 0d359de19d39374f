// SPDX-License-Identifier: MIT OR Apache-2.0

//! The authoring path: from cleartext body parts to a signed, sealed
//! entry on the shared index.
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use moss_core::cbor::{self, EncodeError};
use moss_core::{
    AccessChannelId, Body, BodyPart, ChannelId, CommunityKeyId, EntryCrypt, EntryHash, EntryInfo,
    EntrySig, Header, IdentityAddr, IdentityPublicKey, Verb,
};
use moss_ski::{Ski, SkiError};
use moss_store::{ChannelProperties, Pdi, StoreError};
use thiserror::Error;

/// Everything channel operations need to know about the member writing an
/// entry: where to find their SKI and which public keys and community key
/// to hand it. A plain value record, it owns no resources.
#[derive(Clone, Debug)]
pub struct Author {
    /// The member's address.
    pub addr: IdentityAddr,

    /// The member's secure key interface.
    pub ski: Arc<Ski>,

    /// Public encryption key, the private half of which the SKI holds.
    pub encryption_key: IdentityPublicKey,

    /// Public signing key, the private half of which the SKI holds.
    pub signing_key: IdentityPublicKey,

    /// The community key entries are sealed with.
    pub community_key_id: CommunityKeyId,
}

impl Author {
    /// Generate a fresh identity on `ski` and bundle it with the given
    /// community key id. The address is derived from the signing key.
    pub fn create(ski: Arc<Ski>, community_key_id: CommunityKeyId) -> Result<Self, WriteError> {
        let (encryption_key, signing_key) = ski.new_identity()?;
        Ok(Self {
            addr: IdentityAddr::from_signing_key(&signing_key),
            ski,
            encryption_key,
            signing_key,
            community_key_id,
        })
    }

    /// Assemble an author from the identity and community key the SKI has
    /// bound to an access channel.
    pub fn for_channel(ski: Arc<Ski>, channel: AccessChannelId) -> Result<Self, WriteError> {
        let (encryption_key, signing_key) = ski.identity(&channel)?;
        let community_key_id = ski.community_key_id(&channel)?;
        Ok(Self {
            addr: IdentityAddr::from_signing_key(&signing_key),
            ski,
            encryption_key,
            signing_key,
            community_key_id,
        })
    }
}

/// The tuple an author conveys out-of-band to a vouched member so they can
/// locate and verify their vouch entry. Carries only identifiers, never
/// key material.
#[derive(Clone, Debug, PartialEq)]
pub struct VouchPackage {
    /// The vouching author's public encryption key.
    pub encryption_key: IdentityPublicKey,

    /// The vouching author's public signing key.
    pub signing_key: IdentityPublicKey,

    /// Index of the vouch entry on the shared index.
    pub entry_index: u64,
}

/// Authoring surface of one channel.
///
/// Every write seals the body, seals the header with the community key,
/// hashes, signs and pushes the assembled entry to the shared index.
#[derive(Clone, Debug)]
pub struct ChannelWriter {
    channel_id: ChannelId,
    access_channel_id: AccessChannelId,
    access_channel_rev: u64,
    pdi: Arc<Pdi>,
}

impl ChannelWriter {
    pub fn new(
        channel_id: ChannelId,
        access_channel_id: AccessChannelId,
        access_channel_rev: u64,
        pdi: Arc<Pdi>,
    ) -> Self {
        Self {
            channel_id,
            access_channel_id,
            access_channel_rev,
            pdi,
        }
    }

    /// Build a writer for the channel the given properties describe.
    pub fn for_channel(properties: &ChannelProperties, pdi: Arc<Pdi>) -> Self {
        Self::new(
            properties.channel_id,
            properties.owning_access_channel_id,
            properties.owning_access_channel_rev,
            pdi,
        )
    }

    /// Write cleartext body parts sealed with the community key. Returns
    /// the index of the new entry on the shared index.
    pub fn write(
        &self,
        author: &Author,
        verb: Verb,
        parts: Vec<BodyPart>,
    ) -> Result<u64, WriteError> {
        let bytes = cbor::to_bytes(&Body::new(parts))?;
        let body_crypt = author.ski.encrypt(&author.community_key_id, &bytes)?;
        self.seal_and_push(author, verb, body_crypt)
    }

    /// Write cleartext body parts sealed for a specific recipient's public
    /// encryption key. The header remains sealed with the community key.
    pub fn write_for(
        &self,
        author: &Author,
        verb: Verb,
        recipient: &IdentityPublicKey,
        parts: Vec<BodyPart>,
    ) -> Result<u64, WriteError> {
        let bytes = cbor::to_bytes(&Body::new(parts))?;
        let body_crypt = author
            .ski
            .encrypt_for(&author.encryption_key, &bytes, recipient)?;
        self.seal_and_push(author, verb, body_crypt)
    }

    /// Seal the community key for a recipient and write it as a vouch
    /// entry.
    ///
    /// The recipient cannot decrypt the entry header until they have
    /// processed the body, so the returned [`VouchPackage`] must reach
    /// them out-of-band.
    pub fn write_vouch_for(
        &self,
        author: &Author,
        recipient: &IdentityPublicKey,
    ) -> Result<(u64, VouchPackage), WriteError> {
        // The cleartext key never leaves the SKI.
        let body_crypt =
            author
                .ski
                .vouch(author.community_key_id, &author.encryption_key, recipient)?;
        let entry_index = self.seal_and_push(author, Verb::ChannelAdmin, body_crypt)?;
        Ok((
            entry_index,
            VouchPackage {
                encryption_key: author.encryption_key,
                signing_key: author.signing_key,
                entry_index,
            },
        ))
    }

    fn seal_and_push(
        &self,
        author: &Author,
        verb: Verb,
        body_crypt: Vec<u8>,
    ) -> Result<u64, WriteError> {
        let header = Header {
            timestamp: unix_micros(),
            verb,
            channel_id: self.channel_id,
            author: author.addr,
            access_channel_id: self.access_channel_id,
            access_channel_rev: self.access_channel_rev,
            aux: None,
        };
        let header_crypt = author
            .ski
            .encrypt(&author.community_key_id, &cbor::to_bytes(&header)?)?;

        let mut crypt = EntryCrypt {
            sig: EntrySig::default(),
            hash: EntryHash::default(),
            info: EntryInfo::V1,
            community_key_id: author.community_key_id,
            header_crypt,
            body_crypt,
        };
        crypt.hash = crypt.compute_hash();
        crypt.sig = author.ski.sign(&author.signing_key, &crypt.hash)?;

        Ok(self.pdi.push(crypt)?)
    }
}

fn unix_micros() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_micros() as u64)
        .unwrap_or_default()
}

#[derive(Debug, Error)]
pub enum WriteError {
    #[error(transparent)]
    Ski(#[from] SkiError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
