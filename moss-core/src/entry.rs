// SPDX-License-Identifier: MIT OR Apache-2.0

//! The entry model: encrypted on-wire entries and their decrypted form.
//!
//! An entry travels as an [`EntryCrypt`]: a signature, a content hash and
//! two opaque ciphertexts (header and body) next to the id of the community
//! key the header was sealed with. Receiving nodes decrypt the header,
//! verify the signature and store the result as an [`Entry`]; the body
//! stays encrypted until it is read.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::hash::EntryHash;
use crate::identifiers::{AccessChannelId, ChannelId, CommunityKeyId, EntrySig, IdentityAddr};
use crate::serde::{deserialize_hex, serialize_hex};

/// Standard body-part header field naming the codec of the part's content.
///
/// Values follow the multistream convention, e.g. `/moss/ski/vouch/1`.
pub const CODEC_HEADER: &str = "multistream";

/// Version and flags of an entry, in effect selecting the hash and crypto
/// functions receivers apply.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EntryInfo(pub [u8; 4]);

impl EntryInfo {
    /// Entry format version 1, no flags set.
    pub const V1: EntryInfo = EntryInfo([1, 0, 0, 0]);

    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }
}

impl Serialize for EntryInfo {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serialize_hex(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for EntryInfo {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let bytes = deserialize_hex(deserializer)?;
        let checked: [u8; 4] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| serde::de::Error::custom("entry info must be 4 bytes"))?;
        Ok(Self(checked))
    }
}

/// Top-level signal specifying the low-level purpose of an entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum Verb {
    /// Administrative action on a channel, e.g. publishing key material or
    /// a membership revision.
    ChannelAdmin = 1,

    /// Post the entry body to the specified channel.
    PostEntry = 2,

    /// Replace the cited entry with this one in its place.
    ReplaceEntry = 3,
}

impl TryFrom<u32> for Verb {
    type Error = EntryError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Verb::ChannelAdmin),
            2 => Ok(Verb::PostEntry),
            3 => Ok(Verb::ReplaceEntry),
            other => Err(EntryError::UnknownVerb(other)),
        }
    }
}

impl Serialize for Verb {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u32(*self as u32)
    }
}

impl<'de> Deserialize<'de> for Verb {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = u32::deserialize(deserializer)?;
        Verb::try_from(raw).map_err(|err| serde::de::Error::custom(err.to_string()))
    }
}

/// Community-public metadata of an entry, sealed with a community key on
/// the wire.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Header {
    /// Time in microseconds since the Unix epoch at which the author sealed
    /// this entry.
    pub timestamp: u64,

    /// What the entry does.
    pub verb: Verb,

    /// The channel this entry is posted to.
    pub channel_id: ChannelId,

    /// Creator of this entry and signer of the entry hash.
    pub author: IdentityAddr,

    /// The access channel governing this entry.
    pub access_channel_id: AccessChannelId,

    /// Revision of the access channel in effect when this entry was
    /// authored. Fixed for the lifetime of the entry: later revisions
    /// neither retroactively authorize nor invalidate it.
    pub access_channel_rev: u64,

    /// Auxiliary header fields, always UTF-8.
    pub aux: Option<BTreeMap<String, String>>,
}

/// One of one or more sequential parts of an entry body.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BodyPart {
    /// Header fields describing `content`, always UTF-8.
    pub headers: BTreeMap<String, String>,

    /// Opaque client data conforming to `headers`.
    #[serde(with = "serde_bytes")]
    pub content: Vec<u8>,
}

impl BodyPart {
    /// Build a part whose codec header advertises the given multistream
    /// path.
    pub fn with_codec(codec: &str, content: Vec<u8>) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert(CODEC_HEADER.to_string(), codec.to_string());
        Self { headers, content }
    }

    /// The codec advertised by this part, if any.
    pub fn codec(&self) -> Option<&str> {
        self.headers.get(CODEC_HEADER).map(String::as_str)
    }
}

/// Decrypted and deserialized form of an entry body, an abstract data
/// container.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Body {
    pub parts: Vec<BodyPart>,
}

impl Body {
    pub fn new(parts: Vec<BodyPart>) -> Self {
        Self { parts }
    }

    /// A body holding exactly one part.
    pub fn single(part: BodyPart) -> Self {
        Self { parts: vec![part] }
    }
}

/// The public wire format of an entry.
///
/// Both ciphertext segments carry their 24-byte nonce as a prefix. The
/// header is always sealed with the community key referenced by
/// `community_key_id`; the body is sealed with the same key or for a
/// specific recipient's public encryption key.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntryCrypt {
    /// Author's signature over `hash`.
    pub sig: EntrySig,

    /// Hash of this entry, see [`EntryCrypt::compute_hash`].
    pub hash: EntryHash,

    /// Entry version and flags.
    pub info: EntryInfo,

    /// Identifies the community key the header was sealed with.
    pub community_key_id: CommunityKeyId,

    /// Sealed [`Header`].
    #[serde(with = "serde_bytes")]
    pub header_crypt: Vec<u8>,

    /// Sealed [`Body`].
    #[serde(with = "serde_bytes")]
    pub body_crypt: Vec<u8>,
}

impl EntryCrypt {
    /// Hash all fields of the entry except `sig` and the hash itself.
    ///
    /// Keccak-256 over `info ‖ community_key_id ‖ header_crypt ‖
    /// body_crypt`, so the digest is stable across re-encodings that
    /// preserve those fields and can be signed before the signature exists.
    pub fn compute_hash(&self) -> EntryHash {
        EntryHash::digest([
            self.info.as_bytes().as_slice(),
            self.community_key_id.as_bytes().as_slice(),
            self.header_crypt.as_slice(),
            self.body_crypt.as_slice(),
        ])
    }
}

/// An entry as held by a receiving node: the originating wire form next to
/// the decrypted header and, once read, the decrypted body.
#[derive(Clone, Debug, PartialEq)]
pub struct Entry {
    /// Originating encrypted entry this data was instantiated from.
    pub crypt: EntryCrypt,

    /// Decrypted and verified header.
    pub header: Header,

    /// Decrypted body; `None` until materialized by a read.
    pub body: Option<Body>,
}

/// Error types for entry fields.
#[derive(Error, Debug)]
pub enum EntryError {
    #[error("unknown entry verb {0}")]
    UnknownVerb(u32),
}

#[cfg(test)]
mod tests {
    use crate::identifiers::{CommunityKeyId, EntrySig};

    use super::{Body, BodyPart, EntryCrypt, EntryError, EntryHash, EntryInfo, Verb};

    fn sample_entry() -> EntryCrypt {
        EntryCrypt {
            sig: EntrySig::from_bytes([0; 64]),
            hash: EntryHash::from_bytes([0; 32]),
            info: EntryInfo::V1,
            community_key_id: CommunityKeyId::from_bytes([3; 16]),
            header_crypt: b"sealed header".to_vec(),
            body_crypt: b"sealed body".to_vec(),
        }
    }

    #[test]
    fn hash_ignores_sig_and_hash_fields() {
        let entry = sample_entry();
        let hash = entry.compute_hash();

        let mut resigned = entry.clone();
        resigned.sig = EntrySig::from_bytes([0xff; 64]);
        resigned.hash = hash;
        assert_eq!(hash, resigned.compute_hash());
    }

    #[test]
    fn hash_covers_every_sealed_field() {
        let entry = sample_entry();
        let hash = entry.compute_hash();

        let mut tampered = entry.clone();
        tampered.info = EntryInfo([2, 0, 0, 0]);
        assert_ne!(hash, tampered.compute_hash());

        let mut tampered = entry.clone();
        tampered.community_key_id = CommunityKeyId::from_bytes([4; 16]);
        assert_ne!(hash, tampered.compute_hash());

        let mut tampered = entry.clone();
        tampered.header_crypt[0] ^= 1;
        assert_ne!(hash, tampered.compute_hash());

        let mut tampered = entry;
        tampered.body_crypt[0] ^= 1;
        assert_ne!(hash, tampered.compute_hash());
    }

    #[test]
    fn verb_wire_values() {
        assert_eq!(Verb::try_from(1).unwrap(), Verb::ChannelAdmin);
        assert_eq!(Verb::try_from(2).unwrap(), Verb::PostEntry);
        assert_eq!(Verb::try_from(3).unwrap(), Verb::ReplaceEntry);
        assert!(matches!(Verb::try_from(9), Err(EntryError::UnknownVerb(9))));
    }

    #[test]
    fn body_part_codec() {
        let part = BodyPart::with_codec("/moss/talk/1", b"hi".to_vec());
        assert_eq!(part.codec(), Some("/moss/talk/1"));

        let bare = BodyPart {
            headers: Default::default(),
            content: vec![],
        };
        assert_eq!(bare.codec(), None);
    }

    #[test]
    fn entry_crypt_cbor_roundtrip() {
        let entry = sample_entry();
        let bytes = crate::cbor::to_bytes(&entry).unwrap();
        let entry_again: EntryCrypt = crate::cbor::from_bytes(&bytes).unwrap();
        assert_eq!(entry, entry_again);
    }

    #[test]
    fn body_cbor_roundtrip() {
        let body = Body::single(BodyPart::with_codec("/moss/talk/1", b"hello".to_vec()));
        let bytes = crate::cbor::to_bytes(&body).unwrap();
        let body_again: Body = crate::cbor::from_bytes(&bytes).unwrap();
        assert_eq!(body, body_again);
    }
}
