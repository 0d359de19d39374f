// SPDX-License-Identifier: MIT OR Apache-2.0

//! Identifiers, entry model and canonical encoding for the moss messaging
//! core.
//!
//! moss is a permissioned, append-only, channel-oriented messaging
//! substrate: community members author entries to named channels, each
//! entry encrypted, signed by its author, content-addressed by hash and
//! appended to a shared distributed index peers replicate from. This crate
//! holds the pieces every other moss crate agrees on: the fixed-size
//! identifiers, the encrypted and decrypted entry structures, the entry
//! hash and the CBOR codec.
pub mod cbor;
pub mod entry;
pub mod hash;
pub mod identifiers;
mod serde;

pub use entry::{Body, BodyPart, Entry, EntryCrypt, EntryError, EntryInfo, Header, Verb, CODEC_HEADER};
pub use hash::{EntryHash, HASH_LEN};
pub use identifiers::{
    AccessChannelId, ChannelId, CommunityId, CommunityKeyId, EntrySig, IdentifierError,
    IdentityAddr, IdentityPublicKey,
};
