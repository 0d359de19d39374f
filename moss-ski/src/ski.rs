// SPDX-License-Identifier: MIT OR Apache-2.0

//! The secure key interface.
//!
//! [`Ski`] stands in for an isolated key process: callers hand it public
//! keys and opaque buffers and get opaque buffers back, while every
//! private key stays inside the [`Keyring`]. The operations mirror what a
//! wire protocol to an external key daemon would offer, which is why they
//! work on serialized bytes rather than typed structures.
use crypto_secretbox::aead::{Aead, KeyInit};
use crypto_secretbox::XSalsa20Poly1305;
use ed25519_dalek::{Signer, Verifier};
use moss_core::cbor::{self, DecodeError, EncodeError};
use moss_core::{
    AccessChannelId, Body, BodyPart, CommunityKeyId, EntryHash, EntrySig, IdentityPublicKey,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::keyring::{Keyring, KeyringError};
use crate::rng::{Rng, RngError};
use crate::secret::CommunityKey;

/// Codec advertised by the single body part of a vouch entry.
pub const VOUCH_CODEC: &str = "/moss/ski/vouch/1";

/// Number of bytes in the nonce prefixed to every ciphertext.
pub const NONCE_LEN: usize = 24;

/// The message carried inside a vouch body: the community key itself, not
/// merely a capability, so the recipient can decrypt any header sealed
/// under it afterwards.
#[derive(Debug, Serialize, Deserialize)]
struct VouchMessage {
    key_id: CommunityKeyId,
    key: CommunityKey,
}

/// A keyring together with the crypto operations consuming it.
#[derive(Debug, Default)]
pub struct Ski {
    keyring: Keyring,
    rng: Rng,
}

impl Ski {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an SKI around an existing generator, e.g. a seeded one in
    /// tests.
    pub fn with_rng(rng: Rng) -> Self {
        Self {
            keyring: Keyring::new(),
            rng,
        }
    }

    // ------------------------------------------------------------------
    // Key and identity management, delegating to the keyring.

    /// Generate encryption and signing key pairs and return the public
    /// keys as `(encryption, signing)`.
    pub fn new_identity(&self) -> Result<(IdentityPublicKey, IdentityPublicKey), SkiError> {
        Ok(self.keyring.new_identity(&self.rng)?)
    }

    /// Wipe all private key material stored under the given public key.
    pub fn invalidate_identity(&self, key: &IdentityPublicKey) -> Result<(), SkiError> {
        Ok(self.keyring.invalidate_identity(key)?)
    }

    /// Generate a new community key and return its id.
    pub fn new_community_key(&self) -> Result<CommunityKeyId, SkiError> {
        Ok(self.keyring.new_community_key(&self.rng)?)
    }

    /// Install a community key received from another member.
    pub fn install_community_key(
        &self,
        id: CommunityKeyId,
        key: CommunityKey,
    ) -> Result<(), SkiError> {
        Ok(self.keyring.install_community_key(id, key)?)
    }

    /// Fetch a community key by id. The returned container compares in
    /// constant time and never prints its value.
    pub fn community_key(&self, id: &CommunityKeyId) -> Result<CommunityKey, SkiError> {
        Ok(self.keyring.community_key(id)?)
    }

    /// Assign previously generated public keys to an access channel.
    pub fn bind_identity(
        &self,
        channel: AccessChannelId,
        encryption_key: IdentityPublicKey,
        signing_key: IdentityPublicKey,
    ) -> Result<(), SkiError> {
        Ok(self.keyring.bind_identity(channel, encryption_key, signing_key)?)
    }

    /// The public keys bound to an access channel, as
    /// `(encryption, signing)`.
    pub fn identity(
        &self,
        channel: &AccessChannelId,
    ) -> Result<(IdentityPublicKey, IdentityPublicKey), SkiError> {
        Ok(self.keyring.identity(channel)?)
    }

    /// Assign an existing community key to an access channel.
    pub fn bind_community_key(
        &self,
        channel: AccessChannelId,
        key_id: CommunityKeyId,
    ) -> Result<(), SkiError> {
        Ok(self.keyring.bind_community_key(channel, key_id)?)
    }

    /// The id of the community key bound to an access channel.
    pub fn community_key_id(&self, channel: &AccessChannelId) -> Result<CommunityKeyId, SkiError> {
        Ok(self.keyring.community_key_id(channel)?)
    }

    // ------------------------------------------------------------------
    // Crypto operations.

    /// Produce a detached signature over a 32-byte entry hash with the
    /// private key stored for `signer`.
    pub fn sign(&self, signer: &IdentityPublicKey, hash: &EntryHash) -> Result<EntrySig, SkiError> {
        let key = self.keyring.signing_key(signer)?;
        let signature = key.sign(hash.as_bytes());
        Ok(EntrySig::from_bytes(signature.to_bytes()))
    }

    /// Seal a buffer with the community key identified by `key_id`.
    ///
    /// Layout: 24-byte random nonce, then the XSalsa20-Poly1305
    /// ciphertext with its tag. The nonce is fresh per call and never
    /// reused with the same key.
    pub fn encrypt(&self, key_id: &CommunityKeyId, msg: &[u8]) -> Result<Vec<u8>, SkiError> {
        let key = self.keyring.community_key(key_id)?;
        let nonce: [u8; NONCE_LEN] = self.rng.random_array()?;

        let cipher = XSalsa20Poly1305::new(key.as_bytes().into());
        let sealed = cipher
            .encrypt(&nonce.into(), msg)
            .map_err(|_| SkiError::Seal)?;

        Ok(prefix_nonce(nonce, sealed))
    }

    /// Open a buffer sealed by [`Ski::encrypt`] under the same community
    /// key.
    pub fn decrypt(&self, key_id: &CommunityKeyId, sealed: &[u8]) -> Result<Vec<u8>, SkiError> {
        let key = self.keyring.community_key(key_id)?;
        let (nonce, ciphertext) = split_nonce(sealed)?;

        let cipher = XSalsa20Poly1305::new(key.as_bytes().into());
        cipher
            .decrypt(&nonce.into(), ciphertext)
            .map_err(|_| SkiError::Auth)
    }

    /// Seal a buffer for the public encryption key of a specific
    /// recipient, authenticated with the sender's private encryption key.
    ///
    /// Same nonce-prefix layout as [`Ski::encrypt`], with X25519 +
    /// XSalsa20-Poly1305 underneath. Outside of vouches this is the basis
    /// of private messages between members.
    pub fn encrypt_for(
        &self,
        sender: &IdentityPublicKey,
        msg: &[u8],
        recipient: &IdentityPublicKey,
    ) -> Result<Vec<u8>, SkiError> {
        let secret = self.keyring.encryption_key(sender)?;
        let nonce: [u8; NONCE_LEN] = self.rng.random_array()?;

        let cipher = crypto_box::SalsaBox::new(&(*recipient.as_bytes()).into(), &secret);
        let sealed = cipher
            .encrypt(&nonce.into(), msg)
            .map_err(|_| SkiError::Seal)?;

        Ok(prefix_nonce(nonce, sealed))
    }

    /// Open a buffer sealed by [`Ski::encrypt_for`], using the
    /// recipient's private encryption key and the sender's public one.
    pub fn decrypt_from(
        &self,
        recipient: &IdentityPublicKey,
        sealed: &[u8],
        sender: &IdentityPublicKey,
    ) -> Result<Vec<u8>, SkiError> {
        let secret = self.keyring.encryption_key(recipient)?;
        let (nonce, ciphertext) = split_nonce(sealed)?;

        let cipher = crypto_box::SalsaBox::new(&(*sender.as_bytes()).into(), &secret);
        cipher
            .decrypt(&nonce.into(), ciphertext)
            .map_err(|_| SkiError::Auth)
    }

    // ------------------------------------------------------------------
    // Vouching.

    /// Seal the community key identified by `community_key_id` for a
    /// recipient's public encryption key.
    ///
    /// The key travels as the single part of a serialized entry body
    /// advertising [`VOUCH_CODEC`], sealed with [`Ski::encrypt_for`]. The
    /// cleartext key never leaves the SKI.
    pub fn vouch(
        &self,
        community_key_id: CommunityKeyId,
        sender: &IdentityPublicKey,
        recipient: &IdentityPublicKey,
    ) -> Result<Vec<u8>, SkiError> {
        let key = self.keyring.community_key(&community_key_id)?;
        let message = VouchMessage {
            key_id: community_key_id,
            key,
        };
        let body = Body::single(BodyPart::with_codec(VOUCH_CODEC, cbor::to_bytes(&message)?));
        self.encrypt_for(sender, &cbor::to_bytes(&body)?, recipient)
    }

    /// Open a buffer written by [`Ski::vouch`] and install the community
    /// key it carries. Returns the id of the installed key.
    pub fn accept_vouch(
        &self,
        recipient: &IdentityPublicKey,
        sealed: &[u8],
        sender: &IdentityPublicKey,
    ) -> Result<CommunityKeyId, SkiError> {
        let bytes = self.decrypt_from(recipient, sealed, sender)?;
        let body: Body = cbor::from_bytes(&bytes)?;

        let [part] = body.parts.as_slice() else {
            return Err(SkiError::MalformedVouch("expected exactly one body part"));
        };
        if part.codec() != Some(VOUCH_CODEC) {
            return Err(SkiError::MalformedVouch("missing vouch codec header"));
        }

        let message: VouchMessage = cbor::from_bytes(&part.content)?;
        self.keyring
            .install_community_key(message.key_id, message.key)?;
        Ok(message.key_id)
    }
}

/// Verify a detached signature over an entry hash.
///
/// Requires no private material, so it lives outside the SKI boundary.
pub fn verify(signer: &IdentityPublicKey, hash: &EntryHash, sig: &EntrySig) -> bool {
    let Ok(key) = ed25519_dalek::VerifyingKey::from_bytes(signer.as_bytes()) else {
        return false;
    };
    let signature = ed25519_dalek::Signature::from_bytes(sig.as_bytes());
    key.verify(hash.as_bytes(), &signature).is_ok()
}

fn prefix_nonce(nonce: [u8; NONCE_LEN], sealed: Vec<u8>) -> Vec<u8> {
    let mut out = nonce.to_vec();
    out.extend(sealed);
    out
}

fn split_nonce(sealed: &[u8]) -> Result<([u8; NONCE_LEN], &[u8]), SkiError> {
    if sealed.len() <= NONCE_LEN {
        return Err(SkiError::Truncated);
    }
    let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
    let nonce: [u8; NONCE_LEN] = nonce.try_into().map_err(|_| SkiError::Truncated)?;
    Ok((nonce, ciphertext))
}

#[derive(Debug, Error)]
pub enum SkiError {
    #[error(transparent)]
    Keyring(#[from] KeyringError),

    #[error(transparent)]
    Rng(#[from] RngError),

    /// The AEAD primitive refused to seal.
    #[error("authenticated encryption failed")]
    Seal,

    /// The AEAD tag did not match, the ciphertext or its nonce was
    /// tampered with or the wrong key was used.
    #[error("ciphertext failed authentication")]
    Auth,

    /// Sealed buffer is shorter than its nonce prefix.
    #[error("ciphertext shorter than its nonce prefix")]
    Truncated,

    /// A vouch body did not have the expected shape.
    #[error("malformed vouch body: {0}")]
    MalformedVouch(&'static str),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}
