// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory storage of all private key material held by an SKI.
//!
//! Three tables live behind one keyring-wide reader-writer lock: community
//! keys by id, signing private keys by their public key and encryption
//! private keys by their public key. Reads run concurrently; writers are
//! exclusive. Callers must not assume a key is still present after an
//! operation returns, every operation re-locks.
use std::collections::HashMap;
use std::sync::RwLock;

use moss_core::{AccessChannelId, CommunityKeyId, IdentityPublicKey};
use thiserror::Error;

use crate::rng::{Rng, RngError};
use crate::secret::CommunityKey;

/// Storage of keys. Sole owner of private key material in the process;
/// private keys are handed out only within this crate.
#[derive(Debug, Default)]
pub struct Keyring {
    inner: RwLock<Tables>,
}

#[derive(Debug, Default)]
struct Tables {
    community_keys: HashMap<CommunityKeyId, CommunityKey>,
    signing_keys: HashMap<IdentityPublicKey, ed25519_dalek::SigningKey>,
    encryption_keys: HashMap<IdentityPublicKey, crypto_box::SecretKey>,
    channels: HashMap<AccessChannelId, ChannelKeyGroup>,
}

/// The keys a member has associated with one access channel: which
/// identity they act under there and which community key seals entries.
#[derive(Debug, Default)]
struct ChannelKeyGroup {
    community_key_id: Option<CommunityKeyId>,
    signing_key: Option<IdentityPublicKey>,
    encryption_key: Option<IdentityPublicKey>,
}

impl Keyring {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate an encryption and a signing key pair, store the private
    /// halves and return the public keys as `(encryption, signing)`.
    pub fn new_identity(
        &self,
        rng: &Rng,
    ) -> Result<(IdentityPublicKey, IdentityPublicKey), KeyringError> {
        let encryption_secret = crypto_box::SecretKey::from(rng.random_array::<32>()?);
        let encryption_public = IdentityPublicKey::from_bytes(*encryption_secret.public_key().as_bytes());

        let signing_secret = ed25519_dalek::SigningKey::from_bytes(&rng.random_array::<32>()?);
        let signing_public = IdentityPublicKey::from_bytes(signing_secret.verifying_key().to_bytes());

        let mut tables = self.write()?;
        tables.signing_keys.insert(signing_public, signing_secret);
        tables.encryption_keys.insert(encryption_public, encryption_secret);
        Ok((encryption_public, signing_public))
    }

    /// Remove any private key associated with the given public key, from
    /// both the signing and the encryption table, and unbind it from every
    /// channel it was assigned to. Idempotent.
    pub fn invalidate_identity(&self, key: &IdentityPublicKey) -> Result<(), KeyringError> {
        let mut tables = self.write()?;
        tables.signing_keys.remove(key);
        tables.encryption_keys.remove(key);
        for group in tables.channels.values_mut() {
            if group.signing_key.as_ref() == Some(key) {
                group.signing_key = None;
            }
            if group.encryption_key.as_ref() == Some(key) {
                group.encryption_key = None;
            }
        }
        Ok(())
    }

    /// Assign existing public keys to an access channel, creating the
    /// channel binding if needed. Errors if either public key has no
    /// stored private half.
    pub fn bind_identity(
        &self,
        channel: AccessChannelId,
        encryption_key: IdentityPublicKey,
        signing_key: IdentityPublicKey,
    ) -> Result<(), KeyringError> {
        let mut tables = self.write()?;
        if !tables.signing_keys.contains_key(&signing_key) {
            return Err(KeyringError::UnknownKey(signing_key));
        }
        if !tables.encryption_keys.contains_key(&encryption_key) {
            return Err(KeyringError::UnknownKey(encryption_key));
        }
        let group = tables.channels.entry(channel).or_default();
        group.signing_key = Some(signing_key);
        group.encryption_key = Some(encryption_key);
        Ok(())
    }

    /// The public keys bound to an access channel, as
    /// `(encryption, signing)`.
    pub fn identity(
        &self,
        channel: &AccessChannelId,
    ) -> Result<(IdentityPublicKey, IdentityPublicKey), KeyringError> {
        let tables = self.read()?;
        let group = tables
            .channels
            .get(channel)
            .ok_or(KeyringError::UnknownChannel(*channel))?;
        match (group.encryption_key, group.signing_key) {
            (Some(encryption_key), Some(signing_key)) => Ok((encryption_key, signing_key)),
            _ => Err(KeyringError::UnboundIdentity(*channel)),
        }
    }

    /// Assign an existing community key to an access channel binding.
    pub fn bind_community_key(
        &self,
        channel: AccessChannelId,
        key_id: CommunityKeyId,
    ) -> Result<(), KeyringError> {
        let mut tables = self.write()?;
        if !tables.community_keys.contains_key(&key_id) {
            return Err(KeyringError::UnknownCommunityKey(key_id));
        }
        let group = tables
            .channels
            .get_mut(&channel)
            .ok_or(KeyringError::UnknownChannel(channel))?;
        group.community_key_id = Some(key_id);
        Ok(())
    }

    /// The id of the community key bound to an access channel.
    pub fn community_key_id(
        &self,
        channel: &AccessChannelId,
    ) -> Result<CommunityKeyId, KeyringError> {
        let tables = self.read()?;
        let group = tables
            .channels
            .get(channel)
            .ok_or(KeyringError::UnknownChannel(*channel))?;
        group
            .community_key_id
            .ok_or(KeyringError::UnboundCommunityKey(*channel))
    }

    /// Generate a fresh 32-byte community key under a random 16-byte id
    /// and return the id.
    pub fn new_community_key(&self, rng: &Rng) -> Result<CommunityKeyId, KeyringError> {
        let key = CommunityKey::from_bytes(rng.random_array()?);
        let id = CommunityKeyId::from_bytes(rng.random_array()?);
        self.write()?.community_keys.insert(id, key);
        Ok(id)
    }

    /// Insert or overwrite a community key received from another member.
    pub fn install_community_key(
        &self,
        id: CommunityKeyId,
        key: CommunityKey,
    ) -> Result<(), KeyringError> {
        self.write()?.community_keys.insert(id, key);
        Ok(())
    }

    /// Fetch a community key by its id.
    pub fn community_key(&self, id: &CommunityKeyId) -> Result<CommunityKey, KeyringError> {
        self.read()?
            .community_keys
            .get(id)
            .cloned()
            .ok_or(KeyringError::UnknownCommunityKey(*id))
    }

    pub(crate) fn signing_key(
        &self,
        public: &IdentityPublicKey,
    ) -> Result<ed25519_dalek::SigningKey, KeyringError> {
        self.read()?
            .signing_keys
            .get(public)
            .cloned()
            .ok_or(KeyringError::UnknownKey(*public))
    }

    pub(crate) fn encryption_key(
        &self,
        public: &IdentityPublicKey,
    ) -> Result<crypto_box::SecretKey, KeyringError> {
        self.read()?
            .encryption_keys
            .get(public)
            .cloned()
            .ok_or(KeyringError::UnknownKey(*public))
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Tables>, KeyringError> {
        self.inner.read().map_err(|_| KeyringError::Poisoned)
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Tables>, KeyringError> {
        self.inner.write().map_err(|_| KeyringError::Poisoned)
    }
}

#[derive(Debug, Error)]
pub enum KeyringError {
    /// No private key is stored under this public key.
    #[error("no private key found for public key {0}")]
    UnknownKey(IdentityPublicKey),

    /// No community key is stored under this id.
    #[error("community key {0} not found")]
    UnknownCommunityKey(CommunityKeyId),

    /// No key group has been created for this access channel.
    #[error("no keys bound for access channel {0}")]
    UnknownChannel(AccessChannelId),

    /// The channel's key group has no complete identity bound.
    #[error("no identity bound for access channel {0}")]
    UnboundIdentity(AccessChannelId),

    /// The channel's key group names no community key.
    #[error("no community key bound for access channel {0}")]
    UnboundCommunityKey(AccessChannelId),

    #[error("keyring lock is poisoned")]
    Poisoned,

    #[error(transparent)]
    Rng(#[from] RngError),
}
