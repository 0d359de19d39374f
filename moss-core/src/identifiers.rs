// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fixed-size binary identifiers used throughout the wire format.
//!
//! Every identifier is a thin newtype over a byte array with hex formatting
//! for humans and raw bytes on the wire. Which keyring table holds the
//! private half of an [`IdentityPublicKey`] determines whether it names a
//! signing or an encryption key; the type itself does not distinguish them.
use thiserror::Error;

/// Error types for parsing identifiers from bytes or hex strings.
#[derive(Error, Debug)]
pub enum IdentifierError {
    /// Input has the wrong number of bytes for this identifier.
    #[error("invalid identifier length {0} bytes, expected {1} bytes")]
    InvalidLength(usize, usize),

    /// Input string contains invalid hexadecimal characters.
    #[error("invalid hex encoding in identifier string")]
    InvalidHexEncoding(#[from] hex::FromHexError),
}

macro_rules! byte_id {
    ($(#[$attr:meta])* $name:ident, $len:expr) => {
        $(#[$attr])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name([u8; $len]);

        impl $name {
            /// Size of this identifier in bytes.
            pub const LENGTH: usize = $len;

            /// Create an identifier from its raw bytes representation.
            pub const fn from_bytes(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }

            /// Bytes of the identifier.
            pub const fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            /// Convert the identifier to a hex string.
            pub fn to_hex(&self) -> String {
                ::hex::encode(self.0)
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl From<[u8; $len]> for $name {
            fn from(value: [u8; $len]) -> Self {
                Self(value)
            }
        }

        impl From<$name> for [u8; $len] {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl TryFrom<&[u8]> for $name {
            type Error = crate::identifiers::IdentifierError;

            fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
                let checked: [u8; $len] = value.try_into().map_err(|_| {
                    crate::identifiers::IdentifierError::InvalidLength(value.len(), $len)
                })?;
                Ok(Self(checked))
            }
        }

        impl ::std::str::FromStr for $name {
            type Err = crate::identifiers::IdentifierError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                Self::try_from(::hex::decode(value)?.as_slice())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self([0; $len])
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                write!(f, "{}", self.to_hex())
            }
        }

        impl ::std::fmt::Debug for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.debug_tuple(stringify!($name)).field(&self.to_hex()).finish()
            }
        }

        impl ::serde::Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: ::serde::Serializer,
            {
                crate::serde::serialize_hex(&self.0, serializer)
            }
        }

        impl<'de> ::serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: ::serde::Deserializer<'de>,
            {
                let bytes = crate::serde::deserialize_hex(deserializer)?;
                bytes.as_slice().try_into().map_err(
                    |err: crate::identifiers::IdentifierError| {
                        ::serde::de::Error::custom(err.to_string())
                    },
                )
            }
        }
    };
}

pub(crate) use byte_id;

byte_id!(
    /// Public address of a community member.
    ///
    /// The rightmost 20 bytes of the member's identity signing public key.
    /// Collision probability over 160 bits is negligible at community scale.
    IdentityAddr,
    20
);

byte_id!(
    /// Public half of an identity key pair, either for signing or encryption.
    IdentityPublicKey,
    32
);

byte_id!(
    /// Identifies a moss community.
    CommunityId,
    20
);

byte_id!(
    /// Identifies a shared community-wide symmetric key.
    ///
    /// Entry headers carry the id of the community key they were sealed
    /// with, so receivers know which key to decrypt them with.
    CommunityKeyId,
    16
);

byte_id!(
    /// Identifies a channel entries are posted to.
    ChannelId,
    20
);

byte_id!(
    /// Detached signature over an entry hash.
    EntrySig,
    64
);

/// Denotes a channel whose role is access control.
///
/// Access channels and content channels share the same data structure;
/// "access channel" is a role, not a subtype.
pub type AccessChannelId = ChannelId;

impl IdentityAddr {
    /// Derive a member address from an identity signing public key.
    pub fn from_signing_key(key: &IdentityPublicKey) -> Self {
        let bytes = key.as_bytes();
        let mut addr = [0; Self::LENGTH];
        addr.copy_from_slice(&bytes[IdentityPublicKey::LENGTH - Self::LENGTH..]);
        Self(addr)
    }
}

impl ChannelId {
    /// The community's root access channel.
    ///
    /// Members listed in this channel are the community admins; the
    /// hierarchy of access channels is rooted here.
    pub const ROOT_ACCESS: ChannelId = ChannelId::reserved(1);

    /// The community's master member registry.
    pub const MEMBER_REGISTRY: ChannelId = ChannelId::reserved(2);

    /// Where the existence of community-public channels is announced.
    pub const CHANNEL_CATALOG: ChannelId = ChannelId::reserved(3);

    const fn reserved(tag: u8) -> Self {
        let mut bytes = [0; Self::LENGTH];
        bytes[Self::LENGTH - 1] = tag;
        Self(bytes)
    }
}
