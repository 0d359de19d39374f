// SPDX-License-Identifier: MIT OR Apache-2.0

//! Canonical CBOR encoding.
//!
//! Every serialized structure in moss (headers, bodies, vouch messages,
//! revision records, wire entries) goes through these helpers so peers
//! agree on one deterministic byte representation.
use ciborium::de::Error as DeserializeError;
use ciborium::ser::Error as SerializeError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Encode a value into canonical CBOR bytes.
pub fn to_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, EncodeError> {
    let mut bytes = Vec::new();
    ciborium::ser::into_writer(value, &mut bytes).map_err(Into::<EncodeError>::into)?;
    Ok(bytes)
}

/// Decode a value from CBOR bytes.
pub fn from_bytes<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, DecodeError> {
    let value = ciborium::de::from_reader::<T, _>(bytes).map_err(Into::<DecodeError>::into)?;
    Ok(value)
}

#[derive(Debug, Error)]
pub enum EncodeError {
    /// An error occurred while writing bytes.
    #[error("an error occurred while writing bytes: {0}")]
    Io(std::io::Error),

    /// A value cannot be serialized, with a description of the problem
    /// delivered from serde.
    #[error("an error occurred while serializing value: {0}")]
    Value(String),
}

impl From<SerializeError<std::io::Error>> for EncodeError {
    fn from(value: SerializeError<std::io::Error>) -> Self {
        match value {
            SerializeError::Io(err) => EncodeError::Io(err),
            SerializeError::Value(err) => EncodeError::Value(err),
        }
    }
}

#[derive(Debug, Error)]
pub enum DecodeError {
    /// An error occurred while reading bytes.
    #[error("an error occurred while reading bytes: {0}")]
    Io(std::io::Error),

    /// A syntax error in the byte stream, with the offset where it
    /// occurred.
    #[error("an error occurred while parsing bytes at position {0}")]
    Syntax(usize),

    /// A parsed value could not be processed.
    #[error("an error occurred while processing a parsed value at position {0:?}: {1}")]
    Semantic(Option<usize>, String),

    /// The input caused serde to recurse too much.
    #[error("recursion limit exceeded while decoding")]
    RecursionLimitExceeded,
}

impl From<DeserializeError<std::io::Error>> for DecodeError {
    fn from(value: DeserializeError<std::io::Error>) -> Self {
        match value {
            DeserializeError::Io(err) => DecodeError::Io(err),
            DeserializeError::Syntax(offset) => DecodeError::Syntax(offset),
            DeserializeError::Semantic(offset, description) => {
                DecodeError::Semantic(offset, description)
            }
            DeserializeError::RecursionLimitExceeded => DecodeError::RecursionLimitExceeded,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use crate::entry::{Header, Verb};
    use crate::identifiers::{ChannelId, IdentityAddr};

    use super::{from_bytes, to_bytes, DecodeError};

    #[test]
    fn header_roundtrip() {
        let mut aux = BTreeMap::new();
        aux.insert("topic".to_string(), "gardening".to_string());

        let header = Header {
            timestamp: 1_700_000_000_000_000,
            verb: Verb::PostEntry,
            channel_id: ChannelId::from_bytes([9; 20]),
            author: IdentityAddr::from_bytes([1; 20]),
            access_channel_id: ChannelId::ROOT_ACCESS,
            access_channel_rev: 4,
            aux: Some(aux),
        };

        let bytes = to_bytes(&header).unwrap();
        let header_again: Header = from_bytes(&bytes).unwrap();
        assert_eq!(header, header_again);
    }

    #[test]
    fn encoding_is_deterministic() {
        let header = Header {
            timestamp: 42,
            verb: Verb::ChannelAdmin,
            channel_id: ChannelId::ROOT_ACCESS,
            author: IdentityAddr::from_bytes([1; 20]),
            access_channel_id: ChannelId::ROOT_ACCESS,
            access_channel_rev: 0,
            aux: None,
        };
        assert_eq!(to_bytes(&header).unwrap(), to_bytes(&header).unwrap());
    }

    #[test]
    fn garbage_is_rejected() {
        let result: Result<Header, DecodeError> = from_bytes(&[0xff, 0x00, 0x13, 0x37]);
        assert!(result.is_err());
    }
}
