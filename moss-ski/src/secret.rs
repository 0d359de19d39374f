// SPDX-License-Identifier: MIT OR Apache-2.0

#[cfg(not(test))]
use std::fmt;

use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use zeroize::ZeroizeOnDrop;

/// A symmetric key shared by all current members of a community.
///
/// Used to seal entry headers and most entry bodies.
pub type CommunityKey = Secret<32>;

/// Number of bytes in a community key.
pub const COMMUNITY_KEY_LEN: usize = 32;

/// Generic container for sensitive bytes with best-effort security
/// measures: memory is zeroised on drop, the value is hidden from debug
/// output and comparison runs in constant time.
///
/// Side-channels are ultimately a property of the deployed system
/// including its hardware, so this remains best-effort.
#[derive(Clone, Eq, Serialize, Deserialize, ZeroizeOnDrop)]
#[cfg_attr(test, derive(Debug))]
pub struct Secret<const N: usize>(#[serde(with = "serde_bytes")] [u8; N]);

impl<const N: usize> Secret<N> {
    pub(crate) fn from_bytes(bytes: [u8; N]) -> Self {
        Self(bytes)
    }

    pub(crate) fn as_bytes(&self) -> &[u8; N] {
        &self.0
    }
}

impl<const N: usize> PartialEq for Secret<N> {
    fn eq(&self, other: &Self) -> bool {
        // Constant-time comparison.
        bool::from(self.0.ct_eq(&other.0))
    }
}

#[cfg(not(test))]
impl<const N: usize> fmt::Debug for Secret<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Do not reveal secret values when printing debug info.
        f.debug_struct("Secret").field("value", &"***").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::Secret;

    #[test]
    fn equality() {
        let a = Secret::from_bytes([1u8; 32]);
        let b = Secret::from_bytes([1u8; 32]);
        let c = Secret::from_bytes([2u8; 32]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
