// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process-wide cryptographically-secure random number generator.
//!
//! Nonces and key material are drawn here at the moment they are needed;
//! there is no pre-generated nonce state to coordinate.
use std::sync::Mutex;

use rand_chacha::rand_core::{SeedableRng, TryRngCore};
use thiserror::Error;

/// Cryptographically-secure random number generator using the ChaCha
/// stream cipher, seeded from the operating system.
///
/// Thread-safe; clone the owning `Arc` to share it between authors and
/// nodes.
#[derive(Debug)]
pub struct Rng {
    inner: Mutex<rand_chacha::ChaCha20Rng>,
}

impl Default for Rng {
    fn default() -> Self {
        Self {
            inner: Mutex::new(rand_chacha::ChaCha20Rng::from_os_rng()),
        }
    }
}

#[cfg(any(test, feature = "test_utils"))]
impl Rng {
    /// Deterministic generator for tests.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            inner: Mutex::new(rand_chacha::ChaCha20Rng::from_seed(seed)),
        }
    }
}

impl Rng {
    /// Draw a fixed-size array of random bytes.
    pub fn random_array<const N: usize>(&self) -> Result<[u8; N], RngError> {
        let mut out = [0; N];
        self.fill(&mut out)?;
        Ok(out)
    }

    /// Draw `len` random bytes.
    pub fn random_vec(&self, len: usize) -> Result<Vec<u8>, RngError> {
        let mut out = vec![0; len];
        self.fill(&mut out)?;
        Ok(out)
    }

    fn fill(&self, out: &mut [u8]) -> Result<(), RngError> {
        let mut rng = self.inner.lock().map_err(|_| RngError::Poisoned)?;
        rng.try_fill_bytes(out).map_err(|_| RngError::Exhausted)?;
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum RngError {
    #[error("rng lock is poisoned")]
    Poisoned,

    #[error("unable to draw randomness from the operating system")]
    Exhausted,
}

#[cfg(test)]
mod tests {
    use super::Rng;

    #[test]
    fn seeded_rng_is_deterministic() {
        let first = Rng::from_seed([7; 32]).random_vec(64).unwrap();
        let second = Rng::from_seed([7; 32]).random_vec(64).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn successive_draws_differ() {
        let rng = Rng::default();
        let first: [u8; 24] = rng.random_array().unwrap();
        let second: [u8; 24] = rng.random_array().unwrap();
        assert_ne!(first, second);
    }
}
