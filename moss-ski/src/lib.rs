// SPDX-License-Identifier: MIT OR Apache-2.0

//! `moss-ski` is the secure key interface of the moss messaging core: a
//! process-isolated keyring and crypto oracle holding all long-lived
//! secret material.
//!
//! The SKI exposes only opaque operations (sign, verify, encrypt, decrypt,
//! encrypt-for-recipient, vouch, accept-vouch); plaintext secrets never
//! cross its boundary. Community keys are generated here, wrapped for new
//! members via [`Ski::vouch`] and installed on receipt via
//! [`Ski::accept_vouch`].
mod keyring;
mod rng;
mod secret;
mod ski;

pub use keyring::{Keyring, KeyringError};
pub use rng::{Rng, RngError};
pub use secret::{CommunityKey, Secret, COMMUNITY_KEY_LEN};
pub use ski::{verify, Ski, SkiError, NONCE_LEN, VOUCH_CODEC};
