// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory stores for the moss messaging core: per-channel append-only
//! entry logs, the authorization view projected from access channels and
//! the shared distributed index nodes replicate from.
mod access;
mod channel;
mod pdi;

pub use access::{AccessChannel, AccessError, KeyEntry, RevRecord, ACCESS_REV_CODEC};
pub use channel::{ChannelProperties, ChannelStore, StoreError};
pub use pdi::Pdi;
