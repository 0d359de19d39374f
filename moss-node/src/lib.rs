// SPDX-License-Identifier: MIT OR Apache-2.0

//! Authoring path and ingest pipeline of a moss node.
//!
//! Writing: an [`Author`] hands cleartext body parts to a
//! [`ChannelWriter`], which seals, hashes and signs them into an entry on
//! the shared index. Reading: a [`Node`] pops entries off the index,
//! decrypts headers, resolves authors against the cited access-channel
//! revision, verifies signatures and dispatches into per-channel stores.
//! New members enter through vouch entries plus an out-of-band
//! [`VouchPackage`].
mod author;
mod node;

pub use author::{Author, ChannelWriter, VouchPackage, WriteError};
pub use node::{Node, NodeConfig, NodeError};
