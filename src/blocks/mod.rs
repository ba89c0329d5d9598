// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use thiserror::Error;

mod block;
mod chain_info;
mod election_proof;
mod header;
mod ticket;
pub mod tipset;
mod vrf_proof;

pub use block::{BLOCK_MESSAGE_LIMIT, Block};
pub use chain_info::ChainInfo;
pub use election_proof::ElectionProof;
pub use header::{CachingBlockHeader, RawBlockHeader, RawBlockHeaderBuilder};
pub use ticket::Ticket;
pub use tipset::{Ancestors, FullTipset, Tipset, TipsetKey};
pub use vrf_proof::VRFProof;

/// Blockchain blocks error
#[derive(Debug, PartialEq, Eq, Error)]
pub enum Error {
    /// Tipset contains invalid data, as described by the string parameter.
    #[error("Invalid tipset: {0}")]
    InvalidTipset(String),
    /// The given tipset has no blocks
    #[error("No blocks for tipset")]
    NoBlocks,
    /// A parent tipset could not be found while walking the chain.
    #[error("Missing ancestor tipset {0}")]
    MissingAncestor(TipsetKey),
    /// Invalid signature
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),
    /// Underlying block store failure.
    #[error("Block store error: {0}")]
    Store(String),
}
