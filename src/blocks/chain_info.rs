// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use super::TipsetKey;
use crate::shim::clock::ChainEpoch;
use libp2p::PeerId;
use std::fmt;

/// A peer's claim about the head of its chain. Only used as sync input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChainInfo {
    /// The originator of the claim.
    pub peer: PeerId,
    pub head: TipsetKey,
    pub height: ChainEpoch,
}

impl ChainInfo {
    pub fn new(peer: PeerId, head: TipsetKey, height: ChainEpoch) -> Self {
        Self { peer, head, height }
    }
}

impl fmt::Display for ChainInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{peer={} height={} head={}}}",
            self.peer, self.height, self.head
        )
    }
}
