// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use super::CachingBlockHeader;
use crate::message::SignedMessage;
use crate::utils::cid::CidCborExt as _;
use cid::Cid;

/// Limit of messages a single block may carry.
pub const BLOCK_MESSAGE_LIMIT: usize = 10000;

/// A complete Filecoin block. This contains the block header as well as all
/// messages included in the block.
#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    pub header: CachingBlockHeader,
    pub messages: Vec<SignedMessage>,
}

impl Block {
    pub fn new(header: CachingBlockHeader, messages: Vec<SignedMessage>) -> Self {
        Self { header, messages }
    }

    pub fn header(&self) -> &CachingBlockHeader {
        &self.header
    }

    pub fn messages(&self) -> &[SignedMessage] {
        &self.messages
    }

    /// Returns block's [`Cid`].
    pub fn cid(&self) -> &Cid {
        self.header.cid()
    }

    /// [`Cid`] of the message collection carried by this block, to be
    /// compared with the header's `messages` field.
    pub fn computed_messages_cid(&self) -> anyhow::Result<Cid> {
        Ok(Cid::from_cbor_blake2b256(&self.messages)?)
    }
}
