// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Message and receipt collections. Each collection is stored as a single
//! CBOR list; empty collections are never written and resolve to
//! [`EMPTY_COLLECTION_CID`].

use crate::blocks::{Block, RawBlockHeader};
use crate::message::{EMPTY_COLLECTION_CID, Receipt, SignedMessage};
use crate::utils::db::CborStoreExt as _;
use cid::Cid;
use fvm_ipld_blockstore::Blockstore;
use serde::{Serialize, de::DeserializeOwned};

/// Source of the message and receipt collections referenced by headers.
pub trait MessageProvider {
    /// Messages included in the block.
    fn messages_for_block(&self, header: &RawBlockHeader) -> anyhow::Result<Vec<SignedMessage>>;

    /// Receipts of the parent tipset's messages, as recorded in the block.
    fn receipts_for_block(&self, header: &RawBlockHeader) -> anyhow::Result<Vec<Receipt>>;
}

/// Stores a collection and returns its key. Empty collections are not stored.
pub fn persist_collection<DB, T>(db: &DB, items: &[T]) -> anyhow::Result<Cid>
where
    DB: Blockstore,
    T: Serialize,
{
    if items.is_empty() {
        return Ok(*EMPTY_COLLECTION_CID);
    }
    db.put_cbor_default(&items)
}

/// Loads a collection previously written with [`persist_collection`].
pub fn load_collection<DB, T>(db: &DB, key: &Cid) -> anyhow::Result<Vec<T>>
where
    DB: Blockstore,
    T: DeserializeOwned,
{
    if key == &*EMPTY_COLLECTION_CID {
        return Ok(vec![]);
    }
    db.get_cbor_required(key)
}

pub fn persist_messages<DB: Blockstore>(
    db: &DB,
    messages: &[SignedMessage],
) -> anyhow::Result<Cid> {
    persist_collection(db, messages)
}

pub fn persist_receipts<DB: Blockstore>(db: &DB, receipts: &[Receipt]) -> anyhow::Result<Cid> {
    persist_collection(db, receipts)
}

/// Persists a block header together with its messages.
pub fn persist_block<DB: Blockstore>(db: &DB, block: &Block) -> anyhow::Result<()> {
    let messages = persist_messages(db, block.messages())?;
    anyhow::ensure!(
        messages == block.header().messages,
        "block {} carries messages {messages}, header commits to {}",
        block.cid(),
        block.header().messages
    );
    block.header().persist(db)?;
    Ok(())
}

/// Returns true if the messages referenced by the header are available.
pub fn has_messages<DB: Blockstore>(db: &DB, header: &RawBlockHeader) -> anyhow::Result<bool> {
    if header.messages == *EMPTY_COLLECTION_CID {
        return Ok(true);
    }
    db.has(&header.messages)
}

impl<DB: Blockstore> MessageProvider for DB {
    fn messages_for_block(&self, header: &RawBlockHeader) -> anyhow::Result<Vec<SignedMessage>> {
        load_collection(self, &header.messages)
    }

    fn receipts_for_block(&self, header: &RawBlockHeader) -> anyhow::Result<Vec<Receipt>> {
        load_collection(self, &header.message_receipts)
    }
}
