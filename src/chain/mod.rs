// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT
pub mod messages;
pub mod store;
pub mod weight;


use crate::blocks::{Tipset, TipsetKey};
use crate::message::EMPTY_COLLECTION_CID;
use crate::utils::db::car::{CarReader, CarRecord, CarWriter};
use ahash::{HashSet, HashSetExt as _};
use anyhow::{Context as _, ensure};
use cid::Cid;
use futures::TryStreamExt as _;
use fvm_ipld_blockstore::Blockstore;
use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncWrite};
use tracing::{debug, info};

pub use self::{messages::MessageProvider, store::*, weight::*};

/// Writes the chain from `head` down to genesis as a CAR archive rooted at
/// the head's key. Every header is followed by its message collection and
/// receipt collection; empty collections are skipped.
pub async fn export<DB: Blockstore>(
    db: &DB,
    messages: &impl MessageProvider,
    head: &Tipset,
    writer: impl AsyncWrite + Unpin,
) -> anyhow::Result<()> {
    let roots = head.key().to_roots().context("head tipset key is empty")?;
    let mut writer = CarWriter::new(roots, writer).await?;
    let mut seen = HashSet::new();

    for tipset in head.clone().chain(db) {
        let tipset = tipset?;
        for header in tipset.block_headers().iter() {
            if seen.insert(*header.cid()) {
                let record = CarRecord {
                    cid: *header.cid(),
                    data: fvm_ipld_encoding::to_vec(&**header)?,
                };
                writer.write(&record).await?;
            }
            let block_messages = messages.messages_for_block(header)?;
            if let Some(record) = collection_record(&header.messages, &block_messages, &mut seen)? {
                writer.write(&record).await?;
            }
            let receipts = messages.receipts_for_block(header)?;
            if let Some(record) =
                collection_record(&header.message_receipts, &receipts, &mut seen)?
            {
                writer.write(&record).await?;
            }
        }
        debug!("Exported tipset at epoch {}", tipset.epoch());
    }

    let records = writer.finish().await.context("failed to flush archive")?;
    info!("Exported {records} records, head {}", head.key());
    Ok(())
}

fn collection_record<T: Serialize>(
    expected: &Cid,
    items: &[T],
    seen: &mut HashSet<Cid>,
) -> anyhow::Result<Option<CarRecord>> {
    if items.is_empty() {
        ensure!(
            expected == &*EMPTY_COLLECTION_CID,
            "collection {expected} resolved to no items"
        );
        return Ok(None);
    }
    if !seen.insert(*expected) {
        return Ok(None);
    }
    let record = CarRecord::new_cbor(fvm_ipld_encoding::to_vec(&items)?);
    ensure!(
        &record.cid == expected,
        "collection {expected} re-encodes to {}",
        record.cid
    );
    Ok(Some(record))
}

/// Reads an archive written by [`export`] into `db` and returns the head key
/// recorded in its header.
///
/// Records are checked against their content identifiers only; the chain
/// itself must still be validated before it is trusted.
pub async fn import<DB: Blockstore>(
    db: &DB,
    reader: impl AsyncBufRead + Unpin,
) -> anyhow::Result<TipsetKey> {
    let mut archive = CarReader::new(reader).await?;
    let head: TipsetKey = archive.roots().iter().copied().collect();
    let mut records = 0usize;
    while let Some(record) = archive.try_next().await? {
        db.put_keyed(&record.cid, &record.data)?;
        records += 1;
    }
    Tipset::load(db, &head)?
        .with_context(|| format!("archive roots {head} do not resolve to a tipset"))?;
    info!("Imported {records} records, head {head}");
    Ok(head)
}
