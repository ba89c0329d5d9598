// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::sync::Arc;
use std::time::Duration;

use crate::blocks::{Block, FullTipset, TipsetKey};
use crate::chain::{ChainStore, MessageProvider as _};
use anyhow::Context as _;
use async_trait::async_trait;
use fvm_ipld_blockstore::Blockstore;
use itertools::Itertools as _;
use libp2p::PeerId;
use tracing::trace;

/// Network collaborator used by the syncer to fetch chain data from peers.
///
/// Transport, retries and peer scoring belong to the implementation.
#[async_trait]
pub trait ChainNetwork: Send + Sync {
    /// Requests the tipset for `key` together with the messages of its
    /// blocks.
    async fn fetch_full_tipset(&self, peer: PeerId, key: &TipsetKey) -> anyhow::Result<FullTipset>;
}

#[async_trait]
impl<N: ChainNetwork + ?Sized> ChainNetwork for Arc<N> {
    async fn fetch_full_tipset(&self, peer: PeerId, key: &TipsetKey) -> anyhow::Result<FullTipset> {
        N::fetch_full_tipset(self, peer, key).await
    }
}

/// Context used in chain sync to handle network requests: tries the local
/// store first and bounds every network request by a timeout.
pub(in crate::chain_sync) struct SyncNetworkContext<N, DB> {
    network: N,
    chain_store: Arc<ChainStore<DB>>,
    timeout: Duration,
}

impl<N, DB> SyncNetworkContext<N, DB>
where
    N: ChainNetwork,
    DB: Blockstore,
{
    pub fn new(network: N, chain_store: Arc<ChainStore<DB>>, timeout: Duration) -> Self {
        Self {
            network,
            chain_store,
            timeout,
        }
    }

    /// Loads the full tipset from the local store, or from `peer` if any of
    /// its headers or messages is missing.
    pub async fn get_full_tipset(
        &self,
        peer: PeerId,
        key: &TipsetKey,
    ) -> Result<FullTipset, FetchError> {
        match load_full_tipset(&self.chain_store, key) {
            Ok(Some(fts)) => return Ok(fts),
            Ok(None) => {}
            Err(e) => trace!("Loading {key} locally failed: {e}"),
        }
        let fts = tokio::time::timeout(self.timeout, self.network.fetch_full_tipset(peer, key))
            .await
            .map_err(|_| FetchError::Timeout(self.timeout))?
            .map_err(FetchError::Network)?;
        if fts.key() != key {
            return Err(FetchError::Network(anyhow::anyhow!(
                "peer {peer} answered {} for {key}",
                fts.key()
            )));
        }
        Ok(fts)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Network(anyhow::Error),
}

/// Returns `None` if the tipset or any of its message collections is not
/// stored locally.
fn load_full_tipset<DB: Blockstore>(
    chain_store: &ChainStore<DB>,
    key: &TipsetKey,
) -> anyhow::Result<Option<FullTipset>> {
    let Some(ts) = chain_store.chain_index.load_tipset(key)? else {
        return Ok(None);
    };
    let db = chain_store.blockstore();
    let mut blocks = Vec::with_capacity(ts.len());
    for header in ts.block_headers().iter() {
        if !crate::chain::messages::has_messages(db, header)? {
            return Ok(None);
        }
        blocks.push(Block::new(header.clone(), db.messages_for_block(header)?));
    }
    let fts = FullTipset::new(blocks).context("stored headers do not form a tipset")?;
    trace!(
        "Loaded {} locally: {}",
        fts.key(),
        fts.blocks().iter().map(|b| b.messages().len()).join(", ")
    );
    Ok(Some(fts))
}
