// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

#[cfg(test)]
mod tests;
pub mod utils;

use crate::blocks::{Tipset, TipsetKey};
use crate::chain::{ChainStore, messages::persist_receipts};
use crate::interpreter::{ApplicationResult, BlockRewarder, Processor, SignedMessageValidator};
use crate::interpreter::actors::init;
use crate::message::EMPTY_COLLECTION_CID;
use crate::metrics::{self, Cache};
use crate::networks::{ChainConfig, ProtocolVersion};
use crate::shim::address::{Address, INIT_ACTOR_ADDR};
use crate::shim::clock::ChainEpoch;
use crate::shim::state_tree::{ActorState, StateTree};
use crate::utils::db::CborStoreExt as _;
use anyhow::Context as _;
use cid::Cid;
use fvm_ipld_blockstore::Blockstore;
use hashlink::LruCache;
use nonzero_ext::nonzero;
use parking_lot::Mutex as SyncMutex;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::Mutex as TokioMutex;
use tracing::{debug, instrument};

pub use utils::{block_messages_for_full_tipset, block_messages_for_tipset};

pub const DEFAULT_TIPSET_STATE_CACHE_SIZE: NonZeroUsize = nonzero!(1024usize);

/// State root and receipt root produced by executing a tipset's messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TipsetState {
    pub state_root: Cid,
    pub receipt_root: Cid,
}

/// Result of executing a tipset, with one result per executed message.
#[derive(Debug, Clone)]
pub struct StateOutput {
    pub state: TipsetState,
    pub results: Vec<ApplicationResult>,
}

// Various structures for implementing the tipset state cache

struct TipsetStateCacheInner {
    values: LruCache<TipsetKey, TipsetState>,
    pending: Vec<(TipsetKey, Arc<TokioMutex<()>>)>,
}

/// Caches tipset states. A state that is being computed is guarded by a
/// per-key lock so concurrent callers wait instead of computing it twice.
struct TipsetStateCache {
    cache: SyncMutex<TipsetStateCacheInner>,
}

enum Status {
    Done(TipsetState),
    Empty(Arc<TokioMutex<()>>),
}

impl TipsetStateCache {
    fn with_size(cache_size: NonZeroUsize) -> Self {
        Self {
            cache: SyncMutex::new(TipsetStateCacheInner {
                values: LruCache::new(cache_size.get()),
                pending: Vec::with_capacity(8),
            }),
        }
    }

    async fn get_or_else<F, Fut>(&self, key: &TipsetKey, compute: F) -> anyhow::Result<TipsetState>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<TipsetState>>,
    {
        let status = {
            let mut inner = self.cache.lock();
            match inner.values.get(key) {
                Some(v) => {
                    metrics::record_cache_lookup(Cache::TipsetState, true);
                    Status::Done(*v)
                }
                None => {
                    metrics::record_cache_lookup(Cache::TipsetState, false);
                    let pending = inner
                        .pending
                        .iter()
                        .find(|(k, _)| k == key)
                        .map(|(_, mutex)| mutex.clone());
                    match pending {
                        Some(mutex) => Status::Empty(mutex),
                        None => {
                            let mutex = Arc::new(TokioMutex::new(()));
                            inner.pending.push((key.clone(), mutex.clone()));
                            Status::Empty(mutex)
                        }
                    }
                }
            }
        };
        match status {
            Status::Done(x) => Ok(x),
            Status::Empty(mtx) => {
                let _guard = mtx.lock().await;
                if let Some(v) = self.get(key) {
                    // While locking someone else computed the pending task
                    return Ok(v);
                }
                let result = compute().await;
                let mut inner = self.cache.lock();
                inner.pending.retain(|(k, _)| k != key);
                if let Ok(value) = &result {
                    inner.values.insert(key.clone(), *value);
                }
                result
            }
        }
    }

    fn get(&self, key: &TipsetKey) -> Option<TipsetState> {
        self.cache.lock().values.get(key).copied()
    }
}

/// Computes and caches the state produced by executing tipsets on top of
/// their parent state.
pub struct StateManager<DB, V, R> {
    cs: Arc<ChainStore<DB>>,
    processor: Processor<V, R>,
    /// This is a cache which indexes tipsets to their calculated state.
    cache: TipsetStateCache,
}

impl<DB, V, R> StateManager<DB, V, R>
where
    DB: Blockstore,
    V: SignedMessageValidator,
    R: BlockRewarder,
{
    pub fn new(
        cs: Arc<ChainStore<DB>>,
        processor: Processor<V, R>,
        cache_size: NonZeroUsize,
    ) -> Self {
        Self {
            cs,
            processor,
            cache: TipsetStateCache::with_size(cache_size),
        }
    }

    pub fn chain_store(&self) -> &Arc<ChainStore<DB>> {
        &self.cs
    }

    pub fn chain_config(&self) -> &Arc<ChainConfig> {
        self.cs.chain_config()
    }

    pub fn processor(&self) -> &Processor<V, R> {
        &self.processor
    }

    /// Returns key-value store instance.
    pub fn blockstore(&self) -> &Arc<DB> {
        self.cs.blockstore()
    }

    /// Returns the protocol version active at `epoch`.
    pub fn network_version(&self, epoch: ChainEpoch) -> anyhow::Result<ProtocolVersion> {
        Ok(self.processor.upgrades().version_at(epoch)?)
    }

    /// Gets actor from given [`Cid`], if it exists.
    pub fn get_actor(&self, addr: &Address, state_cid: &Cid) -> anyhow::Result<Option<ActorState>> {
        StateTree::new_from_root(self.blockstore(), state_cid)?.get_actor(addr)
    }

    /// Returns the network name recorded by the init actor.
    pub fn get_network_name(&self, state_cid: &Cid) -> anyhow::Result<String> {
        let init_actor = self
            .get_actor(&INIT_ACTOR_ADDR, state_cid)?
            .context("init actor not found")?;
        let state: init::State = self.blockstore().get_cbor_required(&init_actor.state)?;
        Ok(state.network_name)
    }

    /// Executes the messages of `tipset` on top of its parent state and
    /// persists the receipts. Genesis carries no messages and yields its own
    /// state.
    #[instrument(skip_all, fields(epoch = tipset.epoch()))]
    pub fn compute_tipset_state_blocking(&self, tipset: &Tipset) -> anyhow::Result<StateOutput> {
        if tipset.is_genesis() {
            return Ok(StateOutput {
                state: TipsetState {
                    state_root: *tipset.parent_state(),
                    receipt_root: *EMPTY_COLLECTION_CID,
                },
                results: vec![],
            });
        }
        let db = self.blockstore();
        let blocks = block_messages_for_tipset(db, tipset)?;
        let ancestors = self
            .cs
            .chain_index
            .lookback(tipset.clone(), self.chain_config().ancestor_lookback.max(1));
        let output = self.processor.apply_tipset_messages(
            db,
            tipset.parent_state(),
            &blocks,
            tipset.epoch(),
            &ancestors,
        )?;
        let receipt_root = persist_receipts(db, &output.receipts())?;
        debug!(
            "Computed state of {}: state root {}, receipts {}",
            tipset.key(),
            output.state_root,
            receipt_root
        );
        Ok(StateOutput {
            state: TipsetState {
                state_root: output.state_root,
                receipt_root,
            },
            results: output.results,
        })
    }
}

impl<DB, V, R> StateManager<DB, V, R>
where
    DB: Blockstore + Send + Sync + 'static,
    V: SignedMessageValidator + 'static,
    R: BlockRewarder + 'static,
{
    /// Returns the state produced by `tipset`, computing it at most once.
    pub async fn tipset_state(self: &Arc<Self>, tipset: &Tipset) -> anyhow::Result<TipsetState> {
        self.cache
            .get_or_else(tipset.key(), || async {
                Ok(self.compute_tipset_state(tipset.clone()).await?.state)
            })
            .await
    }

    /// Runs [`StateManager::compute_tipset_state_blocking`] off the async
    /// executor.
    pub async fn compute_tipset_state(
        self: &Arc<Self>,
        tipset: Tipset,
    ) -> anyhow::Result<StateOutput> {
        let this = Arc::clone(self);
        tokio::task::spawn_blocking(move || this.compute_tipset_state_blocking(&tipset)).await?
    }
}
