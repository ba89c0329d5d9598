// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::num::NonZeroUsize;
use std::sync::Arc;

use crate::blocks::{CachingBlockHeader, Tipset, TipsetKey};
use crate::chain::weight::is_heavier;
use crate::db::{HEAD_KEY, SettingsStore, SettingsStoreExt as _};
use crate::networks::ChainConfig;
use ahash::HashSet;
use cid::Cid;
use fvm_ipld_blockstore::Blockstore;
use parking_lot::Mutex;
use tokio::sync::broadcast::{self, Receiver as Subscriber, Sender as Publisher};
use tracing::{debug, info};

use super::{Error, index::ChainIndex};

// A cap on the number of buffered head changes per subscriber
const SINK_CAP: usize = 200;

/// `Enum` for `pubsub` channel that defines message type variant and data
/// contained in message type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HeadChange {
    Apply(Tipset),
}

/// Stores chain data such as heaviest tipset and cached tipset info at each
/// epoch. This structure is thread-safe, and all caches are wrapped in a mutex
/// to allow a consistent `ChainStore` to be shared across tasks.
pub struct ChainStore<DB> {
    /// Publisher for head change events
    publisher: Publisher<HeadChange>,

    /// key-value `datastore`.
    pub db: Arc<DB>,

    /// Settings store
    settings: Arc<dyn SettingsStore + Sync + Send>,

    /// Used as a cache for tipset `lookbacks`.
    pub chain_index: Arc<ChainIndex<Arc<DB>>>,

    chain_config: Arc<ChainConfig>,

    genesis_block_header: CachingBlockHeader,

    /// Serializes every head update.
    head_lock: Mutex<()>,

    /// validated blocks
    validated_blocks: Mutex<HashSet<Cid>>,
}

impl<DB> ChainStore<DB>
where
    DB: Blockstore,
{
    pub fn new(
        db: Arc<DB>,
        settings: Arc<dyn SettingsStore + Sync + Send>,
        chain_config: Arc<ChainConfig>,
        genesis_block_header: CachingBlockHeader,
        tipset_cache_size: NonZeroUsize,
    ) -> anyhow::Result<Self> {
        let (publisher, _) = broadcast::channel(SINK_CAP);
        let chain_index = Arc::new(ChainIndex::new(Arc::clone(&db), tipset_cache_size));
        genesis_block_header.persist(&db)?;

        let head = read_head(settings.as_ref())?;
        let head_is_loadable = match &head {
            Some(key) => chain_index.load_tipset(key)?.is_some(),
            None => false,
        };
        if !head_is_loadable {
            let genesis_key = TipsetKey::from_iter([*genesis_block_header.cid()]);
            write_head(settings.as_ref(), &genesis_key)?;
        }

        let validated_blocks = Mutex::new(HashSet::from_iter([*genesis_block_header.cid()]));

        Ok(Self {
            publisher,
            db,
            settings,
            chain_index,
            chain_config,
            genesis_block_header,
            head_lock: Mutex::new(()),
            validated_blocks,
        })
    }

    /// Returns key-value store instance.
    pub fn blockstore(&self) -> &Arc<DB> {
        &self.db
    }

    pub fn chain_config(&self) -> &Arc<ChainConfig> {
        &self.chain_config
    }

    /// Returns genesis [`CachingBlockHeader`].
    pub fn genesis(&self) -> &CachingBlockHeader {
        &self.genesis_block_header
    }

    pub fn genesis_tipset(&self) -> Tipset {
        Tipset::from(self.genesis_block_header.clone())
    }

    /// Returns the currently tracked heaviest tipset.
    pub fn heaviest_tipset(&self) -> Result<Tipset, Error> {
        let key = read_head(self.settings.as_ref())?
            .ok_or_else(|| Error::NotFound("Head tipset key".into()))?;
        self.chain_index.load_required_tipset(&key)
    }

    /// Subscribes to every committed head.
    pub fn subscribe_head_changes(&self) -> Subscriber<HeadChange> {
        self.publisher.subscribe()
    }

    /// Returns Tipset from key-value store from provided CIDs. An empty key
    /// resolves to the current head.
    pub fn tipset_from_keys(&self, tsk: &TipsetKey) -> Result<Tipset, Error> {
        if tsk.is_empty() {
            return self.heaviest_tipset();
        }
        self.chain_index.load_required_tipset(tsk)
    }

    /// Returns true if every header of the tipset is stored locally.
    pub fn has_tipset(&self, tsk: &TipsetKey) -> Result<bool, Error> {
        Ok(!tsk.is_empty() && self.chain_index.load_tipset(tsk)?.is_some())
    }

    /// Writes tipset block headers to data store.
    pub fn put_tipset(&self, ts: &Tipset) -> Result<(), Error> {
        ts.persist(self.blockstore())?;
        Ok(())
    }

    /// Replaces the head with `ts` if it wins fork choice against the current
    /// head. Returns `true` if the head changed.
    pub fn update_heaviest(&self, ts: &Tipset) -> Result<bool, Error> {
        let _guard = self.head_lock.lock();
        let current = self.heaviest_tipset()?;
        if !is_heavier(ts, &current) {
            debug!(
                "Ignoring tipset {} (epoch {}, weight {}), head {} is at least as heavy",
                ts.key(),
                ts.epoch(),
                ts.weight(),
                current.key()
            );
            return Ok(false);
        }
        info!("New heaviest tipset! {} (EPOCH = {})", ts.key(), ts.epoch());
        self.set_heaviest_tipset(ts.clone())?;
        Ok(true)
    }

    /// Makes `ts` the head regardless of its weight.
    pub fn force_head(&self, ts: &Tipset) -> Result<(), Error> {
        let _guard = self.head_lock.lock();
        info!("Setting head to {} (EPOCH = {})", ts.key(), ts.epoch());
        self.set_heaviest_tipset(ts.clone())
    }

    /// Sets heaviest tipset within `ChainStore` and store its tipset keys in
    /// the settings store under the [`HEAD_KEY`] key.
    fn set_heaviest_tipset(&self, ts: Tipset) -> Result<(), Error> {
        write_head(self.settings.as_ref(), ts.key())?;
        crate::chain_sync::metrics::HEAD_EPOCH.set(ts.epoch());
        if self.publisher.send(HeadChange::Apply(ts)).is_err() {
            debug!("did not publish head change, no active receivers");
        }
        Ok(())
    }

    /// Checks if block has already been validated.
    pub fn is_block_validated(&self, cid: &Cid) -> bool {
        let validated = self.validated_blocks.lock().contains(cid);
        if validated {
            debug!("Block {cid} was previously validated");
        }
        validated
    }

    /// Returns true if every block of the tipset has been validated.
    pub fn is_tipset_validated(&self, ts: &Tipset) -> bool {
        let validated = self.validated_blocks.lock();
        ts.cids().iter().all(|cid| validated.contains(cid))
    }

    /// Marks block as validated.
    pub fn mark_block_as_validated(&self, cid: &Cid) {
        self.validated_blocks.lock().insert(*cid);
    }

    pub fn unmark_block_as_validated(&self, cid: &Cid) {
        let _did_work = self.validated_blocks.lock().remove(cid);
    }
}

fn read_head(settings: &(dyn SettingsStore + Sync + Send)) -> anyhow::Result<Option<TipsetKey>> {
    settings.read_cbor(HEAD_KEY)
}

fn write_head(
    settings: &(dyn SettingsStore + Sync + Send),
    key: &TipsetKey,
) -> anyhow::Result<()> {
    settings.write_cbor(HEAD_KEY, key)
}
