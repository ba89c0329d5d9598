// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use crate::blocks::{Tipset, TipsetKey};
use crate::metrics::{self, Cache};
use crate::shim::clock::ChainEpoch;
use fvm_ipld_blockstore::Blockstore;
use hashlink::LruCache;
use itertools::Itertools as _;
use nonzero_ext::nonzero;
use parking_lot::Mutex;
use std::num::NonZeroUsize;

use super::Error;

pub const DEFAULT_TIPSET_CACHE_SIZE: NonZeroUsize = nonzero!(8192usize);

type TipsetCache = Mutex<LruCache<TipsetKey, Tipset>>;

/// Caches loaded tipsets and answers ancestry queries over them.
pub struct ChainIndex<DB> {
    /// Recently loaded tipsets.
    ts_cache: TipsetCache,

    /// `Blockstore` pointer needed to load tipsets from cold storage.
    db: DB,
}

#[derive(Debug, Clone, Copy)]
/// Methods for resolving fetches of null tipsets.
/// Imagine epoch 10 is null but epoch 9 and 11 exist. If epoch we request epoch
/// 10, should 9 or 11 be returned?
pub enum ResolveNullTipset {
    TakeNewer,
    TakeOlder,
}

impl<DB: Blockstore> ChainIndex<DB> {
    pub fn new(db: DB, cache_size: NonZeroUsize) -> Self {
        let ts_cache = Mutex::new(LruCache::new(cache_size.get()));
        Self { ts_cache, db }
    }

    pub fn db(&self) -> &DB {
        &self.db
    }

    /// Loads a tipset from memory given the tipset keys and cache. Semantically
    /// identical to [`Tipset::load`] but the result is cached.
    pub fn load_tipset(&self, tsk: &TipsetKey) -> Result<Option<Tipset>, Error> {
        let cached = self.ts_cache.lock().get(tsk).cloned();
        metrics::record_cache_lookup(Cache::Tipset, cached.is_some());
        if cached.is_some() {
            return Ok(cached);
        }

        let Some(ts) = Tipset::load(&self.db, tsk)? else {
            return Ok(None);
        };
        self.ts_cache.lock().insert(tsk.clone(), ts.clone());
        Ok(Some(ts))
    }

    /// Like [`ChainIndex::load_tipset`], but a missing tipset is an error.
    pub fn load_required_tipset(&self, tsk: &TipsetKey) -> Result<Tipset, Error> {
        self.load_tipset(tsk)?
            .ok_or_else(|| Error::NotFound(format!("Tipset {tsk}")))
    }

    /// Find tipset at epoch `to` in the chain of ancestors starting at `from`.
    /// If the tipset is _not_ in the chain of ancestors (i.e., if the `to`
    /// epoch is higher than `from.epoch()`), an error will be returned.
    ///
    /// `from` disambiguates forks: on a forked chain the same epoch exists
    /// on every branch and only the branch below `from` is searched.
    ///
    /// If the requested epoch points to a null tipset, `resolve` decides
    /// whether the nearest older or the nearest younger tipset is returned.
    pub fn tipset_by_height(
        &self,
        to: ChainEpoch,
        from: Tipset,
        resolve: ResolveNullTipset,
    ) -> Result<Tipset, Error> {
        if to > from.epoch() {
            return Err(Error::Other(
                "Looking for tipset with height greater than start point".to_string(),
            ));
        }
        if to == from.epoch() {
            return Ok(from);
        }

        for (child, parent) in self.chain(from).tuple_windows() {
            if to == parent.epoch() {
                return Ok(parent);
            }
            if to > parent.epoch() {
                // We're at a point where child.epoch() > x > parent.epoch().
                match resolve {
                    ResolveNullTipset::TakeOlder => return Ok(parent),
                    ResolveNullTipset::TakeNewer => return Ok(child),
                }
            }
        }
        Err(Error::Other(format!("Tipset with epoch={to} does not exist")))
    }

    /// Iterate from the given tipset to genesis. Missing tipsets cut the chain
    /// short. Semantically identical to [`Tipset::chain`] but the results are
    /// cached.
    pub fn chain(&self, from: Tipset) -> impl Iterator<Item = Tipset> + '_ {
        itertools::unfold(Some(from), move |tipset| {
            tipset.take().map(|child| {
                if !child.is_genesis() {
                    *tipset = self.load_tipset(child.parents()).ok().flatten();
                }
                child
            })
        })
    }

    /// Up to `limit` tipsets starting at `from`, newest first.
    pub fn lookback(&self, from: Tipset, limit: usize) -> Vec<Tipset> {
        self.chain(from).take(limit).collect()
    }
}
