// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::fmt;
use std::sync::{Arc, OnceLock};

use super::{Block, CachingBlockHeader, Error, RawBlockHeader, Ticket};
use crate::shim::clock::ChainEpoch;
use cid::Cid;
use fvm_ipld_blockstore::Blockstore;
use itertools::Itertools as _;
use num_bigint::BigInt;
use nunny::{Vec as NonEmpty, vec as nonempty};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// A set of [`Cid`]s forming a unique key for a [`Tipset`].
///
/// The cids are kept sorted by their byte encoding, so equal keys always have
/// equal encodings. The key of a genesis block's parents is empty.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<Cid>", into = "Vec<Cid>")]
pub struct TipsetKey {
    cids: Vec<Cid>,
}

impl TipsetKey {
    pub fn cids(&self) -> &[Cid] {
        &self.cids
    }

    pub fn contains(&self, cid: &Cid) -> bool {
        self.cids.contains(cid)
    }

    pub fn is_empty(&self) -> bool {
        self.cids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.cids.len()
    }

    /// Returns `None` for the empty key.
    pub fn to_roots(&self) -> Option<NonEmpty<Cid>> {
        NonEmpty::new(self.cids.clone()).ok()
    }

    /// Concatenated cid bytes, the canonical byte form of the key.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.cids.iter().flat_map(Cid::to_bytes).collect()
    }
}

impl FromIterator<Cid> for TipsetKey {
    fn from_iter<T: IntoIterator<Item = Cid>>(iter: T) -> Self {
        let mut cids = iter.into_iter().collect_vec();
        cids.sort_by_cached_key(Cid::to_bytes);
        cids.dedup();
        Self { cids }
    }
}

impl From<Vec<Cid>> for TipsetKey {
    fn from(value: Vec<Cid>) -> Self {
        value.into_iter().collect()
    }
}

impl From<NonEmpty<Cid>> for TipsetKey {
    fn from(value: NonEmpty<Cid>) -> Self {
        value.into_iter().collect()
    }
}

impl From<TipsetKey> for Vec<Cid> {
    fn from(value: TipsetKey) -> Self {
        value.cids
    }
}

impl fmt::Display for TipsetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}", self.cids.iter().join(", "))
    }
}

/// An immutable set of blocks at the same height with the same parent set.
/// Blocks in a tipset are canonically ordered by ticket size.
///
/// Cloning is cheap.
#[derive(Clone, Debug)]
pub struct Tipset {
    headers: Arc<NonEmpty<CachingBlockHeader>>,
    key: Arc<OnceLock<TipsetKey>>,
}

impl PartialEq for Tipset {
    fn eq(&self, other: &Self) -> bool {
        self.headers == other.headers
    }
}

impl Eq for Tipset {}

impl From<RawBlockHeader> for Tipset {
    fn from(value: RawBlockHeader) -> Self {
        Self::from(CachingBlockHeader::new(value))
    }
}

impl From<CachingBlockHeader> for Tipset {
    fn from(value: CachingBlockHeader) -> Self {
        Self {
            headers: Arc::new(nonempty![value]),
            key: Default::default(),
        }
    }
}

impl Tipset {
    /// Builds a new Tipset from a collection of blocks.
    /// A valid tipset contains a non-empty collection of distinct blocks that
    /// have the same height and parents.
    pub fn new<H: Into<CachingBlockHeader>>(
        headers: impl IntoIterator<Item = H>,
    ) -> Result<Self, Error> {
        let mut headers = headers.into_iter().map(Into::into).collect_vec();
        verify_block_headers(&headers)?;
        headers.sort_by_cached_key(|h| h.to_sort_key());
        let headers = NonEmpty::new(headers).map_err(|_| Error::NoBlocks)?;

        Ok(Self {
            headers: Arc::new(headers),
            key: Default::default(),
        })
    }

    /// Loads the tipset for `key` from the store. Returns `None` if any of the
    /// headers is missing.
    pub fn load(store: &impl Blockstore, key: &TipsetKey) -> anyhow::Result<Option<Tipset>> {
        let mut headers = Vec::with_capacity(key.len());
        for cid in key.cids() {
            match CachingBlockHeader::load(store, *cid)? {
                Some(header) => headers.push(header),
                None => return Ok(None),
            }
        }
        if headers.is_empty() {
            return Ok(None);
        }
        Ok(Some(Tipset::new(headers)?))
    }

    /// Like [`Tipset::load`], but errors on a missing tipset.
    pub fn load_required(store: &impl Blockstore, key: &TipsetKey) -> anyhow::Result<Tipset> {
        Tipset::load(store, key)?.ok_or_else(|| Error::MissingAncestor(key.clone()).into())
    }

    /// Persists all headers of this tipset.
    pub fn persist(&self, store: &impl Blockstore) -> anyhow::Result<()> {
        for header in self.block_headers().iter() {
            header.persist(store)?;
        }
        Ok(())
    }

    /// Returns epoch of the tipset.
    pub fn epoch(&self) -> ChainEpoch {
        self.min_ticket_block().epoch
    }

    pub fn block_headers(&self) -> &NonEmpty<CachingBlockHeader> {
        &self.headers
    }

    /// Returns the smallest ticket of all blocks in the tipset
    pub fn min_ticket(&self) -> Option<&Ticket> {
        self.min_ticket_block().ticket.as_ref()
    }

    /// Returns the block with the smallest ticket of all blocks in the tipset
    pub fn min_ticket_block(&self) -> &CachingBlockHeader {
        self.headers.first()
    }

    /// Returns the smallest timestamp of all blocks in the tipset
    pub fn min_timestamp(&self) -> u64 {
        self.headers
            .iter()
            .map(|block| block.timestamp)
            .min()
            .unwrap_or_default()
    }

    /// Returns the number of blocks in the tipset.
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    /// A tipset is never empty.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Returns a key for the tipset.
    pub fn key(&self) -> &TipsetKey {
        self.key
            .get_or_init(|| self.headers.iter().map(|h| *h.cid()).collect())
    }

    /// Returns slice of `CIDs` for the current tipset
    pub fn cids(&self) -> &[Cid] {
        self.key().cids()
    }

    /// Returns the keys of the parents of the blocks in the tipset.
    pub fn parents(&self) -> &TipsetKey {
        &self.min_ticket_block().parents
    }

    /// Returns the state root for the tipset parent.
    pub fn parent_state(&self) -> &Cid {
        &self.min_ticket_block().state_root
    }

    /// Returns the tipset's calculated weight
    pub fn weight(&self) -> &BigInt {
        &self.min_ticket_block().weight
    }

    /// Returns `true` for tipsets without parents.
    pub fn is_genesis(&self) -> bool {
        self.parents().is_empty()
    }

    /// Walks the chain from this tipset down to genesis, starting with this
    /// tipset itself.
    pub fn chain<DB: Blockstore>(
        self,
        store: DB,
    ) -> Ancestors<impl FnMut(&TipsetKey) -> anyhow::Result<Option<Tipset>>> {
        Ancestors::new(self, move |key: &TipsetKey| Tipset::load(&store, key))
    }
}

fn verify_block_headers(headers: &[CachingBlockHeader]) -> Result<(), Error> {
    let Some((first, rest)) = headers.split_first() else {
        return Err(Error::NoBlocks);
    };
    for header in rest {
        if header.epoch != first.epoch {
            return Err(Error::InvalidTipset(format!(
                "epochs are not equal: {} != {}",
                header.epoch, first.epoch
            )));
        }
        if header.parents != first.parents {
            return Err(Error::InvalidTipset(format!(
                "parent cids are not equal: {} != {}",
                header.parents, first.parents
            )));
        }
    }
    if !headers.iter().map(|h| *h.cid()).all_unique() {
        return Err(Error::InvalidTipset("duplicate blocks".into()));
    }
    Ok(())
}

enum NextAncestor {
    Loaded(Tipset),
    Pending(TipsetKey),
}

/// Lazy, finite iterator over a tipset and its ancestors, ending at the tipset
/// with an empty parent key.
///
/// A failed parent lookup is yielded once as an error, after which the
/// iterator is exhausted.
pub struct Ancestors<F> {
    next: Option<NextAncestor>,
    load: F,
}

impl<F> Ancestors<F>
where
    F: FnMut(&TipsetKey) -> anyhow::Result<Option<Tipset>>,
{
    pub fn new(head: Tipset, load: F) -> Self {
        Self {
            next: Some(NextAncestor::Loaded(head)),
            load,
        }
    }

    fn schedule_parent(&mut self, tipset: &Tipset) {
        if !tipset.is_genesis() {
            self.next = Some(NextAncestor::Pending(tipset.parents().clone()));
        }
    }
}

impl<F> Iterator for Ancestors<F>
where
    F: FnMut(&TipsetKey) -> anyhow::Result<Option<Tipset>>,
{
    type Item = Result<Tipset, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        let tipset = match self.next.take()? {
            NextAncestor::Loaded(tipset) => tipset,
            NextAncestor::Pending(key) => match (self.load)(&key) {
                Ok(Some(tipset)) => tipset,
                Ok(None) => {
                    trace!("ancestor {key} not found");
                    return Some(Err(Error::MissingAncestor(key)));
                }
                Err(e) => return Some(Err(Error::Store(e.to_string()))),
            },
        };
        self.schedule_parent(&tipset);
        Some(Ok(tipset))
    }
}

impl<F> std::iter::FusedIterator for Ancestors<F> where
    F: FnMut(&TipsetKey) -> anyhow::Result<Option<Tipset>>
{
}

/// `FullTipset` is an expanded version of a tipset that contains all the blocks
/// and messages.
#[derive(Debug, Clone, PartialEq)]
pub struct FullTipset {
    /// Sorted like the headers of `tipset`, never empty.
    blocks: Vec<Block>,
    tipset: Tipset,
}

impl From<Block> for FullTipset {
    fn from(block: Block) -> Self {
        FullTipset {
            tipset: Tipset::from(block.header.clone()),
            blocks: vec![block],
        }
    }
}

impl FullTipset {
    pub fn new(blocks: impl IntoIterator<Item = Block>) -> Result<Self, Error> {
        let mut blocks = blocks.into_iter().collect_vec();
        let tipset = Tipset::new(blocks.iter().map(|b| b.header.clone()))?;
        blocks.sort_by_cached_key(|b| b.header.to_sort_key());
        Ok(Self { blocks, tipset })
    }

    /// Returns reference to all blocks in a full tipset.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Returns all blocks in a full tipset.
    pub fn into_blocks(self) -> Vec<Block> {
        self.blocks
    }

    /// Returns the header-only view of this tipset.
    pub fn tipset(&self) -> &Tipset {
        &self.tipset
    }

    /// Converts the full tipset into a [Tipset] which removes the messages
    /// attached.
    pub fn into_tipset(self) -> Tipset {
        self.tipset
    }

    /// Returns a key for the tipset.
    pub fn key(&self) -> &TipsetKey {
        self.tipset.key()
    }

    /// Returns the state root for the tipset parent.
    pub fn parent_state(&self) -> &Cid {
        self.tipset.parent_state()
    }

    /// Returns the keys of the parents of the blocks in the tipset.
    pub fn parents(&self) -> &TipsetKey {
        self.tipset.parents()
    }

    /// Returns epoch of the tipset.
    pub fn epoch(&self) -> ChainEpoch {
        self.tipset.epoch()
    }

    /// Returns the tipset's calculated weight.
    pub fn weight(&self) -> &BigInt {
        self.tipset.weight()
    }
}
