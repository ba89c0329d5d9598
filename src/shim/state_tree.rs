// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use super::{address::Address, econ::TokenAmount};
use crate::utils::db::CborStoreExt as _;
use ahash::HashMap;
use anyhow::{Context as _, bail, ensure};
use cid::Cid;
use fvm_ipld_blockstore::Blockstore;
use fvm_ipld_encoding::tuple::*;
use itertools::Itertools as _;

/// Version tag written in every state root.
pub const STATE_TREE_VERSION: u64 = 0;

/// State of all actor implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize_tuple, Deserialize_tuple)]
pub struct ActorState {
    /// Link to code for the actor.
    pub code: Cid,
    /// Link to the state of the actor.
    pub state: Cid,
    /// Sequence of the actor.
    pub sequence: u64,
    /// Tokens available to the actor.
    pub balance: TokenAmount,
}

impl ActorState {
    pub fn new(code: Cid, state: Cid, balance: TokenAmount, sequence: u64) -> Self {
        Self {
            code,
            state,
            sequence,
            balance,
        }
    }

    /// Safely deducts funds from an Actor
    pub fn deduct_funds(&mut self, amt: &TokenAmount) -> anyhow::Result<()> {
        ensure!(
            &self.balance >= amt,
            "Not enough funds: balance {} < {amt}",
            self.balance
        );
        self.balance = self.balance.clone() - amt.clone();
        Ok(())
    }

    /// Deposits funds to an Actor
    pub fn deposit_funds(&mut self, amt: &TokenAmount) {
        self.balance = self.balance.clone() + amt.clone();
    }
}

#[derive(Serialize_tuple, Deserialize_tuple)]
struct StateRoot {
    version: u64,
    actors: Vec<(Address, ActorState)>,
}

/// Layer of uncommitted changes, `None` marks a deletion.
type Layer = HashMap<Address, Option<ActorState>>;

/// Actor state tree with snapshot layers.
///
/// Loading a tree from a root never modifies the node behind that root: all
/// writes go to in-memory layers and [`StateTree::flush`] writes a new root.
pub struct StateTree<S> {
    store: S,
    base: HashMap<Address, ActorState>,
    layers: Vec<Layer>,
}

impl<S: Blockstore> StateTree<S> {
    /// Creates an empty state tree.
    pub fn new(store: S) -> Self {
        Self {
            store,
            base: Default::default(),
            layers: vec![Layer::default()],
        }
    }

    /// Loads the state tree rooted at `root`.
    pub fn new_from_root(store: S, root: &Cid) -> anyhow::Result<Self> {
        let StateRoot { version, actors } = store
            .get_cbor(root)?
            .with_context(|| format!("state root {root} not found"))?;
        ensure!(
            version == STATE_TREE_VERSION,
            "unsupported state tree version {version}"
        );
        Ok(Self {
            store,
            base: actors.into_iter().collect(),
            layers: vec![Layer::default()],
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Get actor state from an address.
    pub fn get_actor(&self, addr: &Address) -> anyhow::Result<Option<ActorState>> {
        for layer in self.layers.iter().rev() {
            if let Some(state) = layer.get(addr) {
                return Ok(state.clone());
            }
        }
        Ok(self.base.get(addr).cloned())
    }

    /// Like [`StateTree::get_actor`], but errors when the actor does not exist.
    pub fn get_required_actor(&self, addr: &Address) -> anyhow::Result<ActorState> {
        self.get_actor(addr)?
            .with_context(|| format!("Actor not found: addr={addr}"))
    }

    /// Set actor state for an address.
    pub fn set_actor(&mut self, addr: &Address, actor: ActorState) -> anyhow::Result<()> {
        self.top_layer()?.insert(*addr, Some(actor));
        Ok(())
    }

    /// Delete actor for an address.
    pub fn delete_actor(&mut self, addr: &Address) -> anyhow::Result<()> {
        self.top_layer()?.insert(*addr, None);
        Ok(())
    }

    /// Mutate and set actor state for an address.
    pub fn mutate_actor<F>(&mut self, addr: &Address, mutate: F) -> anyhow::Result<()>
    where
        F: FnOnce(&mut ActorState) -> anyhow::Result<()>,
    {
        let mut actor = self.get_required_actor(addr)?;
        mutate(&mut actor)?;
        self.set_actor(addr, actor)
    }

    /// Starts a layer that can be reverted on its own.
    pub fn snapshot(&mut self) {
        self.layers.push(Layer::default());
    }

    /// Discards all changes since the last [`StateTree::snapshot`].
    pub fn revert_to_snapshot(&mut self) -> anyhow::Result<()> {
        ensure!(self.layers.len() > 1, "no snapshot to revert to");
        self.layers.pop();
        Ok(())
    }

    /// Keeps all changes since the last [`StateTree::snapshot`].
    pub fn clear_snapshot(&mut self) -> anyhow::Result<()> {
        ensure!(self.layers.len() > 1, "no snapshot to clear");
        if let Some(top) = self.layers.pop() {
            self.top_layer()?.extend(top);
        }
        Ok(())
    }

    /// Writes all changes to the store and returns the new root.
    pub fn flush(&mut self) -> anyhow::Result<Cid> {
        if self.layers.len() != 1 {
            bail!(
                "tried to flush state tree with {} open snapshots",
                self.layers.len() - 1
            );
        }
        for (addr, actor) in std::mem::take(self.top_layer()?) {
            match actor {
                Some(actor) => {
                    self.base.insert(addr, actor);
                }
                None => {
                    self.base.remove(&addr);
                }
            }
        }
        let actors = self
            .base
            .iter()
            .map(|(addr, actor)| (*addr, actor.clone()))
            .sorted_by_cached_key(|(addr, _)| addr.to_bytes())
            .collect();
        self.store.put_cbor_default(&StateRoot {
            version: STATE_TREE_VERSION,
            actors,
        })
    }

    fn top_layer(&mut self) -> anyhow::Result<&mut Layer> {
        self.layers
            .last_mut()
            .context("state tree has no snapshot layer")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryDB;

    fn actor(balance: u64) -> ActorState {
        ActorState::new(
            Cid::default(),
            Cid::default(),
            TokenAmount::from_atto(balance),
            0,
        )
    }

    #[test]
    fn flush_is_deterministic_and_copy_on_write() {
        let db = MemoryDB::default();
        let mut tree = StateTree::new(&db);
        tree.set_actor(&Address::new_id(2), actor(20)).unwrap();
        tree.set_actor(&Address::new_id(1), actor(10)).unwrap();
        let root = tree.flush().unwrap();

        let mut other = StateTree::new(&db);
        other.set_actor(&Address::new_id(1), actor(10)).unwrap();
        other.set_actor(&Address::new_id(2), actor(20)).unwrap();
        assert_eq!(other.flush().unwrap(), root);

        let mut child = StateTree::new_from_root(&db, &root).unwrap();
        child.delete_actor(&Address::new_id(2)).unwrap();
        let child_root = child.flush().unwrap();
        assert_ne!(child_root, root);

        let base = StateTree::new_from_root(&db, &root).unwrap();
        assert_eq!(base.get_actor(&Address::new_id(2)).unwrap(), Some(actor(20)));
    }

    #[test]
    fn unchanged_tree_flushes_to_same_root() {
        let db = MemoryDB::default();
        let mut tree = StateTree::new(&db);
        tree.set_actor(&Address::new_id(1), actor(10)).unwrap();
        let root = tree.flush().unwrap();
        let mut reloaded = StateTree::new_from_root(&db, &root).unwrap();
        assert_eq!(reloaded.flush().unwrap(), root);
    }

    #[test]
    fn snapshots_revert_and_merge() {
        let db = MemoryDB::default();
        let mut tree = StateTree::new(&db);
        let addr = Address::new_id(1);
        tree.set_actor(&addr, actor(10)).unwrap();

        tree.snapshot();
        tree.mutate_actor(&addr, |a| a.deduct_funds(&TokenAmount::from_atto(4)))
            .unwrap();
        assert_eq!(tree.get_required_actor(&addr).unwrap().balance, TokenAmount::from_atto(6));
        tree.revert_to_snapshot().unwrap();
        assert_eq!(tree.get_required_actor(&addr).unwrap().balance, TokenAmount::from_atto(10));

        tree.snapshot();
        tree.mutate_actor(&addr, |a| {
            a.deposit_funds(&TokenAmount::from_atto(5));
            Ok(())
        })
        .unwrap();
        tree.clear_snapshot().unwrap();
        assert_eq!(tree.get_required_actor(&addr).unwrap().balance, TokenAmount::from_atto(15));
        assert!(tree.revert_to_snapshot().is_err());
    }

    #[test]
    fn flush_with_open_snapshot_fails() {
        let db = MemoryDB::default();
        let mut tree = StateTree::new(&db);
        tree.snapshot();
        assert!(tree.flush().is_err());
    }

    #[test]
    fn overdraft_is_rejected() {
        let mut a = actor(3);
        assert!(a.deduct_funds(&TokenAmount::from_atto(4)).is_err());
        assert_eq!(a.balance, TokenAmount::from_atto(3));
    }
}
