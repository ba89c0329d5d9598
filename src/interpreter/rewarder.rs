// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use super::actors::account::new_account_actor;
use crate::message::Message;
use crate::shim::address::{Address, REWARD_ACTOR_ADDR};
use crate::shim::{econ::TokenAmount, state_tree::StateTree};
use fvm_ipld_blockstore::Blockstore;
use tracing::debug;

/// Reward paid to a block's miner when the reward actor can afford it: 1 FIL.
pub const DEFAULT_BLOCK_REWARD_ATTO: u64 = 1_000_000_000_000_000_000;

/// Policy crediting miners for blocks and for the gas of included messages.
pub trait BlockRewarder: Send + Sync {
    /// Called once per block after its messages have been applied.
    fn block_reward<S: Blockstore>(
        &self,
        state: &mut StateTree<S>,
        miner: &Address,
    ) -> anyhow::Result<()>;

    /// Called after every executed message with the fee its sender paid.
    fn gas_reward<S: Blockstore>(
        &self,
        state: &mut StateTree<S>,
        miner: &Address,
        msg: &Message,
        fee: &TokenAmount,
    ) -> anyhow::Result<()>;
}

/// Moves the block reward out of the reward actor and credits gas fees to
/// the miner.
#[derive(Debug, Clone)]
pub struct DefaultRewarder {
    block_reward: TokenAmount,
}

impl Default for DefaultRewarder {
    fn default() -> Self {
        Self::new(TokenAmount::from_atto(DEFAULT_BLOCK_REWARD_ATTO))
    }
}

impl DefaultRewarder {
    pub fn new(block_reward: TokenAmount) -> Self {
        Self { block_reward }
    }

    fn credit<S: Blockstore>(
        state: &mut StateTree<S>,
        miner: &Address,
        amount: &TokenAmount,
    ) -> anyhow::Result<()> {
        let mut actor = match state.get_actor(miner)? {
            Some(actor) => actor,
            None => new_account_actor(state.store(), miner)?,
        };
        actor.deposit_funds(amount);
        state.set_actor(miner, actor)
    }
}

impl BlockRewarder for DefaultRewarder {
    fn block_reward<S: Blockstore>(
        &self,
        state: &mut StateTree<S>,
        miner: &Address,
    ) -> anyhow::Result<()> {
        let Some(mut reward_actor) = state.get_actor(&REWARD_ACTOR_ADDR)? else {
            debug!("No reward actor, skipping block reward for {miner}");
            return Ok(());
        };
        let reward = if reward_actor.balance < self.block_reward {
            reward_actor.balance.clone()
        } else {
            self.block_reward.clone()
        };
        if reward.is_zero() {
            return Ok(());
        }
        reward_actor.deduct_funds(&reward)?;
        state.set_actor(&REWARD_ACTOR_ADDR, reward_actor)?;
        Self::credit(state, miner, &reward)
    }

    fn gas_reward<S: Blockstore>(
        &self,
        state: &mut StateTree<S>,
        miner: &Address,
        _msg: &Message,
        fee: &TokenAmount,
    ) -> anyhow::Result<()> {
        if fee.is_zero() {
            return Ok(());
        }
        Self::credit(state, miner, fee)
    }
}

/// Pays nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRewarder;

impl BlockRewarder for NoopRewarder {
    fn block_reward<S: Blockstore>(&self, _: &mut StateTree<S>, _: &Address) -> anyhow::Result<()> {
        Ok(())
    }

    fn gas_reward<S: Blockstore>(
        &self,
        _: &mut StateTree<S>,
        _: &Address,
        _: &Message,
        _: &TokenAmount,
    ) -> anyhow::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryDB;
    use crate::interpreter::actors::REWARD_ACTOR_CODE_ID;
    use crate::shim::state_tree::ActorState;
    use cid::Cid;

    fn tree_with_reward_balance(db: &MemoryDB, balance: u64) -> StateTree<&MemoryDB> {
        let mut tree = StateTree::new(db);
        tree.set_actor(
            &REWARD_ACTOR_ADDR,
            ActorState::new(
                *REWARD_ACTOR_CODE_ID,
                Cid::default(),
                TokenAmount::from_atto(balance),
                0,
            ),
        )
        .unwrap();
        tree
    }

    #[test]
    fn block_reward_is_capped_by_reward_balance() {
        let db = MemoryDB::default();
        let mut tree = tree_with_reward_balance(&db, 7);
        let miner = Address::new_id(1000);
        DefaultRewarder::new(TokenAmount::from_atto(5))
            .block_reward(&mut tree, &miner)
            .unwrap();
        assert_eq!(
            tree.get_required_actor(&miner).unwrap().balance,
            TokenAmount::from_atto(5)
        );
        DefaultRewarder::new(TokenAmount::from_atto(5))
            .block_reward(&mut tree, &miner)
            .unwrap();
        assert_eq!(
            tree.get_required_actor(&miner).unwrap().balance,
            TokenAmount::from_atto(7)
        );
        assert!(tree.get_required_actor(&REWARD_ACTOR_ADDR).unwrap().balance.is_zero());
    }

    #[test]
    fn noop_leaves_state_alone() {
        let db = MemoryDB::default();
        let mut tree = tree_with_reward_balance(&db, 7);
        let before = tree.flush().unwrap();
        let miner = Address::new_id(1000);
        NoopRewarder.block_reward(&mut tree, &miner).unwrap();
        assert_eq!(tree.flush().unwrap(), before);
    }
}
