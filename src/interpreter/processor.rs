// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use super::actors::{ActorRegistry, account::new_account_actor};
use super::gas::{GasTracker, PriceList, price_list_by_version};
use super::rewarder::BlockRewarder;
use super::runtime::InvocationContext;
use super::validation::SignedMessageValidator;
use super::{ActorError, MessageFailure, MessageValidationError, ProcessorError};
use crate::actor_error;
use crate::blocks::Tipset;
use crate::message::{METHOD_SEND, Message, Receipt, SignedMessage};
use crate::networks::{ProtocolUpgradeTable, ProtocolVersion};
use crate::shim::address::{Address, Protocol};
use crate::shim::econ::{TokenAmount, gas_cost};
use crate::shim::{clock::ChainEpoch, error::ExitCode, state_tree::StateTree};
use cid::Cid;
use fvm_ipld_blockstore::Blockstore;
use fvm_ipld_encoding::RawBytes;
use std::sync::Arc;
use tracing::{debug, warn};

/// Outcome of applying a single message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationResult {
    pub receipt: Receipt,
    /// Why the message failed, `None` on success.
    pub failure: Option<MessageFailure>,
}

impl ApplicationResult {
    fn failed(failure: MessageFailure, gas_used: u64) -> Self {
        Self {
            receipt: Receipt {
                exit_code: failure.exit_code(),
                return_data: RawBytes::default(),
                gas_used,
            },
            failure: Some(failure),
        }
    }

    pub fn exit_code(&self) -> ExitCode {
        self.receipt.exit_code
    }

    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

/// New state root and one result per applied message, in order.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub state_root: Cid,
    pub results: Vec<ApplicationResult>,
}

impl ProcessOutput {
    pub fn receipts(&self) -> Vec<Receipt> {
        self.results.iter().map(|r| r.receipt.clone()).collect()
    }
}

/// Messages of one block together with the miner credited for them.
#[derive(Debug, Clone)]
pub struct BlockMessages {
    pub miner: Address,
    pub messages: Vec<SignedMessage>,
}

/// Replays signed messages against a state tree.
///
/// The processor never writes to the node behind the base root: every batch
/// loads its own [`StateTree`] and the result is only visible through the
/// returned root.
pub struct Processor<V, R> {
    validator: V,
    rewarder: R,
    registry: ActorRegistry,
    upgrades: Arc<ProtocolUpgradeTable>,
}

impl<V, R> Processor<V, R>
where
    V: SignedMessageValidator,
    R: BlockRewarder,
{
    pub fn new(
        validator: V,
        rewarder: R,
        registry: ActorRegistry,
        upgrades: Arc<ProtocolUpgradeTable>,
    ) -> Self {
        Self {
            validator,
            rewarder,
            registry,
            upgrades,
        }
    }

    pub fn registry(&self) -> &ActorRegistry {
        &self.registry
    }

    pub fn upgrades(&self) -> &Arc<ProtocolUpgradeTable> {
        &self.upgrades
    }

    /// Applies `messages` in order on top of `base_root`, crediting gas fees
    /// to `miner`. `ancestors` is the chain below `epoch`, newest first.
    pub fn apply_messages<S: Blockstore>(
        &self,
        store: S,
        base_root: &Cid,
        messages: &[SignedMessage],
        miner: &Address,
        epoch: ChainEpoch,
        ancestors: &[Tipset],
    ) -> Result<ProcessOutput, ProcessorError> {
        let mut executor = self.executor(store, base_root, epoch, ancestors)?;
        let results = messages
            .iter()
            .map(|msg| executor.apply_message(msg, miner))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ProcessOutput {
            state_root: executor.state.flush()?,
            results,
        })
    }

    /// Applies the messages of every block of a tipset, paying each block's
    /// reward once its messages are applied.
    pub fn apply_tipset_messages<S: Blockstore>(
        &self,
        store: S,
        base_root: &Cid,
        blocks: &[BlockMessages],
        epoch: ChainEpoch,
        ancestors: &[Tipset],
    ) -> Result<ProcessOutput, ProcessorError> {
        let mut executor = self.executor(store, base_root, epoch, ancestors)?;
        let mut results = Vec::new();
        for block in blocks {
            for msg in &block.messages {
                results.push(executor.apply_message(msg, &block.miner)?);
            }
            self.rewarder
                .block_reward(&mut executor.state, &block.miner)?;
        }
        let state_root = executor.state.flush()?;
        debug!(
            "Applied {} messages at epoch {epoch}, new state root {state_root}",
            results.len()
        );
        Ok(ProcessOutput {
            state_root,
            results,
        })
    }

    fn executor<'a, S: Blockstore>(
        &'a self,
        store: S,
        base_root: &Cid,
        epoch: ChainEpoch,
        ancestors: &'a [Tipset],
    ) -> Result<Executor<'a, S, V, R>, ProcessorError> {
        let version = self.upgrades.version_at(epoch)?;
        Ok(Executor {
            processor: self,
            state: StateTree::new_from_root(store, base_root)?,
            price_list: price_list_by_version(version),
            version,
            epoch,
            ancestors,
        })
    }
}

/// State of a single batch.
struct Executor<'a, S, V, R> {
    processor: &'a Processor<V, R>,
    state: StateTree<S>,
    price_list: &'static PriceList,
    version: ProtocolVersion,
    epoch: ChainEpoch,
    ancestors: &'a [Tipset],
}

impl<S, V, R> Executor<'_, S, V, R>
where
    S: Blockstore,
    V: SignedMessageValidator,
    R: BlockRewarder,
{
    fn apply_message(
        &mut self,
        smsg: &SignedMessage,
        miner: &Address,
    ) -> Result<ApplicationResult, ProcessorError> {
        let msg = smsg.message();
        let Some(from_actor) = self.state.get_actor(&msg.from)? else {
            return Ok(ApplicationResult::failed(
                MessageFailure::ActorNotFound(msg.from),
                0,
            ));
        };
        if let Err(e) = self.processor.validator.validate(smsg, &from_actor) {
            return Ok(ApplicationResult::failed(e.into(), 0));
        }
        if from_actor.sequence == u64::MAX {
            return Ok(ApplicationResult::failed(
                MessageValidationError::Malformed("sender sequence exhausted".into()).into(),
                0,
            ));
        }

        let prepayment = msg.gas_prepayment();
        let required = prepayment.clone() + msg.value.clone();
        if from_actor.balance < required {
            return Ok(ApplicationResult::failed(
                MessageFailure::InsufficientFunds {
                    required,
                    available: from_actor.balance,
                },
                0,
            ));
        }
        self.state.mutate_actor(&msg.from, |actor| {
            actor.deduct_funds(&prepayment)?;
            actor.sequence += 1;
            Ok(())
        })?;

        let mut gas = GasTracker::new(msg.gas_limit);
        self.state.snapshot();
        let outcome = gas
            .charge_gas(self.price_list.on_chain_message(msg.chain_length()))
            .and_then(|()| self.send(&mut gas, msg))
            .and_then(|ret| {
                gas.charge_gas(self.price_list.on_chain_return_value(ret.len()))
                    .map(|()| ret)
            });

        let (return_data, failure) = match outcome {
            Ok(ret) => {
                self.state.clear_snapshot()?;
                (ret, None)
            }
            Err(err) if err.is_fatal() => {
                return Err(ProcessorError::ActorFatal {
                    cid: smsg.cid(),
                    err,
                });
            }
            Err(err) => {
                warn!(
                    "[from={}, to={}, seq={}, m={}, h={}] send error: {}",
                    msg.from, msg.to, msg.sequence, msg.method_num, self.epoch, err
                );
                self.state.revert_to_snapshot()?;
                (RawBytes::default(), Some(MessageFailure::Reverted(err)))
            }
        };

        let gas_used = gas.gas_used();
        let refund = gas_cost(&msg.gas_price, gas.gas_available());
        self.state.mutate_actor(&msg.from, |actor| {
            actor.deposit_funds(&refund);
            Ok(())
        })?;
        let fee = gas_cost(&msg.gas_price, gas_used);
        self.processor
            .rewarder
            .gas_reward(&mut self.state, miner, msg, &fee)?;

        let exit_code = failure
            .as_ref()
            .map_or(ExitCode::OK, MessageFailure::exit_code);
        Ok(ApplicationResult {
            receipt: Receipt {
                exit_code,
                return_data,
                gas_used,
            },
            failure,
        })
    }

    /// Transfers the value and invokes the receiver.
    fn send(&mut self, gas: &mut GasTracker, msg: &Message) -> Result<RawBytes, ActorError> {
        gas.charge_gas(
            self.price_list
                .on_method_invocation(&msg.value, msg.method_num),
        )?;

        let to_actor = match self.state.get_actor(&msg.to).map_err(ActorError::fatal)? {
            Some(actor) => actor,
            None => match msg.to.protocol() {
                Protocol::Secp256k1 | Protocol::BLS => {
                    gas.charge_gas(self.price_list.on_create_actor())?;
                    let actor = new_account_actor(self.state.store(), &msg.to)
                        .map_err(ActorError::fatal)?;
                    self.state
                        .set_actor(&msg.to, actor.clone())
                        .map_err(ActorError::fatal)?;
                    actor
                }
                _ => {
                    return Err(actor_error!(SYS_INVALID_RECEIVER; "actor {} not found", msg.to));
                }
            },
        };

        if !msg.value.is_zero() {
            self.transfer(&msg.from, &msg.to, &msg.value)?;
        }
        if msg.method_num == METHOD_SEND {
            return Ok(RawBytes::default());
        }

        let actor = self
            .processor
            .registry
            .get(&to_actor.code)
            .cloned()
            .ok_or_else(|| {
                actor_error!(
                    SYS_INVALID_RECEIVER;
                    "no code registered for {} ({})", to_actor.code, msg.to
                )
            })?;
        let mut ctx = InvocationContext {
            state: &mut self.state,
            gas,
            price_list: self.price_list,
            message: msg,
            epoch: self.epoch,
            version: self.version,
            ancestors: self.ancestors,
        };
        actor.invoke(&mut ctx, msg.method_num, &msg.params)
    }

    fn transfer(
        &mut self,
        from: &Address,
        to: &Address,
        value: &TokenAmount,
    ) -> Result<(), ActorError> {
        let mut from_actor = self
            .state
            .get_required_actor(from)
            .map_err(ActorError::fatal)?;
        from_actor.deduct_funds(value).map_err(|e| {
            actor_error!(SYS_INSUFFICIENT_FUNDS; "transfer from {} failed: {}", from, e)
        })?;
        self.state
            .set_actor(from, from_actor)
            .map_err(ActorError::fatal)?;
        let mut to_actor = self
            .state
            .get_required_actor(to)
            .map_err(ActorError::fatal)?;
        to_actor.deposit_funds(value);
        self.state.set_actor(to, to_actor).map_err(ActorError::fatal)
    }
}
