// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use super::{ActorError, GasCharge, GasTracker, PriceList};
use crate::actor_error;
use crate::blocks::Tipset;
use crate::message::Message;
use crate::networks::ProtocolVersion;
use crate::shim::{address::Address, clock::ChainEpoch, state_tree::StateTree};
use crate::utils::{cid::CidCborExt as _, encoding::blake2b_256};
use cid::Cid;
use fvm_ipld_blockstore::Blockstore;
use fvm_ipld_encoding::RawBytes;
use serde::{Serialize, de::DeserializeOwned};

/// Runtime is the VM's internal runtime object exposed to actors.
pub trait Runtime {
    /// The message that triggered this invocation.
    fn message(&self) -> &Message;

    /// The address of the actor receiving the message.
    fn receiver(&self) -> &Address {
        &self.message().to
    }

    /// The address of the immediate calling actor.
    fn caller(&self) -> &Address {
        &self.message().from
    }

    /// The current chain epoch number.
    fn curr_epoch(&self) -> ChainEpoch;

    /// The protocol version active at the current epoch.
    fn network_version(&self) -> ProtocolVersion;

    fn price_list(&self) -> &'static PriceList;

    /// Charges gas, failing the invocation if the limit is exceeded.
    fn charge_gas(&mut self, charge: GasCharge) -> Result<(), ActorError>;

    fn gas_used(&self) -> u64;

    /// Loads the encoded state of the receiver.
    fn state_raw(&mut self) -> Result<Vec<u8>, ActorError>;

    /// Replaces the state of the receiver with already encoded bytes.
    fn set_state_raw(&mut self, bytes: Vec<u8>) -> Result<(), ActorError>;

    /// Randomness derived from the ticket chain at or below `epoch`.
    fn sample_chain_randomness(&mut self, epoch: ChainEpoch) -> Result<[u8; 32], ActorError>;

    fn validate_immediate_caller_is(&self, addr: &Address) -> Result<(), ActorError> {
        if self.caller() == addr {
            Ok(())
        } else {
            Err(actor_error!(USR_FORBIDDEN; "caller {} is not {}", self.caller(), addr))
        }
    }
}

/// Typed state access on top of [`Runtime`].
pub trait RuntimeExt: Runtime {
    fn state<T: DeserializeOwned>(&mut self) -> Result<T, ActorError> {
        let bytes = self.state_raw()?;
        fvm_ipld_encoding::from_slice(&bytes)
            .map_err(|e| actor_error!(USR_ILLEGAL_STATE; "failed to decode actor state: {}", e))
    }

    fn set_state<T: Serialize>(&mut self, state: &T) -> Result<(), ActorError> {
        let bytes = fvm_ipld_encoding::to_vec(state)
            .map_err(|e| actor_error!(USR_SERIALIZATION; "failed to encode actor state: {}", e))?;
        self.set_state_raw(bytes)
    }
}

impl<R: Runtime + ?Sized> RuntimeExt for R {}

/// Decodes method parameters.
pub fn decode_params<T: DeserializeOwned>(params: &RawBytes) -> Result<T, ActorError> {
    params
        .deserialize()
        .map_err(|e| actor_error!(USR_SERIALIZATION; "failed to decode parameters: {}", e))
}

/// Encodes a method return value.
pub fn encode_return<T: Serialize>(value: &T) -> Result<RawBytes, ActorError> {
    RawBytes::serialize(value)
        .map_err(|e| actor_error!(USR_SERIALIZATION; "failed to encode return value: {}", e))
}

/// Randomness drawn from the minimum ticket of the newest tipset in
/// `ancestors` (ordered newest first) whose epoch is at most `epoch`.
pub fn chain_randomness(ancestors: &[Tipset], epoch: ChainEpoch) -> Result<[u8; 32], ActorError> {
    let tipset = ancestors
        .iter()
        .find(|ts| ts.epoch() <= epoch)
        .ok_or_else(|| {
            actor_error!(USR_ILLEGAL_ARGUMENT; "no ancestor at or below epoch {}", epoch)
        })?;
    let mut data = tipset
        .min_ticket()
        .map(|ticket| ticket.vrfproof.as_bytes().to_vec())
        .unwrap_or_default();
    data.extend_from_slice(&epoch.to_be_bytes());
    Ok(blake2b_256(&data))
}

/// Runtime handed to an actor for a single invocation.
pub(super) struct InvocationContext<'a, S> {
    pub state: &'a mut StateTree<S>,
    pub gas: &'a mut GasTracker,
    pub price_list: &'static PriceList,
    pub message: &'a Message,
    pub epoch: ChainEpoch,
    pub version: ProtocolVersion,
    pub ancestors: &'a [Tipset],
}

impl<S: Blockstore> Runtime for InvocationContext<'_, S> {
    fn message(&self) -> &Message {
        self.message
    }

    fn curr_epoch(&self) -> ChainEpoch {
        self.epoch
    }

    fn network_version(&self) -> ProtocolVersion {
        self.version
    }

    fn price_list(&self) -> &'static PriceList {
        self.price_list
    }

    fn charge_gas(&mut self, charge: GasCharge) -> Result<(), ActorError> {
        self.gas.charge_gas(charge)
    }

    fn gas_used(&self) -> u64 {
        self.gas.gas_used()
    }

    fn state_raw(&mut self) -> Result<Vec<u8>, ActorError> {
        self.charge_gas(self.price_list.on_ipld_get())?;
        let receiver = self.message.to;
        let actor = self
            .state
            .get_required_actor(&receiver)
            .map_err(ActorError::fatal)?;
        self.state
            .store()
            .get(&actor.state)
            .map_err(ActorError::fatal)?
            .ok_or_else(|| {
                actor_error!(
                    USR_ILLEGAL_STATE;
                    "state {} of actor {} not found", actor.state, receiver
                )
            })
    }

    fn set_state_raw(&mut self, bytes: Vec<u8>) -> Result<(), ActorError> {
        self.charge_gas(self.price_list.on_ipld_put(bytes.len()))?;
        let cid = Cid::from_bytes_blake2b256(&bytes);
        self.state
            .store()
            .put_keyed(&cid, &bytes)
            .map_err(ActorError::fatal)?;
        let receiver = self.message.to;
        self.state
            .mutate_actor(&receiver, |actor| {
                actor.state = cid;
                Ok(())
            })
            .map_err(ActorError::fatal)
    }

    fn sample_chain_randomness(&mut self, epoch: ChainEpoch) -> Result<[u8; 32], ActorError> {
        self.charge_gas(self.price_list.on_hashing())?;
        if epoch > self.epoch {
            return Err(actor_error!(
                USR_ILLEGAL_ARGUMENT;
                "cannot draw randomness from future epoch {}", epoch
            ));
        }
        chain_randomness(self.ancestors, epoch)
    }
}
