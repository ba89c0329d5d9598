// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use super::{ACCOUNT_ACTOR_CODE_ID, ExecutableActor};
use crate::actor_error;
use crate::interpreter::runtime::{Runtime, RuntimeExt as _, decode_params, encode_return};
use crate::interpreter::ActorError;
use crate::message::{METHOD_CONSTRUCTOR, MethodNum};
use crate::shim::address::{Address, SYSTEM_ACTOR_ADDR};
use crate::shim::{econ::TokenAmount, state_tree::ActorState};
use crate::utils::db::CborStoreExt as _;
use fvm_ipld_blockstore::Blockstore;
use fvm_ipld_encoding::{RawBytes, tuple::*};

/// State includes the address for the actor
#[derive(Debug, Clone, PartialEq, Eq, Serialize_tuple, Deserialize_tuple)]
pub struct State {
    pub address: Address,
}

/// Account actor methods available
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Constructor = METHOD_CONSTRUCTOR as isize,
    PubkeyAddress = 2,
}

impl Method {
    fn from_method_num(method: MethodNum) -> Option<Self> {
        match method {
            METHOD_CONSTRUCTOR => Some(Self::Constructor),
            2 => Some(Self::PubkeyAddress),
            _ => None,
        }
    }
}

/// Builds a fresh account actor for a key address and stores its state.
pub fn new_account_actor<S: Blockstore>(
    store: &S,
    address: &Address,
) -> anyhow::Result<ActorState> {
    let state = store.put_cbor_default(&State { address: *address })?;
    Ok(ActorState::new(
        *ACCOUNT_ACTOR_CODE_ID,
        state,
        TokenAmount::default(),
        0,
    ))
}

/// Account Actor
pub struct AccountActor;

impl AccountActor {
    /// Constructor for Account actor
    fn constructor(rt: &mut dyn Runtime, address: Address) -> Result<(), ActorError> {
        rt.validate_immediate_caller_is(&SYSTEM_ACTOR_ADDR)?;
        if !matches!(
            address.protocol(),
            crate::shim::address::Protocol::Secp256k1 | crate::shim::address::Protocol::BLS
        ) {
            return Err(actor_error!(
                USR_ILLEGAL_ARGUMENT;
                "address must use BLS or SECP protocol, got {}", address
            ));
        }
        rt.set_state(&State { address })
    }

    /// Fetches the pubkey-type address from this actor.
    fn pubkey_address(rt: &mut dyn Runtime) -> Result<Address, ActorError> {
        let st: State = rt.state()?;
        Ok(st.address)
    }
}

impl ExecutableActor for AccountActor {
    fn invoke(
        &self,
        rt: &mut dyn Runtime,
        method: MethodNum,
        params: &RawBytes,
    ) -> Result<RawBytes, ActorError> {
        match Method::from_method_num(method) {
            Some(Method::Constructor) => {
                Self::constructor(rt, decode_params(params)?)?;
                Ok(RawBytes::default())
            }
            Some(Method::PubkeyAddress) => encode_return(&Self::pubkey_address(rt)?),
            None => Err(actor_error!(USR_UNHANDLED_MESSAGE; "invalid method {}", method)),
        }
    }
}
