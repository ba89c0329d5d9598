// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use super::{ExecutableActor, INIT_ACTOR_CODE_ID};
use crate::actor_error;
use crate::interpreter::ActorError;
use crate::interpreter::runtime::{Runtime, RuntimeExt as _, decode_params, encode_return};
use crate::message::{METHOD_CONSTRUCTOR, MethodNum};
use crate::shim::address::SYSTEM_ACTOR_ADDR;
use crate::shim::{econ::TokenAmount, state_tree::ActorState};
use crate::utils::db::CborStoreExt as _;
use fvm_ipld_blockstore::Blockstore;
use fvm_ipld_encoding::{RawBytes, tuple::*};

/// First ID handed out to actors created after genesis.
pub const FIRST_NON_SINGLETON_ID: u64 = 100;

/// State of the init actor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize_tuple, Deserialize_tuple)]
pub struct State {
    pub network_name: String,
    pub next_id: u64,
}

impl State {
    pub fn new(network_name: impl Into<String>) -> Self {
        Self {
            network_name: network_name.into(),
            next_id: FIRST_NON_SINGLETON_ID,
        }
    }
}

/// Init actor methods available
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Constructor = METHOD_CONSTRUCTOR as isize,
    GetNetwork = 2,
}

impl Method {
    fn from_method_num(method: MethodNum) -> Option<Self> {
        match method {
            METHOD_CONSTRUCTOR => Some(Self::Constructor),
            2 => Some(Self::GetNetwork),
            _ => None,
        }
    }
}

/// Builds the genesis init actor and stores its state.
pub fn new_init_actor<S: Blockstore>(store: &S, network_name: &str) -> anyhow::Result<ActorState> {
    let state = store.put_cbor_default(&State::new(network_name))?;
    Ok(ActorState::new(
        *INIT_ACTOR_CODE_ID,
        state,
        TokenAmount::default(),
        0,
    ))
}

/// Init actor
pub struct InitActor;

impl InitActor {
    fn constructor(rt: &mut dyn Runtime, network_name: String) -> Result<(), ActorError> {
        rt.validate_immediate_caller_is(&SYSTEM_ACTOR_ADDR)?;
        rt.set_state(&State::new(network_name))
    }

    fn get_network(rt: &mut dyn Runtime) -> Result<String, ActorError> {
        let st: State = rt.state()?;
        Ok(st.network_name)
    }
}

impl ExecutableActor for InitActor {
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
            Some(Method::GetNetwork) => encode_return(&Self::get_network(rt)?),
            None => Err(actor_error!(USR_UNHANDLED_MESSAGE; "invalid method {}", method)),
        }
    }
}
