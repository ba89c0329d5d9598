// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

mod receipt;
mod signed_message;

pub use fvm_shared4::{METHOD_CONSTRUCTOR, METHOD_SEND, MethodNum};
pub use receipt::Receipt;
pub use signed_message::SignedMessage;

use crate::shim::{address::Address, econ::TokenAmount};
use crate::utils::cid::CidCborExt as _;
use cid::Cid;
use fvm_ipld_encoding::{RawBytes, tuple::*};
use std::sync::LazyLock;

/// [`Cid`] of an empty message or receipt collection (an empty CBOR list).
/// Such collections are never written to the store.
pub static EMPTY_COLLECTION_CID: LazyLock<Cid> =
    LazyLock::new(|| Cid::from_bytes_blake2b256(&[0x80]));

/// Default unsigned message type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize_tuple, Deserialize_tuple)]
pub struct Message {
    pub version: u64,
    pub to: Address,
    pub from: Address,
    pub sequence: u64,
    pub value: TokenAmount,
    pub method_num: MethodNum,
    pub params: RawBytes,
    pub gas_price: TokenAmount,
    pub gas_limit: u64,
}

impl Message {
    /// Plain value transfer.
    pub fn transfer(from: Address, to: Address, sequence: u64, value: TokenAmount) -> Self {
        Self {
            version: 0,
            to,
            from,
            sequence,
            value,
            method_num: METHOD_SEND,
            params: RawBytes::default(),
            gas_price: TokenAmount::from_atto(1),
            gas_limit: 10_000_000,
        }
    }

    pub fn cid(&self) -> Cid {
        Cid::from_cbor_blake2b256(self).expect("message encoding is infallible")
    }

    /// Gas prepayment: `gas_price * gas_limit`.
    pub fn gas_prepayment(&self) -> TokenAmount {
        crate::shim::econ::gas_cost(&self.gas_price, self.gas_limit)
    }

    /// Encoded size, used for chain inclusion gas.
    pub fn chain_length(&self) -> usize {
        fvm_ipld_encoding::to_vec(self).map_or(0, |bytes| bytes.len())
    }
}
