// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use super::ActorError;
use crate::message::{METHOD_SEND, MethodNum};
use crate::networks::ProtocolVersion;
use crate::shim::econ::TokenAmount;
use crate::shim::error::ExitCode;

/// Single gas charge in the VM. Contains information about what gas was for, as well
/// as the amount of gas needed for computation and storage respectively.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GasCharge {
    pub name: &'static str,
    pub compute_gas: u64,
    pub storage_gas: u64,
}

impl GasCharge {
    pub fn new(name: &'static str, compute_gas: u64, storage_gas: u64) -> Self {
        Self {
            name,
            compute_gas,
            storage_gas,
        }
    }

    /// Calculates total gas charge based on compute and storage multipliers.
    pub fn total(&self) -> u64 {
        self.compute_gas.saturating_add(self.storage_gas)
    }
}

/// Gas meter for a single message execution.
#[derive(Debug)]
pub struct GasTracker {
    gas_limit: u64,
    gas_used: u64,
}

impl GasTracker {
    pub fn new(gas_limit: u64) -> Self {
        Self {
            gas_limit,
            gas_used: 0,
        }
    }

    /// Charges gas. Running out of gas consumes the whole limit.
    pub fn charge_gas(&mut self, charge: GasCharge) -> Result<(), ActorError> {
        let to_use = charge.total();
        match self.gas_used.checked_add(to_use) {
            Some(used) if used <= self.gas_limit => {
                self.gas_used = used;
                Ok(())
            }
            _ => {
                self.gas_used = self.gas_limit;
                Err(ActorError::new(
                    ExitCode::SYS_OUT_OF_GAS,
                    format!(
                        "not enough gas for {} (used={}, limit={}, charge={to_use})",
                        charge.name, self.gas_used, self.gas_limit
                    ),
                ))
            }
        }
    }

    pub fn gas_used(&self) -> u64 {
        self.gas_used
    }

    pub fn gas_limit(&self) -> u64 {
        self.gas_limit
    }

    pub fn gas_available(&self) -> u64 {
        self.gas_limit - self.gas_used
    }
}

/// Provides prices for operations in the VM
#[derive(Clone, Debug)]
pub struct PriceList {
    /// Storage gas charge multiplier
    storage_gas_multiplier: u64,

    /// Gas cost charged to the originator of an on-chain message (regardless of
    /// whether it succeeds or fails in application) is given by:
    ///   OnChainMessageBase + len(serialized message)*OnChainMessagePerByte
    /// This is the cost a block producer burns when including an invalid message.
    on_chain_message_compute_base: u64,
    on_chain_message_storage_base: u64,
    on_chain_message_storage_per_byte: u64,

    /// Gas cost charged to the originator of a non-nil return value produced
    /// by an on-chain message is given by:
    ///   len(return value)*OnChainReturnValuePerByte
    on_chain_return_value_per_byte: u64,

    /// Gas cost for any message send execution, including the top-level one
    /// initiated by an on-chain message.
    send_base: u64,
    /// Charged in addition to `send_base` if a message send is accompanied by
    /// any nonzero currency amount.
    send_transfer_funds: u64,
    /// Charged in addition to `send_base` if a message only transfers funds.
    send_transfer_only_premium: u64,
    /// Charged in addition to `send_base` if a message invokes a method on the
    /// receiver.
    send_invoke_method: u64,

    /// Gas cost (Base + len*PerByte) for any Get operation to the IPLD store
    /// in the runtime VM context.
    ipld_get_base: u64,
    /// Gas cost (Base + len*PerByte) for any Put operation to the IPLD store
    /// in the runtime VM context.
    ipld_put_base: u64,
    ipld_put_per_byte: u64,

    /// Gas cost for creating a new actor.
    create_actor_compute: u64,
    create_actor_storage: u64,

    hashing_base: u64,
}

const BASE_PRICES: PriceList = PriceList {
    storage_gas_multiplier: 1000,

    on_chain_message_compute_base: 38863,
    on_chain_message_storage_base: 36,
    on_chain_message_storage_per_byte: 1,

    on_chain_return_value_per_byte: 1,

    send_base: 29233,
    send_transfer_funds: 27500,
    send_transfer_only_premium: 159672,
    send_invoke_method: 5377,

    ipld_get_base: 75242,
    ipld_put_base: 84070,
    ipld_put_per_byte: 1,

    create_actor_compute: 1108454,
    create_actor_storage: 36 + 40,

    hashing_base: 31355,
};

const SIGNED_BLOCKS_PRICES: PriceList = PriceList {
    storage_gas_multiplier: 1300,
    ..BASE_PRICES
};

/// Returns gas price list by protocol version for gas consumption.
pub fn price_list_by_version(version: ProtocolVersion) -> &'static PriceList {
    if version < crate::networks::SIGNED_BLOCKS_VERSION {
        &BASE_PRICES
    } else {
        &SIGNED_BLOCKS_PRICES
    }
}

impl PriceList {
    /// Returns the gas required for storing a message of a given size in the chain.
    pub fn on_chain_message(&self, msg_size: usize) -> GasCharge {
        GasCharge::new(
            "OnChainMessage",
            self.on_chain_message_compute_base,
            (self.on_chain_message_storage_base
                + self.on_chain_message_storage_per_byte * msg_size as u64)
                * self.storage_gas_multiplier,
        )
    }

    /// Returns the gas required for storing the response of a message in the chain.
    pub fn on_chain_return_value(&self, data_size: usize) -> GasCharge {
        GasCharge::new(
            "OnChainReturnValue",
            0,
            data_size as u64 * self.on_chain_return_value_per_byte * self.storage_gas_multiplier,
        )
    }

    /// Returns the gas required when invoking a method.
    pub fn on_method_invocation(&self, value: &TokenAmount, method_num: MethodNum) -> GasCharge {
        let mut ret = self.send_base;
        if !value.is_zero() {
            ret += self.send_transfer_funds;
            if method_num == METHOD_SEND {
                ret += self.send_transfer_only_premium;
            }
        }
        if method_num != METHOD_SEND {
            ret += self.send_invoke_method;
        }
        GasCharge::new("OnMethodInvocation", ret, 0)
    }

    /// Returns the gas required for loading an object.
    pub fn on_ipld_get(&self) -> GasCharge {
        GasCharge::new("OnIpldGet", self.ipld_get_base, 0)
    }

    /// Returns the gas required for storing an object.
    pub fn on_ipld_put(&self, data_size: usize) -> GasCharge {
        GasCharge::new(
            "OnIpldPut",
            self.ipld_put_base,
            data_size as u64 * self.ipld_put_per_byte * self.storage_gas_multiplier,
        )
    }

    /// Returns the gas required for creating an actor.
    pub fn on_create_actor(&self) -> GasCharge {
        GasCharge::new(
            "OnCreateActor",
            self.create_actor_compute,
            self.create_actor_storage * self.storage_gas_multiplier,
        )
    }

    /// Returns the gas required for hashing data.
    pub fn on_hashing(&self) -> GasCharge {
        GasCharge::new("OnHashing", self.hashing_base, 0)
    }
}
