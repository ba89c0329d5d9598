// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

pub mod actors;
mod errors;
mod gas;
mod processor;
mod rewarder;
mod runtime;
#[cfg(test)]
mod tests;
mod validation;

pub use self::errors::*;
pub use self::gas::*;
pub use self::processor::*;
pub use self::rewarder::*;
pub use self::runtime::{
    Runtime, RuntimeExt, chain_randomness, decode_params, encode_return,
};
pub use self::validation::*;
