// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Filecoin chain synchronization: tipset validation, fork choice, message
//! execution against the state tree and CAR chain exchange.

pub mod blocks;
pub mod chain;
pub mod chain_sync;
pub mod cli_shared;
pub mod db;
pub mod interpreter;
pub mod message;
pub mod metrics;
pub mod networks;
pub mod shim;
pub mod state_manager;
#[cfg(test)]
mod test_utils;
pub mod utils;

pub use crate::blocks::{ChainInfo, FullTipset, Tipset, TipsetKey};
pub use crate::chain::ChainStore;
pub use crate::chain_sync::{ChainSyncError, ChainSyncer, SyncConfig, SyncOutcome, SyncState};
pub use crate::networks::{ChainConfig, ProtocolUpgradeTable};
pub use crate::state_manager::StateManager;
