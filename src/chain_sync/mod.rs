// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

mod bad_block_cache;
mod chain_syncer;
pub mod metrics;
mod network_context;
mod sync_state;
mod validation;

pub use self::{
    bad_block_cache::{BadBlockCache, DEFAULT_BAD_BLOCK_CACHE_SIZE},
    chain_syncer::{ChainSyncError, ChainSyncer, SyncConfig, SyncOutcome},
    network_context::{ChainNetwork, FetchError},
    sync_state::{SyncId, SyncStage, SyncState, SyncStates},
    validation::{
        BlockValidationError, BlockValidator, DefaultBlockValidator, NoopBlockValidator,
        ValidationContext,
    },
};
