// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

pub use super::fvm_shared_latest::clock::ChainEpoch;

/// Seconds a block timestamp may lie ahead of the local clock.
pub const ALLOWABLE_CLOCK_DRIFT: u64 = 1;
