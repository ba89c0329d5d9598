// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use crate::blocks::TipsetKey;
use crate::shim::clock::ChainEpoch;
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;

/// Current stage of the `ChainSyncer`.
#[derive(PartialEq, Eq, Debug, Clone, Copy, Default, strum::Display, strum::EnumString)]
pub enum SyncStage {
    /// Idle state.
    #[default]
    #[strum(to_string = "idle worker")]
    Idle,
    /// Fetching, validating and executing a candidate chain.
    #[strum(to_string = "syncing")]
    Syncing,
    /// The last sync attempt finished.
    #[strum(to_string = "complete")]
    Complete,
    /// Error has occurred while syncing.
    #[strum(to_string = "error")]
    Error,
}

/// Status of the node's syncing process, readable while a sync is running.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SyncState {
    target: Option<TipsetKey>,
    target_epoch: ChainEpoch,

    stage: SyncStage,
    /// Epoch of the tipset currently being processed.
    epoch: ChainEpoch,

    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    message: String,
}

impl SyncState {
    /// Starts tracking a sync towards `target` and sets start time.
    pub fn init(&mut self, target: TipsetKey, target_epoch: ChainEpoch) {
        *self = Self {
            target: Some(target),
            target_epoch,
            stage: SyncStage::Syncing,
            start: Some(Utc::now()),
            ..Default::default()
        }
    }

    /// Get the current [`SyncStage`] of the `Syncer`
    pub fn stage(&self) -> SyncStage {
        self.stage
    }

    pub fn is_syncing(&self) -> bool {
        self.stage == SyncStage::Syncing
    }

    pub fn target(&self) -> Option<&TipsetKey> {
        self.target.as_ref()
    }

    /// Height claimed for the target.
    pub fn target_epoch(&self) -> ChainEpoch {
        self.target_epoch
    }

    /// Return the current [`ChainEpoch`]
    pub fn epoch(&self) -> ChainEpoch {
        self.epoch
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the elapsed time of the current syncing process, or the duration
    /// of the last one once it has finished.
    /// Returns `None` if syncing has not started
    pub fn elapsed(&self) -> Option<Duration> {
        let start = self.start?;
        Some(self.end.unwrap_or_else(Utc::now) - start)
    }

    /// Sets epoch of the sync.
    pub fn set_epoch(&mut self, epoch: ChainEpoch) {
        self.epoch = epoch;
    }

    /// Marks the sync as finished.
    pub fn complete(&mut self, message: impl Into<String>) {
        self.message = message.into();
        self.stage = SyncStage::Complete;
        self.end = Some(Utc::now());
    }

    /// Sets error for the sync.
    pub fn error(&mut self, err: String) {
        self.message = err;
        self.stage = SyncStage::Error;
        self.end = Some(Utc::now());
    }
}

/// Identifies one sync among those tracked by [`SyncStates`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct SyncId(u64);

/// States of concurrent syncs. Every sync updates only its own entry and
/// leaves the set once it ends; the last one to end is kept.
#[derive(Debug, Default)]
pub struct SyncStates {
    next_id: u64,
    running: BTreeMap<SyncId, SyncState>,
    last_finished: Option<SyncState>,
}

impl SyncStates {
    pub fn start(&mut self, target: TipsetKey, target_epoch: ChainEpoch) -> SyncId {
        let id = SyncId(self.next_id);
        self.next_id += 1;
        let mut state = SyncState::default();
        state.init(target, target_epoch);
        self.running.insert(id, state);
        id
    }

    pub fn update(&mut self, id: SyncId, f: impl FnOnce(&mut SyncState)) {
        if let Some(state) = self.running.get_mut(&id) {
            f(state);
        }
    }

    /// Applies `f` and retires the sync. No-op for a sync already retired.
    pub fn finish(&mut self, id: SyncId, f: impl FnOnce(&mut SyncState)) {
        if let Some(mut state) = self.running.remove(&id) {
            f(&mut state);
            self.last_finished = Some(state);
        }
    }

    /// The most recently started sync still running, otherwise the last one
    /// to end.
    pub fn current(&self) -> SyncState {
        self.running
            .values()
            .next_back()
            .or(self.last_finished.as_ref())
            .cloned()
            .unwrap_or_default()
    }

    /// Running syncs in start order.
    pub fn running(&self) -> Vec<SyncState> {
        self.running.values().cloned().collect()
    }
}
