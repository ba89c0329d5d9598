// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use crate::metrics::{duration_histogram, register};
use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{counter::Counter, family::Family, gauge::Gauge, histogram::Histogram},
};
use std::sync::LazyLock;

pub static HEAD_EPOCH: LazyLock<Gauge> = LazyLock::new(|| {
    register(
        "head_epoch",
        "Epoch of the heaviest tipset",
        Gauge::default(),
    )
});
pub static TIPSET_PROCESSING_TIME: LazyLock<Histogram> = LazyLock::new(|| {
    register(
        "tipset_processing_time",
        "Duration of fetching, validating and executing a chain segment",
        duration_histogram(),
    )
});
pub static BLOCK_VALIDATION_TIME: LazyLock<Histogram> = LazyLock::new(|| {
    register(
        "block_validation_time",
        "Duration of validating a block not yet marked as validated",
        duration_histogram(),
    )
});
pub static INVALID_TIPSET_TOTAL: LazyLock<Counter> = LazyLock::new(|| {
    register(
        "invalid_tipset",
        "Tipsets received from peers that failed validation",
        Counter::default(),
    )
});
pub static SYNC_OUTCOME_TOTAL: LazyLock<Family<SyncOutcomeLabel, Counter>> =
    LazyLock::new(|| {
        register(
            "sync_outcome",
            "Handled chain heads by outcome",
            Family::default(),
        )
    });

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet, derive_more::Constructor)]
pub struct SyncOutcomeLabel {
    outcome: &'static str,
}

pub mod values {
    use super::SyncOutcomeLabel;

    pub const ALREADY_KNOWN: SyncOutcomeLabel = SyncOutcomeLabel::new("already_known");
    pub const ADOPTED: SyncOutcomeLabel = SyncOutcomeLabel::new("adopted");
    pub const IGNORED: SyncOutcomeLabel = SyncOutcomeLabel::new("ignored");
    pub const REJECTED: SyncOutcomeLabel = SyncOutcomeLabel::new("rejected");
}
