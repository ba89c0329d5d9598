// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use crate::blocks::Tipset;
use num_bigint::BigInt;
use std::cmp::Ordering;

/// Weight a single block adds to the aggregate chain weight.
pub const BLOCK_WEIGHT: u64 = 1;

/// The aggregate weight a child of `parent` must carry in its headers.
pub fn child_weight(parent: &Tipset) -> BigInt {
    parent.weight() + BigInt::from(BLOCK_WEIGHT * parent.len() as u64)
}

/// Fork choice: total order over tipsets, heaviest last.
///
/// Tipsets compare by aggregate parent weight, then by epoch, then by the
/// sort key of their minimum-ticket block where the smaller key wins. Tipsets
/// sharing that block are ordered by block count, and finally the smaller
/// key bytes win, so only equal keys compare equal.
pub fn compare_weight(a: &Tipset, b: &Tipset) -> Ordering {
    a.weight()
        .cmp(b.weight())
        .then_with(|| a.epoch().cmp(&b.epoch()))
        .then_with(|| {
            b.min_ticket_block()
                .to_sort_key()
                .cmp(&a.min_ticket_block().to_sort_key())
        })
        .then_with(|| a.len().cmp(&b.len()))
        .then_with(|| b.key().to_bytes().cmp(&a.key().to_bytes()))
}

/// Returns true if `candidate` should replace `current` as head.
pub fn is_heavier(candidate: &Tipset, current: &Tipset) -> bool {
    candidate.key() != current.key() && compare_weight(candidate, current) == Ordering::Greater
}
