// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::num::NonZeroUsize;

use cid::Cid;
use hashlink::LruCache;
use nonzero_ext::nonzero;
use parking_lot::Mutex;

pub const DEFAULT_BAD_BLOCK_CACHE_SIZE: NonZeroUsize = nonzero!(1usize << 15);

/// Thread-safe cache for tracking bad blocks.
/// This cache is checked before validating a block, to ensure no duplicate
/// work.
#[derive(Debug)]
pub struct BadBlockCache {
    cache: Mutex<LruCache<Cid, String>>,
}

impl Default for BadBlockCache {
    fn default() -> Self {
        Self::new(DEFAULT_BAD_BLOCK_CACHE_SIZE)
    }
}

impl BadBlockCache {
    pub fn new(cap: NonZeroUsize) -> Self {
        Self {
            cache: Mutex::new(LruCache::new(cap.get())),
        }
    }

    /// Records `c` as bad, remembering why.
    pub fn push(&self, c: Cid, reason: impl Into<String>) {
        let reason = reason.into();
        tracing::warn!("Marked bad block: {c}, reason: {reason}");
        self.cache.lock().insert(c, reason);
    }

    /// Returns the rejection reason if the block CID is in bad block cache.
    /// This function does not update the head position of the `Cid` key.
    pub fn peek(&self, c: &Cid) -> Option<String> {
        self.cache.lock().peek(c).cloned()
    }

    pub fn len(&self) -> usize {
        self.cache.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::cid::CidCborExt as _;

    #[test]
    fn oldest_entries_are_evicted() {
        let cache = BadBlockCache::new(nonzero!(2usize));
        let cids: Vec<Cid> = (0u8..3).map(|i| Cid::from_bytes_blake2b256(&[i])).collect();
        for cid in &cids {
            cache.push(*cid, "invalid");
        }
        assert_eq!(cache.len(), 2);
        assert!(cache.peek(&cids[0]).is_none());
        assert_eq!(cache.peek(&cids[2]).as_deref(), Some("invalid"));
    }
}
