// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Height-gated protocol versions.
//!
//! A [`ProtocolUpgradeTable`] is scoped to a single network. Entries for other
//! networks may be added to its builder but are dropped when it is built, so a
//! table can be fed straight from a shared configuration list.

use crate::shim::clock::ChainEpoch;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type ProtocolVersion = u64;

#[derive(Debug, PartialEq, Eq, Error)]
pub enum UpgradeTableError {
    #[error("no protocol versions")]
    EmptyTable,
    #[error("chain height {height} is less than effective start of first version {first}")]
    BeforeFirstUpgrade {
        height: ChainEpoch,
        first: ChainEpoch,
    },
    #[error("duplicate protocol upgrade at height {0}")]
    DuplicateHeight(ChainEpoch),
}

/// A protocol version that becomes active at `effective_height` on `network`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProtocolUpgrade {
    pub network: String,
    pub version: ProtocolVersion,
    pub effective_height: ChainEpoch,
}

impl ProtocolUpgrade {
    pub fn new(
        network: impl Into<String>,
        version: ProtocolVersion,
        effective_height: ChainEpoch,
    ) -> Self {
        Self {
            network: network.into(),
            version,
            effective_height,
        }
    }
}

/// Collects upgrades in any order, see [`ProtocolUpgradeTableBuilder::build`].
#[derive(Clone, Debug)]
pub struct ProtocolUpgradeTableBuilder {
    network: String,
    upgrades: Vec<ProtocolUpgrade>,
}

impl ProtocolUpgradeTableBuilder {
    pub fn new(network: impl Into<String>) -> Self {
        Self {
            network: network.into(),
            upgrades: vec![],
        }
    }

    pub fn add(
        mut self,
        network: impl Into<String>,
        version: ProtocolVersion,
        effective_height: ChainEpoch,
    ) -> Self {
        self.push(ProtocolUpgrade::new(network, version, effective_height));
        self
    }

    pub fn push(&mut self, upgrade: ProtocolUpgrade) {
        self.upgrades.push(upgrade);
    }

    /// Keeps only this network's upgrades, sorted by effective height.
    pub fn build(self) -> Result<ProtocolUpgradeTable, UpgradeTableError> {
        let Self { network, upgrades } = self;
        let mut upgrades: Vec<_> = upgrades
            .into_iter()
            .filter(|u| u.network == network)
            .collect();
        upgrades.sort_by_key(|u| u.effective_height);
        if let Some(dup) = upgrades
            .windows(2)
            .find(|w| w[0].effective_height == w[1].effective_height)
        {
            return Err(UpgradeTableError::DuplicateHeight(dup[0].effective_height));
        }
        Ok(ProtocolUpgradeTable { network, upgrades })
    }
}

impl Extend<ProtocolUpgrade> for ProtocolUpgradeTableBuilder {
    fn extend<T: IntoIterator<Item = ProtocolUpgrade>>(&mut self, iter: T) {
        self.upgrades.extend(iter)
    }
}

/// Immutable mapping from chain height to the active protocol version.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProtocolUpgradeTable {
    network: String,
    /// Sorted by effective height, heights are unique.
    upgrades: Vec<ProtocolUpgrade>,
}

impl ProtocolUpgradeTable {
    pub fn network(&self) -> &str {
        &self.network
    }

    pub fn upgrades(&self) -> &[ProtocolUpgrade] {
        &self.upgrades
    }

    /// Version of the latest upgrade whose effective height is at or below
    /// `height`.
    pub fn version_at(&self, height: ChainEpoch) -> Result<ProtocolVersion, UpgradeTableError> {
        let first = self
            .upgrades
            .first()
            .ok_or(UpgradeTableError::EmptyTable)?;
        if height < first.effective_height {
            return Err(UpgradeTableError::BeforeFirstUpgrade {
                height,
                first: first.effective_height,
            });
        }
        let idx = self
            .upgrades
            .partition_point(|u| u.effective_height <= height);
        Ok(self.upgrades[idx - 1].version)
    }
}
