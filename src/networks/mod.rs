// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

mod upgrade_table;

pub use upgrade_table::{
    ProtocolUpgrade, ProtocolUpgradeTable, ProtocolUpgradeTableBuilder, ProtocolVersion,
    UpgradeTableError,
};

/// Protocol version from which blocks must be signed by their miner.
pub const SIGNED_BLOCKS_VERSION: ProtocolVersion = 1;

const DEFAULT_ANCESTOR_LOOKBACK: usize = 20;

/// Builtin networks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NetworkChain {
    Interopnet,
    Devnet(String),
}

impl FromStr for NetworkChain {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "interop" => Ok(NetworkChain::Interopnet),
            name => Ok(NetworkChain::Devnet(name.to_owned())),
        }
    }
}

impl From<String> for NetworkChain {
    fn from(value: String) -> Self {
        match value.parse() {
            Ok(chain) => chain,
            Err(never) => match never {},
        }
    }
}

impl From<NetworkChain> for String {
    fn from(value: NetworkChain) -> Self {
        value.to_string()
    }
}

impl Display for NetworkChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NetworkChain::Interopnet => write!(f, "interop"),
            NetworkChain::Devnet(name) => write!(f, "{name}"),
        }
    }
}

/// Defines all network configuration parameters.
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
#[serde(default)]
pub struct ChainConfig {
    pub network: NetworkChain,
    pub block_delay_secs: u32,
    pub propagation_delay_secs: u32,
    /// Upgrades for any network; only the entries for `network` are used.
    pub upgrades: Vec<ProtocolUpgrade>,
    /// Number of ancestor tipsets made available to actors during execution.
    pub ancestor_lookback: usize,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self::devnet()
    }
}

impl ChainConfig {
    pub fn devnet() -> Self {
        let network = NetworkChain::Devnet("devnet".to_string());
        Self {
            upgrades: vec![
                ProtocolUpgrade::new(network.to_string(), 0, 0),
                ProtocolUpgrade::new(network.to_string(), SIGNED_BLOCKS_VERSION, 100),
            ],
            network,
            block_delay_secs: 4,
            propagation_delay_secs: 1,
            ancestor_lookback: DEFAULT_ANCESTOR_LOOKBACK,
        }
    }

    pub fn interopnet() -> Self {
        let network = NetworkChain::Interopnet;
        Self {
            upgrades: vec![
                ProtocolUpgrade::new(network.to_string(), 0, 0),
                ProtocolUpgrade::new(network.to_string(), SIGNED_BLOCKS_VERSION, 40),
            ],
            network,
            block_delay_secs: 30,
            propagation_delay_secs: 6,
            ancestor_lookback: DEFAULT_ANCESTOR_LOOKBACK,
        }
    }

    pub fn from_chain(network_chain: &NetworkChain) -> Self {
        match network_chain {
            NetworkChain::Interopnet => Self::interopnet(),
            NetworkChain::Devnet(name) => {
                let mut config = Self::devnet();
                for upgrade in &mut config.upgrades {
                    upgrade.network = name.clone();
                }
                config.network = network_chain.clone();
                config
            }
        }
    }

    /// Builds the upgrade table for the configured network.
    pub fn upgrade_table(&self) -> Result<ProtocolUpgradeTable, UpgradeTableError> {
        let mut builder = ProtocolUpgradeTableBuilder::new(self.network.to_string());
        builder.extend(self.upgrades.iter().cloned());
        builder.build()
    }
}
