// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use crate::chain_sync::SyncConfig;
use crate::networks::ChainConfig;
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::level_filters::LevelFilter;

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
#[serde(default)]
pub struct LogConfig {
    /// Per-target levels applied on top of `info` unless `RUST_LOG` is set.
    pub filters: Vec<LogValue>,
    /// Emit JSON lines instead of human readable output.
    pub json: bool,
    /// Directory receiving hourly rotated log files.
    pub log_dir: Option<PathBuf>,
}

impl LogConfig {
    pub(in crate::cli_shared) fn to_filter_string(&self) -> String {
        self.filters
            .iter()
            .map(|f| format!("{}={}", f.module, f.level))
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filters: vec![
                LogValue::new("forest_chain_sync::state_manager", LevelFilter::INFO),
                LogValue::new("forest_chain_sync::chain::store::index", LevelFilter::WARN),
            ],
            json: false,
            log_dir: None,
        }
    }
}

#[serde_as]
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
pub struct LogValue {
    pub module: String,
    #[serde_as(as = "DisplayFromStr")]
    pub level: LevelFilter,
}

impl LogValue {
    pub fn new(module: &str, level: LevelFilter) -> Self {
        Self {
            module: module.to_string(),
            level,
        }
    }
}

#[derive(Serialize, Deserialize, PartialEq, Default, Debug, Clone)]
#[serde(default)]
pub struct Config {
    pub chain: Arc<ChainConfig>,
    pub sync: SyncConfig,
    pub log: LogConfig,
}
