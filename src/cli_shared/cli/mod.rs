// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

mod config;

pub use self::config::*;

use std::path::{Path, PathBuf};

/// Environment variable pointing at a configuration file.
pub const CONFIG_PATH_ENV: &str = "FOREST_CHAIN_SYNC_CONFIG";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigPath {
    Cli(PathBuf),
    Env(PathBuf),
}

impl ConfigPath {
    pub fn to_path_buf(&self) -> &PathBuf {
        match self {
            ConfigPath::Cli(path) | ConfigPath::Env(path) => path,
        }
    }
}

/// An explicit path wins over the environment.
pub fn find_config_path(config: Option<&Path>) -> Option<ConfigPath> {
    if let Some(path) = config {
        return Some(ConfigPath::Cli(path.to_path_buf()));
    }
    std::env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| path.exists())
        .map(ConfigPath::Env)
}
