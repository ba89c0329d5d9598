// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

pub mod cli;
pub mod logger;

use crate::cli_shared::cli::{Config, ConfigPath, find_config_path};
use crate::networks::{ChainConfig, NetworkChain};
use crate::utils::io::read_toml;
use anyhow::Context as _;
use std::path::Path;
use std::sync::Arc;

/// Loads the configuration from `config_path_opt` or [`cli::CONFIG_PATH_ENV`],
/// falling back to defaults. `chain_opt` replaces the configured chain with
/// the builtin preset of that network.
pub fn read_config(
    config_path_opt: Option<&Path>,
    chain_opt: Option<NetworkChain>,
) -> anyhow::Result<(Option<ConfigPath>, Config)> {
    let (path, mut config) = match find_config_path(config_path_opt) {
        Some(path) => {
            let toml = std::fs::read_to_string(path.to_path_buf())
                .with_context(|| format!("failed to read {}", path.to_path_buf().display()))?;
            let config: Config = read_toml(&toml)?;
            (Some(path), config)
        }
        None => (None, Config::default()),
    };
    if let Some(chain) = chain_opt {
        config.chain = Arc::new(ChainConfig::from_chain(&chain));
    }
    config
        .chain
        .upgrade_table()
        .context("invalid protocol upgrades in configuration")?;
    Ok((path, config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli_shared::cli::ConfigPath;
    use std::path::PathBuf;

    #[test]
    fn read_config_default() {
        let (config_path, config) = read_config(None, None).unwrap();
        assert!(config_path.is_none());
        assert_eq!(config, Config::default());
    }

    #[test]
    fn read_config_chain_override() {
        let (_, config) = read_config(None, Some(NetworkChain::Interopnet)).unwrap();
        assert_eq!(*config.chain, ChainConfig::interopnet());
    }

    #[test]
    fn read_config_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let path: PathBuf = dir.path().join("config.toml");
        let mut default_config = Config::default();
        default_config.sync.fetch_timeout_secs = 7;
        std::fs::write(&path, toml::to_string(&default_config).unwrap()).unwrap();

        let (config_path, config) = read_config(Some(&path), None).unwrap();
        assert_eq!(config_path.unwrap(), ConfigPath::Cli(path));
        assert_eq!(config, default_config);
    }

    #[test]
    fn read_config_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_config(Some(&dir.path().join("nope.toml")), None).is_err());
    }
}
