// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Registry, prelude::*};

use crate::cli_shared::cli::LogConfig;

type BoxedLayer = Box<dyn tracing_subscriber::layer::Layer<Registry> + Send + Sync>;

/// Keeps the background file writer alive. Dropping it flushes pending lines.
#[derive(Default)]
pub struct Guards {
    file_writer: Option<WorkerGuard>,
}

/// Installs the global subscriber: a console layer and, with `log_dir`, an
/// hourly rotated file layer. Fails if a subscriber is already installed.
pub fn setup_logger(config: &LogConfig) -> anyhow::Result<Guards> {
    let (layers, guards) = layers(config)?;
    tracing_subscriber::registry().with(layers).try_init()?;
    Ok(guards)
}

fn layers(config: &LogConfig) -> anyhow::Result<(Vec<BoxedLayer>, Guards)> {
    let mut guards = Guards::default();
    let mut layers = vec![console_layer(config)?];

    if let Some(log_dir) = &config.log_dir {
        let file_appender = tracing_appender::rolling::hourly(log_dir, LOG_FILE_PREFIX);
        let (writer, guard) = tracing_appender::non_blocking(file_appender);
        guards.file_writer = Some(guard);
        let layer = tracing_subscriber::fmt::Layer::new()
            .with_ansi(false)
            .with_writer(writer);
        let filter = get_env_filter(default_env_filter(config)?);
        layers.push(if config.json {
            Box::new(layer.json().with_filter(filter))
        } else {
            Box::new(layer.with_filter(filter))
        });
    }
    Ok((layers, guards))
}

const LOG_FILE_PREFIX: &str = "forest-chain-sync.log";

fn console_layer(config: &LogConfig) -> anyhow::Result<BoxedLayer> {
    let filter = get_env_filter(default_env_filter(config)?);
    let layer = tracing_subscriber::fmt::Layer::new();
    Ok(if config.json {
        Box::new(layer.json().with_filter(filter))
    } else {
        Box::new(layer.with_filter(filter))
    })
}

/// Returns an [`EnvFilter`] according to the `RUST_LOG` environment variable, or a default
/// - see [`default_env_filter`]
///
/// Note that [`tracing_subscriber::filter::Builder`] only allows a single default directive,
/// whereas we want to provide multiple.
fn get_env_filter(def: EnvFilter) -> EnvFilter {
    use std::env::{
        self,
        VarError::{NotPresent, NotUnicode},
    };
    match env::var(tracing_subscriber::EnvFilter::DEFAULT_ENV) {
        Ok(s) => EnvFilter::new(s),
        Err(NotPresent) => def,
        Err(NotUnicode(_)) => EnvFilter::default(),
    }
}

fn default_env_filter(config: &LogConfig) -> anyhow::Result<EnvFilter> {
    let mut default_directives = vec!["info".to_string(), "libp2p_swarm=warn".to_string()];
    let configured = config.to_filter_string();
    if !configured.is_empty() {
        default_directives.push(configured);
    }
    Ok(EnvFilter::try_new(default_directives.join(","))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::level_filters::LevelFilter;

    #[test]
    fn test_default_env_filter() {
        let filter = default_env_filter(&LogConfig::default()).unwrap();
        assert!(filter.to_string().contains("forest_chain_sync::state_manager=info"));
    }

    #[test]
    fn log_dir_adds_file_layer() {
        let dir = tempfile::tempdir().unwrap();
        let config = LogConfig {
            log_dir: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        let (layers, guards) = layers(&config).unwrap();
        assert_eq!(layers.len(), 2);
        assert!(guards.file_writer.is_some());

        let subscriber = tracing_subscriber::registry().with(layers);
        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!("written to the log dir");
        });
        drop(guards);

        let files: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect();
        assert_eq!(files.len(), 1);
        let name = files[0].file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(LOG_FILE_PREFIX), "{name}");
        let contents = std::fs::read_to_string(&files[0]).unwrap();
        assert!(contents.contains("written to the log dir"), "{contents}");
    }

    #[test]
    fn console_only_without_log_dir() {
        let (layers, guards) = layers(&LogConfig::default()).unwrap();
        assert_eq!(layers.len(), 1);
        assert!(guards.file_writer.is_none());
    }

    #[test]
    fn empty_filters_fall_back_to_info() {
        let config = LogConfig {
            filters: vec![],
            ..Default::default()
        };
        assert_eq!(
            default_env_filter(&config).unwrap().max_level_hint(),
            Some(LevelFilter::INFO)
        );
    }
}
