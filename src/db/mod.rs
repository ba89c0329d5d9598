// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

mod memory;

pub use memory::MemoryDB;

use anyhow::Context as _;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// Settings key of the persisted heaviest tipset key.
pub const HEAD_KEY: &str = "head";

/// Named values kept beside the block store, such as the chain head.
/// IPLD blocks go through [`fvm_ipld_blockstore::Blockstore`] instead.
pub trait SettingsStore {
    fn read_bin(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>>;

    fn write_bin(&self, key: &str, value: &[u8]) -> anyhow::Result<()>;
}

impl<T: SettingsStore + ?Sized> SettingsStore for Arc<T> {
    fn read_bin(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        SettingsStore::read_bin(self.as_ref(), key)
    }

    fn write_bin(&self, key: &str, value: &[u8]) -> anyhow::Result<()> {
        SettingsStore::write_bin(self.as_ref(), key, value)
    }
}

/// CBOR encoded settings, the same encoding the chain itself uses.
pub trait SettingsStoreExt: SettingsStore {
    fn read_cbor<V: DeserializeOwned>(&self, key: &str) -> anyhow::Result<Option<V>> {
        self.read_bin(key)?
            .map(|bytes| fvm_ipld_encoding::from_slice(&bytes))
            .transpose()
            .with_context(|| format!("Malformed setting {key}"))
    }

    fn write_cbor<V: Serialize>(&self, key: &str, value: &V) -> anyhow::Result<()> {
        self.write_bin(key, &fvm_ipld_encoding::to_vec(value)?)
    }
}

impl<T: SettingsStore + ?Sized> SettingsStoreExt for T {}
