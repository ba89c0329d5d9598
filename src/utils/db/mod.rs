// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

pub mod car;

use crate::utils::cid::CidCborExt;
use anyhow::Context as _;
use cid::Cid;
use fvm_ipld_blockstore::Blockstore;
use serde::{Serialize, de::DeserializeOwned};

/// CBOR helpers for any [`Blockstore`].
pub trait CborStoreExt: Blockstore {
    /// Encodes `obj` as `dag-cbor`, stores it under its BLAKE2b-256 [Cid] and
    /// returns the key.
    fn put_cbor_default<S: Serialize>(&self, obj: &S) -> anyhow::Result<Cid> {
        let bytes = fvm_ipld_encoding::to_vec(obj)?;
        let cid = Cid::from_bytes_blake2b256(&bytes);
        self.put_keyed(&cid, &bytes)?;
        Ok(cid)
    }

    fn get_cbor<T: DeserializeOwned>(&self, cid: &Cid) -> anyhow::Result<Option<T>> {
        match self.get(cid)? {
            Some(bytes) => Ok(Some(fvm_ipld_encoding::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn get_cbor_required<T: DeserializeOwned>(&self, cid: &Cid) -> anyhow::Result<T> {
        self.get_cbor(cid)?
            .with_context(|| format!("Entry not found in block store: {cid}"))
    }
}

impl<T: Blockstore + ?Sized> CborStoreExt for T {}
