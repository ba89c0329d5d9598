// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::ops::Deref;
use std::sync::OnceLock;

use super::{ElectionProof, Error, Ticket, TipsetKey};
use crate::shim::clock::ChainEpoch;
use crate::shim::address::{Address, SYSTEM_ACTOR_ADDR};
use crate::shim::crypto::Signature;
use crate::utils::{cid::CidCborExt as _, db::CborStoreExt as _};
use cid::Cid;
use derive_builder::Builder;
use fvm_ipld_blockstore::Blockstore;
use fvm_ipld_encoding::tuple::*;
use num_bigint::BigInt;

#[derive(Deserialize_tuple, Serialize_tuple, Clone, Hash, Eq, PartialEq, Debug, Builder)]
#[builder(setter(into), default)]
pub struct RawBlockHeader {
    /// The address of the miner actor that mined this block
    pub miner_address: Address,
    pub ticket: Option<Ticket>,
    pub election_proof: Option<ElectionProof>,
    /// The set of parents this block was based on.
    /// Typically one, but can be several in the case where there were multiple
    /// winning ticket-holders for an epoch
    pub parents: TipsetKey,
    /// The aggregate chain weight of the parent set
    #[serde(with = "fvm_shared4::bigint::bigint_ser")]
    pub weight: BigInt,
    /// The period in which a new block is generated.
    pub epoch: ChainEpoch,
    /// The CID of the parent state root after calculating parent tipset.
    pub state_root: Cid,
    /// The CID of the list of receipts produced by the parent tipset.
    pub message_receipts: Cid,
    /// The CID of the list of signed messages included in this block.
    pub messages: Cid,
    /// Block creation time, in seconds since the Unix epoch
    pub timestamp: u64,
    pub signature: Option<Signature>,
}

impl Default for RawBlockHeader {
    fn default() -> Self {
        Self {
            miner_address: SYSTEM_ACTOR_ADDR,
            ticket: None,
            election_proof: None,
            parents: TipsetKey::default(),
            weight: BigInt::default(),
            epoch: 0,
            state_root: Cid::default(),
            message_receipts: Cid::default(),
            messages: Cid::default(),
            timestamp: 0,
            signature: None,
        }
    }
}

impl RawBlockHeader {
    pub fn cid(&self) -> Cid {
        Cid::from_cbor_blake2b256(self).expect("block header encoding is infallible")
    }

    /// Key used for sorting headers and blocks.
    pub fn to_sort_key(&self) -> (Option<[u8; 32]>, Vec<u8>) {
        let ticket_hash = self.ticket.as_ref().map(|t| t.vrfproof.digest());
        (ticket_hash, self.cid().to_bytes())
    }

    /// Check to ensure block signature is valid
    pub fn check_block_signature(&self, addr: &Address) -> Result<(), Error> {
        let signature = self
            .signature
            .as_ref()
            .ok_or_else(|| Error::InvalidSignature("Signature is nil in header".to_owned()))?;

        signature
            .verify(&self.signing_bytes(), addr)
            .map_err(|e| Error::InvalidSignature(format!("Block signature invalid: {e}")))?;

        Ok(())
    }

    /// Serializes the header to bytes for signing purposes i.e. without the
    /// signature field.
    pub fn signing_bytes(&self) -> Vec<u8> {
        let mut blk = self.clone();
        blk.signature = None;
        fvm_ipld_encoding::to_vec(&blk).expect("block header encoding is infallible")
    }
}

/// A [`RawBlockHeader`] which caches calls to [`RawBlockHeader::cid`].
#[derive(Debug, Clone)]
pub struct CachingBlockHeader {
    uncached: RawBlockHeader,
    cid: OnceLock<Cid>,
}

impl PartialEq for CachingBlockHeader {
    fn eq(&self, other: &Self) -> bool {
        self.cid() == other.cid()
    }
}

impl Eq for CachingBlockHeader {}

impl Deref for CachingBlockHeader {
    type Target = RawBlockHeader;

    fn deref(&self) -> &Self::Target {
        &self.uncached
    }
}

impl From<RawBlockHeader> for CachingBlockHeader {
    fn from(value: RawBlockHeader) -> Self {
        Self::new(value)
    }
}

impl CachingBlockHeader {
    pub fn new(uncached: RawBlockHeader) -> Self {
        Self {
            uncached,
            cid: OnceLock::new(),
        }
    }

    pub fn into_raw(self) -> RawBlockHeader {
        self.uncached
    }

    /// Returns [`None`] if the block header is not found in the store.
    pub fn load(store: &impl Blockstore, cid: Cid) -> anyhow::Result<Option<Self>> {
        Ok(store.get_cbor::<RawBlockHeader>(&cid)?.map(|uncached| Self {
            uncached,
            cid: cid.into(),
        }))
    }

    pub fn cid(&self) -> &Cid {
        self.cid.get_or_init(|| self.uncached.cid())
    }

    /// Writes the encoded header to the store, keyed by its [`Cid`].
    pub fn persist(&self, store: &impl Blockstore) -> anyhow::Result<()> {
        let bytes = fvm_ipld_encoding::to_vec(&self.uncached)?;
        store.put_keyed(self.cid(), &bytes)
    }
}

impl serde::Serialize for CachingBlockHeader {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.uncached.serialize(serializer)
    }
}

impl<'de> serde::Deserialize<'de> for CachingBlockHeader {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        RawBlockHeader::deserialize(deserializer).map(Self::new)
    }
}
