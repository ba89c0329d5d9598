// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use crate::blocks::{ChainInfo, Error as ForestBlockError, FullTipset, Tipset, TipsetKey};
use crate::chain::{
    ChainStore, DEFAULT_TIPSET_CACHE_SIZE, Error as ChainStoreError, messages::persist_block,
};
use crate::chain_sync::bad_block_cache::{BadBlockCache, DEFAULT_BAD_BLOCK_CACHE_SIZE};
use crate::chain_sync::metrics::{self, values};
use crate::chain_sync::network_context::{ChainNetwork, FetchError, SyncNetworkContext};
use crate::chain_sync::sync_state::{SyncId, SyncState, SyncStates};
use crate::chain_sync::validation::{BlockValidationError, BlockValidator, ValidationContext};
use crate::interpreter::{
    BlockRewarder, DefaultMessageValidator, DefaultRewarder, SignedMessageValidator,
};
use crate::metrics::HistogramTimerExt as _;
use crate::shim::clock::ChainEpoch;
use crate::state_manager::{DEFAULT_TIPSET_STATE_CACHE_SIZE, StateManager};
use cid::Cid;
use fvm_ipld_blockstore::Blockstore;
use libp2p::PeerId;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;
use thiserror::Error;
use tokio::io::AsyncBufRead;
use tracing::{debug, info, instrument, warn};

pub(in crate::chain_sync) type WorkerState = Arc<RwLock<SyncStates>>;

const DEFAULT_UNTRUSTED_CHAIN_HEIGHT_LIMIT: ChainEpoch = 900;
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

/// Structure that defines syncing configuration options
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq, SmartDefault)]
#[serde(default)]
pub struct SyncConfig {
    /// Number of rejected blocks remembered.
    #[default(DEFAULT_BAD_BLOCK_CACHE_SIZE)]
    pub bad_block_cache_size: NonZeroUsize,
    /// Number of tipsets kept by the chain index.
    #[default(DEFAULT_TIPSET_CACHE_SIZE)]
    pub tipset_cache_size: NonZeroUsize,
    /// Number of computed tipset states kept in memory.
    #[default(DEFAULT_TIPSET_STATE_CACHE_SIZE)]
    pub state_cache_size: NonZeroUsize,
    /// How far ahead of the local head an untrusted peer may claim to be.
    #[default(DEFAULT_UNTRUSTED_CHAIN_HEIGHT_LIMIT)]
    pub untrusted_chain_height_limit: ChainEpoch,
    /// Timeout of a single network request.
    #[default(DEFAULT_FETCH_TIMEOUT_SECS)]
    pub fetch_timeout_secs: u64,
}

impl SyncConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

#[derive(Debug, Error)]
pub enum ChainSyncError {
    #[error("Block {0} is marked bad: {1}")]
    BadBlock(Cid, String),
    #[error("Claimed height {claimed} is too far ahead of local head at {local}")]
    ChainTooLong { claimed: ChainEpoch, local: ChainEpoch },
    #[error("Chain ends in genesis {0}, which is not the local genesis")]
    ForeignGenesis(TipsetKey),
    #[error("Block {cid} in epoch {epoch} is invalid: {err}")]
    InvalidBlock {
        cid: Cid,
        epoch: ChainEpoch,
        err: BlockValidationError,
    },
    #[error("Fetching tipset {key} failed: {err}")]
    Fetch { key: TipsetKey, err: FetchError },
    #[error("Chain store error: {0}")]
    ChainStore(#[from] ChainStoreError),
    #[error("Block error: {0}")]
    Block(#[from] ForestBlockError),
    #[error("State computation failed: {0}")]
    State(anyhow::Error),
    #[error("Importing chain failed: {0}")]
    Import(anyhow::Error),
}

/// How a chain head offered to the syncer was handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The head was already validated locally.
    AlreadyKnown,
    /// The head was validated and became the new head.
    Adopted(Tipset),
    /// The head was validated but lost fork choice.
    Ignored(Tipset),
}

impl fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyKnown => write!(f, "already known"),
            Self::Adopted(ts) => write!(f, "adopted {} at epoch {}", ts.key(), ts.epoch()),
            Self::Ignored(ts) => write!(f, "ignored {} at epoch {}", ts.key(), ts.epoch()),
        }
    }
}

/// Consumes chain heads advertised by peers: fetches missing ancestors,
/// validates them, executes their messages and applies fork choice.
pub struct ChainSyncer<DB, N, B, V = DefaultMessageValidator, R = DefaultRewarder> {
    /// manages retrieving and updates state objects
    state_manager: Arc<StateManager<DB, V, R>>,

    /// Context to be able to send requests to the network
    network: SyncNetworkContext<N, DB>,

    validator: B,

    /// Bad blocks cache, updates based on invalid state transitions.
    /// Will mark any invalid blocks and all children as bad in this bounded
    /// cache
    bad_blocks: Arc<BadBlockCache>,

    /// Syncing state of chain sync workers.
    sync_state: WorkerState,

    config: SyncConfig,
}

impl<DB, N, B, V, R> ChainSyncer<DB, N, B, V, R>
where
    DB: Blockstore + Send + Sync + 'static,
    N: ChainNetwork,
    B: BlockValidator,
    V: SignedMessageValidator + 'static,
    R: BlockRewarder + 'static,
{
    pub fn new(
        state_manager: Arc<StateManager<DB, V, R>>,
        network: N,
        validator: B,
        config: SyncConfig,
    ) -> Self {
        let network = SyncNetworkContext::new(
            network,
            state_manager.chain_store().clone(),
            config.fetch_timeout(),
        );
        Self {
            state_manager,
            network,
            validator,
            bad_blocks: Arc::new(BadBlockCache::new(config.bad_block_cache_size)),
            sync_state: Default::default(),
            config,
        }
    }

    pub fn state_manager(&self) -> &Arc<StateManager<DB, V, R>> {
        &self.state_manager
    }

    fn chain_store(&self) -> &Arc<ChainStore<DB>> {
        self.state_manager.chain_store()
    }

    /// Returns a clone of the bad blocks cache to be used outside of chain
    /// sync.
    pub fn bad_blocks_cloned(&self) -> Arc<BadBlockCache> {
        self.bad_blocks.clone()
    }

    /// Status of the most recently started sync still running, otherwise of
    /// the last sync to end. Never waits for a running sync.
    pub fn status(&self) -> SyncState {
        self.sync_state.read().current()
    }

    /// Status of every running sync, oldest first.
    pub fn running_syncs(&self) -> Vec<SyncState> {
        self.sync_state.read().running()
    }

    /// Handles a chain head advertised by a peer.
    ///
    /// `trusted` requests skip fork choice and the height limit applied to
    /// peers, but the chain is validated all the same.
    #[instrument(skip_all, fields(head = %ci.head, height = ci.height, trusted = trusted))]
    pub async fn handle_new_tipset(
        &self,
        ci: ChainInfo,
        trusted: bool,
    ) -> Result<SyncOutcome, ChainSyncError> {
        let result = self.handle_new_tipset_inner(&ci, trusted).await;
        let label = match &result {
            Ok(SyncOutcome::AlreadyKnown) => values::ALREADY_KNOWN,
            Ok(SyncOutcome::Adopted(_)) => values::ADOPTED,
            Ok(SyncOutcome::Ignored(_)) => values::IGNORED,
            Err(_) => values::REJECTED,
        };
        metrics::SYNC_OUTCOME_TOTAL.get_or_create(&label).inc();
        result
    }

    /// Imports an archive written by [`crate::chain::export`] and syncs to
    /// its head as a trusted request.
    pub async fn import_chain(
        &self,
        reader: impl AsyncBufRead + Unpin,
    ) -> Result<SyncOutcome, ChainSyncError> {
        let db = self.state_manager.blockstore();
        let head = crate::chain::import(db.as_ref(), reader)
            .await
            .map_err(ChainSyncError::Import)?;
        let ts = self.chain_store().chain_index.load_required_tipset(&head)?;
        info!("Imported chain head {head} at epoch {}", ts.epoch());
        self.handle_new_tipset(ChainInfo::new(PeerId::random(), head, ts.epoch()), true)
            .await
    }

    async fn handle_new_tipset_inner(
        &self,
        ci: &ChainInfo,
        trusted: bool,
    ) -> Result<SyncOutcome, ChainSyncError> {
        if let Some((cid, reason)) = self.find_bad_block(ci.head.cids()) {
            return Err(ChainSyncError::BadBlock(cid, reason));
        }
        let cs = self.chain_store();
        let head = cs.heaviest_tipset()?;
        if &ci.head == head.key() {
            debug!("Head {} is already known", ci.head);
            return Ok(SyncOutcome::AlreadyKnown);
        }
        if let Some(ts) = cs.chain_index.load_tipset(&ci.head)? {
            if cs.is_tipset_validated(&ts) {
                if trusted {
                    cs.force_head(&ts)?;
                    return Ok(SyncOutcome::Adopted(ts));
                }
                return Ok(SyncOutcome::AlreadyKnown);
            }
        }
        if !trusted && self.too_far_ahead(ci.height, &head) {
            return Err(ChainSyncError::ChainTooLong {
                claimed: ci.height,
                local: head.epoch(),
            });
        }

        let id = self.sync_state.write().start(ci.head.clone(), ci.height);
        // A sync future dropped at an await point leaves no dangling status.
        let cancelled = scopeguard::guard(self.sync_state.clone(), |sync_state| {
            sync_state
                .write()
                .finish(id, |state| state.error("sync cancelled".into()));
        });
        let result = self.sync_to(id, ci, trusted, &head).await;
        let sync_state = scopeguard::ScopeGuard::into_inner(cancelled);
        sync_state.write().finish(id, |state| match &result {
            Ok(outcome) => state.complete(outcome.to_string()),
            Err(e) => state.error(e.to_string()),
        });
        result
    }

    fn too_far_ahead(&self, epoch: ChainEpoch, head: &Tipset) -> bool {
        epoch > head
            .epoch()
            .saturating_add(self.config.untrusted_chain_height_limit)
    }

    async fn sync_to(
        &self,
        id: SyncId,
        ci: &ChainInfo,
        trusted: bool,
        head: &Tipset,
    ) -> Result<SyncOutcome, ChainSyncError> {
        let _timer = metrics::TIPSET_PROCESSING_TIME.start_timer();
        let (base, candidate) = self.fetch_candidate(id, ci, trusted, head).await?;
        debug!(
            "Syncing {} tipsets on top of {} (epoch {})",
            candidate.len(),
            base.key(),
            base.epoch()
        );

        let mut parent = base;
        for (i, fts) in candidate.iter().enumerate().rev() {
            self.sync_state
                .write()
                .update(id, |state| state.set_epoch(fts.epoch()));
            if let Err(e) = self.validate_tipset(fts, &parent).await {
                if let ChainSyncError::InvalidBlock { cid, err, .. } = &e {
                    if !err.is_temporary() {
                        self.mark_descendants_bad(&candidate[..i], cid);
                    }
                }
                return Err(e);
            }
            parent = fts.tipset().clone();
        }

        let target = parent;
        // Execute the new head so its state is ready for its children.
        self.state_manager
            .tipset_state(&target)
            .await
            .map_err(ChainSyncError::State)?;

        let cs = self.chain_store();
        if trusted {
            cs.force_head(&target)?;
            return Ok(SyncOutcome::Adopted(target));
        }
        if cs.update_heaviest(&target)? {
            Ok(SyncOutcome::Adopted(target))
        } else {
            Ok(SyncOutcome::Ignored(target))
        }
    }

    /// Walks back from the advertised head until a locally validated tipset.
    /// Returns that tipset and the fetched tipsets above it, newest first.
    async fn fetch_candidate(
        &self,
        id: SyncId,
        ci: &ChainInfo,
        trusted: bool,
        head: &Tipset,
    ) -> Result<(Tipset, Vec<FullTipset>), ChainSyncError> {
        let cs = self.chain_store();
        let mut candidate: Vec<FullTipset> = vec![];
        let mut key = ci.head.clone();
        loop {
            if let Some(ts) = cs.chain_index.load_tipset(&key)? {
                if cs.is_tipset_validated(&ts) {
                    return Ok((ts, candidate));
                }
            }
            if !trusted && candidate.len() as i64 > self.config.untrusted_chain_height_limit {
                return Err(ChainSyncError::ChainTooLong {
                    claimed: ci.height,
                    local: head.epoch(),
                });
            }
            let fts = self
                .network
                .get_full_tipset(ci.peer, &key)
                .await
                .map_err(|err| ChainSyncError::Fetch {
                    key: key.clone(),
                    err,
                })?;
            if let Some((cid, reason)) = self.find_bad_block(fts.key().cids()) {
                self.mark_descendants_bad(&candidate, &cid);
                return Err(ChainSyncError::BadBlock(cid, reason));
            }
            if fts.parents().is_empty() {
                return Err(ChainSyncError::ForeignGenesis(fts.key().clone()));
            }
            self.sync_state
                .write()
                .update(id, |state| state.set_epoch(fts.epoch()));
            key = fts.parents().clone();
            candidate.push(fts);
        }
    }

    /// Validates every block of `fts` against `parent`, then stores the
    /// blocks and remembers them as validated.
    async fn validate_tipset(
        &self,
        fts: &FullTipset,
        parent: &Tipset,
    ) -> Result<(), ChainSyncError> {
        let cs = self.chain_store();
        let pending: Vec<_> = fts
            .blocks()
            .iter()
            .filter(|block| !cs.is_block_validated(block.cid()))
            .collect();
        if pending.is_empty() {
            return Ok(());
        }

        let parent_state = self
            .state_manager
            .tipset_state(parent)
            .await
            .map_err(ChainSyncError::State)?;
        let version = self
            .state_manager
            .network_version(fts.epoch())
            .map_err(ChainSyncError::State)?;
        let ctx = ValidationContext {
            parent,
            parent_state: &parent_state,
            version,
            chain_config: cs.chain_config(),
        };

        for block in &pending {
            let _timer = metrics::BLOCK_VALIDATION_TIME.start_timer();
            let checked = self
                .validator
                .validate_syntax(block)
                .and_then(|()| self.validator.validate_semantic(block, &ctx));
            if let Err(err) = checked {
                warn!(
                    "Validating block [CID = {}] in EPOCH = {} failed: {err}",
                    block.cid(),
                    fts.epoch()
                );
                metrics::INVALID_TIPSET_TOTAL.inc();
                if !err.is_temporary() {
                    self.bad_blocks.push(*block.cid(), err.to_string());
                }
                return Err(ChainSyncError::InvalidBlock {
                    cid: *block.cid(),
                    epoch: fts.epoch(),
                    err,
                });
            }
        }

        for block in pending {
            persist_block(cs.blockstore(), block).map_err(ChainStoreError::from)?;
            cs.mark_block_as_validated(block.cid());
        }
        Ok(())
    }

    fn find_bad_block(&self, cids: &[Cid]) -> Option<(Cid, String)> {
        cids.iter()
            .find_map(|cid| self.bad_blocks.peek(cid).map(|reason| (*cid, reason)))
    }

    fn mark_descendants_bad(&self, descendants: &[FullTipset], bad: &Cid) {
        for fts in descendants {
            for cid in fts.key().cids() {
                self.bad_blocks
                    .push(*cid, format!("descends from bad block {bad}"));
            }
        }
    }
}
