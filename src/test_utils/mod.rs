// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Fixtures shared by the unit tests: key pairs, a funded genesis and a
//! block producer that computes parent state the way validators expect it.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::blocks::{
    Block, CachingBlockHeader, FullTipset, RawBlockHeader, RawBlockHeaderBuilder, Ticket, Tipset,
    TipsetKey, VRFProof,
};
use crate::chain::{ChainStore, MessageProvider as _, child_weight, messages::persist_block};
use crate::chain::messages::persist_messages;
use crate::chain_sync::{BlockValidationError, BlockValidator, ChainNetwork, ValidationContext};
use crate::db::MemoryDB;
use crate::interpreter::actors::{
    ActorRegistry, REWARD_ACTOR_CODE_ID, SYSTEM_ACTOR_CODE_ID, account::new_account_actor,
    init::new_init_actor,
};
use crate::interpreter::{DefaultMessageValidator, DefaultRewarder, Processor};
use crate::message::{EMPTY_COLLECTION_CID, Message, SignedMessage};
use crate::networks::ChainConfig;
use crate::shim::address::{Address, INIT_ACTOR_ADDR, REWARD_ACTOR_ADDR, SYSTEM_ACTOR_ADDR};
use crate::shim::crypto::Signature;
use crate::shim::econ::TokenAmount;
use crate::shim::state_tree::{ActorState, StateTree};
use crate::state_manager::{DEFAULT_TIPSET_STATE_CACHE_SIZE, StateManager};
use crate::utils::encoding::blake2b_256;
use ahash::HashMap;
use async_trait::async_trait;
use cid::Cid;
use k256::ecdsa::SigningKey;
use libp2p::PeerId;
use nonzero_ext::nonzero;
use parking_lot::Mutex;

pub const GENESIS_TIMESTAMP: u64 = 1_600_000_000;

/// Balance of the reward actor at genesis.
pub const REWARD_POOL_ATTO: u64 = 10_000_000_000_000_000_000;

pub type TestStateManager = StateManager<MemoryDB, DefaultMessageValidator, DefaultRewarder>;

/// secp256k1 key pair derived from a one byte seed. The seed must not be 0.
pub struct Signer {
    key: SigningKey,
    address: Address,
}

impl Signer {
    pub fn new(seed: u8) -> Self {
        let key = SigningKey::from_slice(&[seed; 32]).unwrap();
        let address =
            Address::new_secp256k1(key.verifying_key().to_encoded_point(false).as_bytes()).unwrap();
        Self { key, address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn sign_bytes(&self, data: &[u8]) -> Signature {
        let (sig, recid) = self.key.sign_prehash_recoverable(&blake2b_256(data)).unwrap();
        let mut bytes = sig.to_bytes().to_vec();
        bytes.push(recid.to_byte());
        Signature::new_secp256k1(bytes)
    }

    pub fn sign(&self, message: Message) -> SignedMessage {
        let signature = self.sign_bytes(&message.cid().to_bytes());
        SignedMessage::new_unchecked(message, signature)
    }

    pub fn sign_header(&self, header: &mut RawBlockHeader) {
        header.signature = Some(self.sign_bytes(&header.signing_bytes()));
    }
}

pub fn ticket(n: u64) -> Ticket {
    Ticket::new(VRFProof::new(format!("ticket-{n}").into_bytes()))
}

pub fn atto(n: u64) -> TokenAmount {
    TokenAmount::from_atto(n)
}

/// Writes the genesis state into `db` and returns the genesis header.
/// The same inputs always produce the same header.
pub fn genesis_header(
    db: &MemoryDB,
    network_name: &str,
    funded: &[(Address, TokenAmount)],
) -> CachingBlockHeader {
    let mut tree = StateTree::new(db);
    tree.set_actor(
        &SYSTEM_ACTOR_ADDR,
        ActorState::new(*SYSTEM_ACTOR_CODE_ID, *EMPTY_COLLECTION_CID, atto(0), 0),
    )
    .unwrap();
    tree.set_actor(&INIT_ACTOR_ADDR, new_init_actor(db, network_name).unwrap())
        .unwrap();
    tree.set_actor(
        &REWARD_ACTOR_ADDR,
        ActorState::new(
            *REWARD_ACTOR_CODE_ID,
            *EMPTY_COLLECTION_CID,
            atto(REWARD_POOL_ATTO),
            0,
        ),
    )
    .unwrap();
    for (address, balance) in funded {
        let mut actor = new_account_actor(db, address).unwrap();
        actor.deposit_funds(balance);
        tree.set_actor(address, actor).unwrap();
    }
    let state_root = tree.flush().unwrap();
    CachingBlockHeader::new(
        RawBlockHeaderBuilder::default()
            .miner_address(SYSTEM_ACTOR_ADDR)
            .ticket(Some(ticket(0)))
            .epoch(0)
            .state_root(state_root)
            .message_receipts(*EMPTY_COLLECTION_CID)
            .messages(*EMPTY_COLLECTION_CID)
            .timestamp(GENESIS_TIMESTAMP)
            .build()
            .unwrap(),
    )
}

/// A node's view of a chain: store, chain store and state manager over a
/// funded devnet genesis.
pub struct Harness {
    pub db: Arc<MemoryDB>,
    pub state_manager: Arc<TestStateManager>,
}

impl Harness {
    pub fn new(funded: &[(Address, TokenAmount)]) -> Self {
        Self::with_network(ChainConfig::devnet(), funded)
    }

    pub fn with_network(config: ChainConfig, funded: &[(Address, TokenAmount)]) -> Self {
        let db = Arc::new(MemoryDB::default());
        let genesis = genesis_header(&db, &config.network.to_string(), funded);
        let upgrades = Arc::new(config.upgrade_table().unwrap());
        let cs = Arc::new(
            ChainStore::new(
                db.clone(),
                db.clone(),
                Arc::new(config),
                genesis,
                nonzero!(64usize),
            )
            .unwrap(),
        );
        let processor = Processor::new(
            DefaultMessageValidator,
            DefaultRewarder::default(),
            ActorRegistry::builtin(),
            upgrades,
        );
        Self {
            db,
            state_manager: Arc::new(StateManager::new(
                cs,
                processor,
                DEFAULT_TIPSET_STATE_CACHE_SIZE,
            )),
        }
    }

    pub fn chain_store(&self) -> &Arc<ChainStore<MemoryDB>> {
        self.state_manager.chain_store()
    }

    pub fn genesis(&self) -> Tipset {
        self.chain_store().genesis_tipset()
    }

    /// Produces a correctly formed, signed child of `parent` carrying
    /// `messages`. The block is stored locally but not marked as validated.
    pub async fn mine(
        &self,
        parent: &Tipset,
        miner: &Signer,
        ticket_seed: u64,
        messages: Vec<SignedMessage>,
    ) -> Block {
        let parent_state = self.state_manager.tipset_state(parent).await.unwrap();
        let delay = u64::from(self.chain_store().chain_config().block_delay_secs);
        let mut header = RawBlockHeaderBuilder::default()
            .miner_address(miner.address())
            .ticket(Some(ticket(ticket_seed)))
            .parents(parent.key().clone())
            .weight(child_weight(parent))
            .epoch(parent.epoch() + 1)
            .state_root(parent_state.state_root)
            .message_receipts(parent_state.receipt_root)
            .messages(persist_messages(self.db.as_ref(), &messages).unwrap())
            .timestamp(parent.min_timestamp() + delay)
            .build()
            .unwrap();
        miner.sign_header(&mut header);
        let block = Block::new(CachingBlockHeader::new(header), messages);
        persist_block(self.db.as_ref(), &block).unwrap();
        block
    }

    /// Mines `len` empty tipsets on top of `parent` and returns the last one.
    /// Forks from the same parent need distinct miners.
    pub async fn mine_chain(&self, parent: &Tipset, miner: &Signer, len: u64) -> Tipset {
        let mut head = parent.clone();
        for i in 0..len {
            let seed = head.epoch() as u64 * 100 + i;
            head = Tipset::from(self.mine(&head, miner, seed, vec![]).await.header().clone());
        }
        head
    }
}

/// Serves full tipsets straight out of another node's store.
pub struct StoreNetwork {
    db: Arc<MemoryDB>,
    requests: AtomicUsize,
}

impl StoreNetwork {
    pub fn new(db: Arc<MemoryDB>) -> Self {
        Self {
            db,
            requests: AtomicUsize::new(0),
        }
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainNetwork for StoreNetwork {
    async fn fetch_full_tipset(
        &self,
        _peer: PeerId,
        key: &TipsetKey,
    ) -> anyhow::Result<FullTipset> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let ts = Tipset::load_required(self.db.as_ref(), key)?;
        let blocks = ts
            .block_headers()
            .iter()
            .map(|h| Ok(Block::new(h.clone(), self.db.messages_for_block(h)?)))
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(FullTipset::new(blocks)?)
    }
}

/// Network that never answers.
pub struct SilentNetwork;

#[async_trait]
impl ChainNetwork for SilentNetwork {
    async fn fetch_full_tipset(&self, _: PeerId, _: &TipsetKey) -> anyhow::Result<FullTipset> {
        futures::future::pending().await
    }
}

/// Block validator with scripted verdicts that counts its invocations.
#[derive(Default)]
pub struct StubBlockValidator {
    verdicts: Mutex<HashMap<Cid, BlockValidationError>>,
    calls: AtomicUsize,
}

impl StubBlockValidator {
    pub fn reject(&self, cid: Cid, err: BlockValidationError) {
        self.verdicts.lock().insert(cid, err);
    }

    /// Number of blocks run through validation.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl BlockValidator for StubBlockValidator {
    fn validate_syntax(&self, block: &Block) -> Result<(), BlockValidationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.verdicts.lock().get(block.cid()) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn validate_semantic(
        &self,
        _: &Block,
        _: &ValidationContext<'_>,
    ) -> Result<(), BlockValidationError> {
        Ok(())
    }
}
