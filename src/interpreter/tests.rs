// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::sync::Arc;

use super::actors::{ActorRegistry, ExecutableActor, REWARD_ACTOR_CODE_ID};
use super::*;
use crate::blocks::Tipset;
use crate::db::MemoryDB;
use crate::message::{EMPTY_COLLECTION_CID, Message, MethodNum, SignedMessage};
use crate::networks::ChainConfig;
use crate::shim::address::{Address, INIT_ACTOR_ADDR, REWARD_ACTOR_ADDR};
use crate::shim::econ::TokenAmount;
use crate::shim::error::ExitCode;
use crate::shim::state_tree::{ActorState, StateTree};
use crate::test_utils::{REWARD_POOL_ATTO, Signer, atto, genesis_header};
use cid::Cid;
use fvm_ipld_encoding::{IPLD_RAW, RawBytes};
use multihash_codetable::{Code, MultihashDigest as _};
use pretty_assertions::assert_eq;

const FUNDS: u64 = 1_000_000_000_000_000_000;
const CUSTOM_ADDR: Address = Address::new_id(500);

/// Echoes its parameters, draws randomness on method 3 and aborts on
/// method 4.
struct TestActor;

impl ExecutableActor for TestActor {
    fn invoke(
        &self,
        rt: &mut dyn Runtime,
        method: MethodNum,
        params: &RawBytes,
    ) -> Result<RawBytes, ActorError> {
        match method {
            2 => Ok(params.clone()),
            3 => {
                let epoch = rt.curr_epoch() - 1;
                Ok(RawBytes::new(rt.sample_chain_randomness(epoch)?.to_vec()))
            }
            4 => Err(ActorError::fatal("store is gone")),
            _ => Err(crate::actor_error!(USR_UNHANDLED_MESSAGE; "invalid method {}", method)),
        }
    }
}

fn test_actor_code() -> Cid {
    Cid::new_v1(IPLD_RAW, Code::Blake2b256.digest(b"test/actor"))
}

struct Setup {
    db: MemoryDB,
    base: Cid,
    ancestors: Vec<Tipset>,
    alice: Signer,
    miner: Address,
}

impl Setup {
    fn new(alice_funds: u64) -> Self {
        let db = MemoryDB::default();
        let alice = Signer::new(1);
        let genesis = genesis_header(&db, "devnet", &[(alice.address(), atto(alice_funds))]);
        let mut tree = StateTree::new_from_root(&db, &genesis.state_root).unwrap();
        tree.set_actor(
            &CUSTOM_ADDR,
            ActorState::new(test_actor_code(), *EMPTY_COLLECTION_CID, atto(0), 0),
        )
        .unwrap();
        let base = tree.flush().unwrap();
        Self {
            db,
            base,
            ancestors: vec![Tipset::from(genesis)],
            alice,
            miner: Signer::new(10).address(),
        }
    }

    fn processor(
        &self,
        registry: ActorRegistry,
    ) -> Processor<DefaultMessageValidator, DefaultRewarder> {
        Processor::new(
            DefaultMessageValidator,
            DefaultRewarder::default(),
            registry,
            Arc::new(ChainConfig::devnet().upgrade_table().unwrap()),
        )
    }

    fn apply(&self, messages: &[SignedMessage]) -> Result<ProcessOutput, ProcessorError> {
        self.apply_with(ActorRegistry::builtin(), messages)
    }

    fn apply_with(
        &self,
        registry: ActorRegistry,
        messages: &[SignedMessage],
    ) -> Result<ProcessOutput, ProcessorError> {
        self.processor(registry)
            .apply_messages(&self.db, &self.base, messages, &self.miner, 1, &self.ancestors)
    }

    fn call(
        &self,
        to: Address,
        seq: u64,
        value: u64,
        method: MethodNum,
        params: RawBytes,
    ) -> SignedMessage {
        self.alice.sign(Message {
            method_num: method,
            params,
            ..Message::transfer(self.alice.address(), to, seq, atto(value))
        })
    }

    fn actor(&self, root: &Cid, addr: &Address) -> Option<ActorState> {
        StateTree::new_from_root(&self.db, root)
            .unwrap()
            .get_actor(addr)
            .unwrap()
    }

    fn balance(&self, root: &Cid, addr: &Address) -> TokenAmount {
        self.actor(root, addr).map(|a| a.balance).unwrap_or_default()
    }
}

#[test]
fn empty_batch_keeps_base_root() {
    let s = Setup::new(FUNDS);
    let out = s.apply(&[]).unwrap();
    assert_eq!(out.state_root, s.base);
    assert!(out.results.is_empty());
}

#[test]
fn transfer_charges_gas_and_pays_miner() {
    let s = Setup::new(FUNDS);
    let bob = Signer::new(2).address();
    let msg = s.alice.sign(Message::transfer(s.alice.address(), bob, 0, atto(500)));
    let out = s.apply(&[msg]).unwrap();

    let result = &out.results[0];
    assert!(result.is_success(), "{:?}", result.failure);
    let gas_used = result.receipt.gas_used;
    assert!(gas_used > 0);
    assert_eq!(s.balance(&out.state_root, &bob), atto(500));
    assert_eq!(
        s.balance(&out.state_root, &s.alice.address()),
        atto(FUNDS - 500 - gas_used)
    );
    assert_eq!(s.balance(&out.state_root, &s.miner), atto(gas_used));
    assert_eq!(
        s.actor(&out.state_root, &s.alice.address()).unwrap().sequence,
        1
    );
    // The base state is untouched.
    assert_eq!(s.balance(&s.base, &bob), atto(0));
}

#[test]
fn rejected_messages_leave_state_alone() {
    let s = Setup::new(FUNDS);
    let stranger = Signer::new(7);
    let to = Signer::new(2).address();
    let bad_nonce = s.alice.sign(Message::transfer(s.alice.address(), to, 5, atto(1)));
    let no_sender = stranger.sign(Message::transfer(stranger.address(), to, 0, atto(1)));
    let mut forged = s.alice.sign(Message::transfer(s.alice.address(), to, 0, atto(1)));
    forged.signature = stranger.sign(forged.message().clone()).signature;

    let out = s.apply(&[bad_nonce, no_sender, forged]).unwrap();
    assert_eq!(out.state_root, s.base);
    let codes: Vec<_> = out.results.iter().map(ApplicationResult::exit_code).collect();
    assert_eq!(
        codes,
        vec![
            ExitCode::SYS_SENDER_STATE_INVALID,
            ExitCode::SYS_SENDER_INVALID,
            ExitCode::SYS_SENDER_INVALID,
        ]
    );
    assert!(matches!(
        out.results[1].failure,
        Some(MessageFailure::ActorNotFound(_))
    ));
    assert!(out.results.iter().all(|r| r.receipt.gas_used == 0));
}

#[test]
fn insufficient_funds() {
    let s = Setup::new(100);
    let msg = s.alice.sign(Message::transfer(s.alice.address(), INIT_ACTOR_ADDR, 0, atto(1)));
    let out = s.apply(&[msg]).unwrap();
    assert_eq!(out.state_root, s.base);
    assert_eq!(out.results[0].exit_code(), ExitCode::SYS_INSUFFICIENT_FUNDS);
    assert!(matches!(
        out.results[0].failure,
        Some(MessageFailure::InsufficientFunds { .. })
    ));
}

#[test]
fn later_transfer_sees_earlier_spending() {
    // Covers the gas prepayment of one transfer plus the value of both.
    let s = Setup::new(20_000_000);
    let bob = Signer::new(2).address();
    let first = s.alice.sign(Message::transfer(s.alice.address(), bob, 0, atto(5_000_000)));
    let second = s.alice.sign(Message::transfer(s.alice.address(), bob, 1, atto(6_000_000)));
    let out = s.apply(&[first, second]).unwrap();

    let codes: Vec<_> = out.results.iter().map(ApplicationResult::exit_code).collect();
    assert_eq!(codes, vec![ExitCode::OK, ExitCode::SYS_INSUFFICIENT_FUNDS]);
    let gas_used = out.results[0].receipt.gas_used;
    assert_eq!(out.results[1].receipt.gas_used, 0);
    assert!(matches!(
        &out.results[1].failure,
        Some(MessageFailure::InsufficientFunds { available, .. })
            if *available == atto(15_000_000 - gas_used)
    ));
    assert_eq!(
        s.balance(&out.state_root, &s.alice.address()),
        atto(15_000_000 - gas_used)
    );
    assert_eq!(s.balance(&out.state_root, &bob), atto(5_000_000));
    assert_eq!(
        s.actor(&out.state_root, &s.alice.address()).unwrap().sequence,
        1
    );
}

#[test]
fn failed_invocation_reverts_value_but_charges_gas() {
    let s = Setup::new(FUNDS);
    let msg = s.call(INIT_ACTOR_ADDR, 0, 10, 99, RawBytes::default());
    let out = s.apply(&[msg]).unwrap();

    let result = &out.results[0];
    assert_eq!(result.exit_code(), ExitCode::USR_UNHANDLED_MESSAGE);
    assert!(matches!(result.failure, Some(MessageFailure::Reverted(_))));
    let gas_used = result.receipt.gas_used;
    assert!(gas_used > 0);
    assert_eq!(s.balance(&out.state_root, &INIT_ACTOR_ADDR), atto(0));
    assert_eq!(
        s.balance(&out.state_root, &s.alice.address()),
        atto(FUNDS - gas_used)
    );
    assert_eq!(
        s.actor(&out.state_root, &s.alice.address()).unwrap().sequence,
        1
    );
}

#[test]
fn init_actor_reports_network_name() {
    let s = Setup::new(FUNDS);
    let msg = s.call(INIT_ACTOR_ADDR, 0, 0, 2, RawBytes::default());
    let out = s.apply(&[msg]).unwrap();
    let result = &out.results[0];
    assert!(result.is_success(), "{:?}", result.failure);
    assert_eq!(
        result.receipt.return_data.deserialize::<String>().unwrap(),
        "devnet"
    );
}

#[test]
fn registry_is_scoped_to_processor() {
    let s = Setup::new(FUNDS);
    let params = RawBytes::new(vec![1, 2, 3]);
    let msg = s.call(CUSTOM_ADDR, 0, 0, 2, params.clone());

    let out = s.apply(std::slice::from_ref(&msg)).unwrap();
    assert_eq!(out.results[0].exit_code(), ExitCode::SYS_INVALID_RECEIVER);

    let scoped = ActorRegistry::builtin().with_actor(test_actor_code(), Arc::new(TestActor));
    let out = s.apply_with(scoped, &[msg]).unwrap();
    assert!(out.results[0].is_success());
    assert_eq!(out.results[0].receipt.return_data, params);
}

#[test]
fn actors_draw_randomness_from_ancestors() {
    let s = Setup::new(FUNDS);
    let registry = ActorRegistry::builtin().with_actor(test_actor_code(), Arc::new(TestActor));
    let msg = s.call(CUSTOM_ADDR, 0, 0, 3, RawBytes::default());
    let out = s.apply_with(registry, &[msg]).unwrap();
    assert!(out.results[0].is_success(), "{:?}", out.results[0].failure);
    assert_eq!(
        out.results[0].receipt.return_data.bytes(),
        chain_randomness(&s.ancestors, 0).unwrap().as_slice()
    );
}

#[test]
fn fatal_actor_error_aborts_batch() {
    let s = Setup::new(FUNDS);
    let registry = ActorRegistry::builtin().with_actor(test_actor_code(), Arc::new(TestActor));
    let msg = s.call(CUSTOM_ADDR, 0, 0, 4, RawBytes::default());
    let err = s.apply_with(registry, &[msg.clone()]).unwrap_err();
    assert!(
        matches!(&err, ProcessorError::ActorFatal { cid, .. } if *cid == msg.cid()),
        "{err}"
    );
}

#[test]
fn tipset_pays_block_reward_per_block() {
    let s = Setup::new(FUNDS);
    let processor = s.processor(ActorRegistry::builtin());
    let m1 = Signer::new(10).address();
    let m2 = Signer::new(11).address();
    let bob = Signer::new(2).address();
    let blocks = vec![
        BlockMessages {
            miner: m1,
            messages: vec![s.alice.sign(Message::transfer(s.alice.address(), bob, 0, atto(1)))],
        },
        BlockMessages {
            miner: m2,
            messages: vec![],
        },
    ];
    let out = processor
        .apply_tipset_messages(&s.db, &s.base, &blocks, 1, &s.ancestors)
        .unwrap();
    let gas_used = out.results[0].receipt.gas_used;
    let reward = DEFAULT_BLOCK_REWARD_ATTO;
    assert_eq!(s.balance(&out.state_root, &m1), atto(reward + gas_used));
    assert_eq!(s.balance(&out.state_root, &m2), atto(reward));
    assert_eq!(
        s.balance(&out.state_root, &REWARD_ACTOR_ADDR),
        atto(REWARD_POOL_ATTO - 2 * reward)
    );
    assert_eq!(
        s.actor(&out.state_root, &REWARD_ACTOR_ADDR).unwrap().code,
        *REWARD_ACTOR_CODE_ID
    );
    assert_eq!(out.receipts().len(), 1);

    // The message-only path pays no block reward.
    let out = s.apply(&blocks[0].messages).unwrap();
    assert_eq!(s.balance(&out.state_root, &m1), atto(gas_used));
}
