// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use super::*;
use crate::chain::messages::load_collection;
use crate::interpreter::DEFAULT_BLOCK_REWARD_ATTO;
use crate::message::{Message, Receipt};
use crate::networks::SIGNED_BLOCKS_VERSION;
use crate::test_utils::{Harness, Signer, atto};
use pretty_assertions::assert_eq;

const FUNDS: u64 = 1_000_000_000_000_000_000;

fn harness() -> (Harness, Signer) {
    let alice = Signer::new(1);
    (Harness::new(&[(alice.address(), atto(FUNDS))]), alice)
}

#[tokio::test]
async fn genesis_state_is_its_own_root() {
    let (h, _) = harness();
    let genesis = h.genesis();
    let state = h.state_manager.tipset_state(&genesis).await.unwrap();
    assert_eq!(
        state,
        TipsetState {
            state_root: *genesis.parent_state(),
            receipt_root: *EMPTY_COLLECTION_CID,
        }
    );
    assert_eq!(
        h.state_manager.get_network_name(&state.state_root).unwrap(),
        "devnet"
    );
}

#[tokio::test]
async fn executes_messages_and_persists_receipts() {
    let (h, alice) = harness();
    let miner = Signer::new(10);
    let bob = Signer::new(2).address();
    let msg = alice.sign(Message::transfer(alice.address(), bob, 0, atto(42)));
    let block = h.mine(&h.genesis(), &miner, 1, vec![msg]).await;
    let ts = Tipset::from(block.header().clone());

    let output = h.state_manager.compute_tipset_state(ts.clone()).await.unwrap();
    assert_eq!(output.results.len(), 1);
    assert!(output.results[0].is_success());

    let receipts: Vec<Receipt> =
        load_collection(h.db.as_ref(), &output.state.receipt_root).unwrap();
    assert_eq!(receipts.len(), 1);
    assert!(receipts[0].is_success());

    let state_root = output.state.state_root;
    let sm = &h.state_manager;
    assert_eq!(sm.get_actor(&bob, &state_root).unwrap().unwrap().balance, atto(42));
    let gas_used = receipts[0].gas_used;
    assert_eq!(
        sm.get_actor(&miner.address(), &state_root)
            .unwrap()
            .unwrap()
            .balance,
        atto(DEFAULT_BLOCK_REWARD_ATTO + gas_used)
    );

    // The cached state agrees with a fresh computation.
    assert_eq!(sm.tipset_state(&ts).await.unwrap(), output.state);
    assert_eq!(sm.tipset_state(&ts).await.unwrap(), output.state);
}

#[tokio::test]
async fn concurrent_requests_agree() {
    let (h, _) = harness();
    let head = h.mine_chain(&h.genesis(), &Signer::new(10), 3).await;
    let sm = &h.state_manager;
    let (a, b) = tokio::join!(sm.tipset_state(&head), sm.tipset_state(&head));
    assert_eq!(a.unwrap(), b.unwrap());
}

#[tokio::test]
async fn message_included_by_two_blocks_runs_once() {
    let (h, alice) = harness();
    let bob = Signer::new(2).address();
    let msg = alice.sign(Message::transfer(alice.address(), bob, 0, atto(42)));
    let genesis = h.genesis();
    let b1 = h.mine(&genesis, &Signer::new(10), 1, vec![msg.clone()]).await;
    let b2 = h.mine(&genesis, &Signer::new(11), 2, vec![msg]).await;
    let ts = Tipset::new([b1.header().clone(), b2.header().clone()]).unwrap();

    let output = h.state_manager.compute_tipset_state_blocking(&ts).unwrap();
    assert_eq!(output.results.len(), 1);
    assert_eq!(
        h.state_manager
            .get_actor(&bob, &output.state.state_root)
            .unwrap()
            .unwrap()
            .balance,
        atto(42)
    );
}

#[test]
fn network_version_follows_upgrade_table() {
    let (h, _) = harness();
    assert_eq!(h.state_manager.network_version(0).unwrap(), 0);
    assert_eq!(
        h.state_manager.network_version(150).unwrap(),
        SIGNED_BLOCKS_VERSION
    );
}
