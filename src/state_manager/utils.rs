// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use crate::blocks::{FullTipset, Tipset};
use crate::chain::MessageProvider;
use crate::interpreter::BlockMessages;
use crate::message::SignedMessage;
use crate::shim::address::Address;
use ahash::{HashMap, HashMapExt as _, HashSet, HashSetExt as _};

/// Selects the messages of a tipset that are passed through the VM, grouped
/// by block in canonical order.
///
/// Messages already included by an earlier block are dropped, and for every
/// sender only an unbroken run of sequences starting at its first message is
/// kept.
pub fn block_messages_for_tipset(
    provider: &impl MessageProvider,
    ts: &Tipset,
) -> anyhow::Result<Vec<BlockMessages>> {
    let per_block = ts
        .block_headers()
        .iter()
        .map(|header| Ok((header.miner_address, provider.messages_for_block(header)?)))
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(select_messages(per_block))
}

/// Same as [`block_messages_for_tipset`] for a tipset whose messages are
/// already at hand.
pub fn block_messages_for_full_tipset(ts: &FullTipset) -> Vec<BlockMessages> {
    select_messages(
        ts.blocks()
            .iter()
            .map(|block| (block.header().miner_address, block.messages().to_vec())),
    )
}

fn select_messages(
    blocks: impl IntoIterator<Item = (Address, Vec<SignedMessage>)>,
) -> Vec<BlockMessages> {
    let mut included = HashSet::new();
    let mut applied = HashMap::new();
    let mut select_msg = |m: &SignedMessage| -> bool {
        if !included.insert(m.cid()) {
            return false;
        }
        // The first match for a sender is guaranteed to have correct nonce
        // the block isn't valid otherwise. `None` once the sequence space of
        // a sender is exhausted.
        let next = applied
            .entry(m.message().from)
            .or_insert_with(|| Some(m.sequence()));
        if *next != Some(m.sequence()) {
            return false;
        }
        *next = m.sequence().checked_add(1);
        true
    };

    blocks
        .into_iter()
        .map(|(miner, messages)| BlockMessages {
            miner,
            messages: messages.into_iter().filter(|m| select_msg(m)).collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;
    use crate::shim::econ::TokenAmount;
    use crate::test_utils::Signer;

    #[test]
    fn duplicates_and_gaps_are_dropped() {
        let alice = Signer::new(1);
        let bob = Signer::new(2);
        let to = Address::new_id(100);
        let msg = |signer: &Signer, seq| {
            signer.sign(Message::transfer(
                signer.address(),
                to,
                seq,
                TokenAmount::from_atto(1),
            ))
        };
        let first = vec![msg(&alice, 0), msg(&alice, 1), msg(&bob, 5)];
        let second = vec![msg(&alice, 1), msg(&alice, 3), msg(&alice, 2), msg(&bob, 6)];
        let selected = select_messages([
            (Address::new_id(1000), first),
            (Address::new_id(1001), second),
        ]);
        let sequences = |i: usize| {
            selected[i]
                .messages
                .iter()
                .map(|m| (m.message().from, m.sequence()))
                .collect::<Vec<_>>()
        };
        assert_eq!(
            sequences(0),
            vec![
                (alice.address(), 0),
                (alice.address(), 1),
                (bob.address(), 5)
            ]
        );
        assert_eq!(
            sequences(1),
            vec![(alice.address(), 2), (bob.address(), 6)]
        );
        assert_eq!(selected[1].miner, Address::new_id(1001));
    }

    #[test]
    fn last_sequence_ends_the_run() {
        let alice = Signer::new(1);
        let msg = |seq| {
            alice.sign(Message::transfer(
                alice.address(),
                Address::new_id(100),
                seq,
                TokenAmount::from_atto(1),
            ))
        };
        let selected = select_messages([(
            Address::new_id(1000),
            vec![msg(u64::MAX - 1), msg(u64::MAX), msg(0)],
        )]);
        let sequences: Vec<_> = selected[0].messages.iter().map(|m| m.sequence()).collect();
        assert_eq!(sequences, vec![u64::MAX - 1, u64::MAX]);
    }
}
