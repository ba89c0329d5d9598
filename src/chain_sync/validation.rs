// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use crate::blocks::{BLOCK_MESSAGE_LIMIT, Block, Tipset};
use crate::chain::weight::child_weight;
use crate::networks::{ChainConfig, ProtocolVersion, SIGNED_BLOCKS_VERSION};
use crate::shim::clock::ALLOWABLE_CLOCK_DRIFT;
use crate::state_manager::TipsetState;
use num_bigint::BigInt;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BlockValidationError {
    #[error("Block must have a signature")]
    BlockWithoutSignature,
    #[error("Block must have a ticket")]
    BlockWithoutTicket,
    #[error("Block received from the future: now = {0}, block = {1}")]
    TimeTravellingBlock(u64, u64),
    #[error("Block has {0} messages, limit is {limit}", limit = BLOCK_MESSAGE_LIMIT)]
    TooManyMessages(usize),
    #[error("Block message root does not match: expected {0}, computed {1}")]
    BlockMessageRootInvalid(String, String),
    #[error("Block does not extend its parent: {0}")]
    InvalidParent(String),
    #[error("Parent weight doesn't match: {header} (header), {computed} (computed)")]
    InvalidWeight { header: BigInt, computed: BigInt },
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),
    #[error("Message signature invalid: {0}")]
    MessageSignatureInvalid(String),
    #[error(
        "Parent state root did not match computed state: {header} (header), {computed} (computed)"
    )]
    StateRootMismatch { header: String, computed: String },
    #[error(
        "Parent receipt root did not match computed root: {header} (header), {computed} (computed)"
    )]
    ReceiptRootMismatch { header: String, computed: String },
    #[error("Validation error: {0}")]
    Validation(String),
}

impl BlockValidationError {
    /// Temporary failures do not mark a block as bad.
    pub fn is_temporary(&self) -> bool {
        matches!(self, Self::TimeTravellingBlock(..))
    }
}

/// Everything semantic validation of a block needs to know about its parent.
#[derive(Debug, Clone, Copy)]
pub struct ValidationContext<'a> {
    pub parent: &'a Tipset,
    /// State produced by executing the parent tipset.
    pub parent_state: &'a TipsetState,
    /// Protocol version active at the block's epoch.
    pub version: ProtocolVersion,
    pub chain_config: &'a ChainConfig,
}

/// Validation rules applied to every newly fetched block.
pub trait BlockValidator: Send + Sync {
    /// Structural checks that need nothing but the block itself.
    fn validate_syntax(&self, block: &Block) -> Result<(), BlockValidationError>;

    /// Checks against the parent tipset and its computed state.
    fn validate_semantic(
        &self,
        block: &Block,
        ctx: &ValidationContext<'_>,
    ) -> Result<(), BlockValidationError>;
}

impl<V: BlockValidator + ?Sized> BlockValidator for std::sync::Arc<V> {
    fn validate_syntax(&self, block: &Block) -> Result<(), BlockValidationError> {
        V::validate_syntax(self, block)
    }

    fn validate_semantic(
        &self,
        block: &Block,
        ctx: &ValidationContext<'_>,
    ) -> Result<(), BlockValidationError> {
        V::validate_semantic(self, block, ctx)
    }
}

/// Consensus rules of the chain.
///
/// Syntax:
/// * a ticket is present
/// * the message count is within [`BLOCK_MESSAGE_LIMIT`]
/// * the message root in the header matches the messages
///
/// Semantics:
/// * parents, epoch and timestamp extend the parent tipset
/// * the weight is the parent weight plus one per parent block
/// * state and receipt roots match the executed parent
/// * the block signature, mandatory from [`SIGNED_BLOCKS_VERSION`]
/// * message signatures
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultBlockValidator;

impl BlockValidator for DefaultBlockValidator {
    fn validate_syntax(&self, block: &Block) -> Result<(), BlockValidationError> {
        let header = block.header();
        if header.ticket.is_none() {
            return Err(BlockValidationError::BlockWithoutTicket);
        }
        if block.messages().len() > BLOCK_MESSAGE_LIMIT {
            return Err(BlockValidationError::TooManyMessages(block.messages().len()));
        }
        let msg_root = block
            .computed_messages_cid()
            .map_err(|e| BlockValidationError::Validation(e.to_string()))?;
        if header.messages != msg_root {
            return Err(BlockValidationError::BlockMessageRootInvalid(
                header.messages.to_string(),
                msg_root.to_string(),
            ));
        }
        Ok(())
    }

    fn validate_semantic(
        &self,
        block: &Block,
        ctx: &ValidationContext<'_>,
    ) -> Result<(), BlockValidationError> {
        let header = block.header();
        let parent = ctx.parent;
        if &header.parents != parent.key() {
            return Err(BlockValidationError::InvalidParent(format!(
                "parents {} != {}",
                header.parents,
                parent.key()
            )));
        }
        if header.epoch <= parent.epoch() {
            return Err(BlockValidationError::InvalidParent(format!(
                "epoch {} is not above parent epoch {}",
                header.epoch,
                parent.epoch()
            )));
        }
        block_timestamp_checks(header.timestamp)?;
        let min_timestamp = header
            .epoch
            .checked_sub(parent.epoch())
            .and_then(|rounds| u64::try_from(rounds).ok())
            .and_then(|rounds| u64::from(ctx.chain_config.block_delay_secs).checked_mul(rounds))
            .and_then(|delay| parent.min_timestamp().checked_add(delay))
            .ok_or_else(|| {
                BlockValidationError::InvalidParent(format!(
                    "epoch {} is out of reach of parent epoch {}",
                    header.epoch,
                    parent.epoch()
                ))
            })?;
        if header.timestamp < min_timestamp {
            return Err(BlockValidationError::Validation(format!(
                "block was generated too soon: {} < {min_timestamp}",
                header.timestamp
            )));
        }

        let computed = child_weight(parent);
        if header.weight != computed {
            return Err(BlockValidationError::InvalidWeight {
                header: header.weight.clone(),
                computed,
            });
        }

        if header.state_root != ctx.parent_state.state_root {
            return Err(BlockValidationError::StateRootMismatch {
                header: header.state_root.to_string(),
                computed: ctx.parent_state.state_root.to_string(),
            });
        }
        if header.message_receipts != ctx.parent_state.receipt_root {
            return Err(BlockValidationError::ReceiptRootMismatch {
                header: header.message_receipts.to_string(),
                computed: ctx.parent_state.receipt_root.to_string(),
            });
        }

        match &header.signature {
            None if ctx.version >= SIGNED_BLOCKS_VERSION => {
                return Err(BlockValidationError::BlockWithoutSignature);
            }
            None => {}
            Some(_) => header
                .check_block_signature(&header.miner_address)
                .map_err(|e| BlockValidationError::InvalidSignature(e.to_string()))?,
        }

        for (i, msg) in block.messages().iter().enumerate() {
            msg.verify().map_err(|e| {
                BlockValidationError::MessageSignatureInvalid(format!("message at index {i}: {e}"))
            })?;
        }
        Ok(())
    }
}

/// Accepts every block.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopBlockValidator;

impl BlockValidator for NoopBlockValidator {
    fn validate_syntax(&self, _: &Block) -> Result<(), BlockValidationError> {
        Ok(())
    }

    fn validate_semantic(
        &self,
        _: &Block,
        _: &ValidationContext<'_>,
    ) -> Result<(), BlockValidationError> {
        Ok(())
    }
}

/// Check the clock drift.
fn block_timestamp_checks(timestamp: u64) -> Result<(), BlockValidationError> {
    let time_now = chrono::Utc::now().timestamp() as u64;
    if timestamp > time_now.saturating_add(ALLOWABLE_CLOCK_DRIFT) {
        return Err(BlockValidationError::TimeTravellingBlock(time_now, timestamp));
    } else if timestamp > time_now {
        warn!(
            "Got block from the future, but within clock drift threshold, {timestamp} > {time_now}"
        );
    }
    Ok(())
}
