// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use super::actors::is_account_actor;
use crate::message::SignedMessage;
use crate::shim::{address::Address, state_tree::ActorState};
use thiserror::Error;

/// Reasons a signed message is rejected before execution.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MessageValidationError {
    #[error("invalid signature: {0}")]
    BadSignature(String),
    #[error("actor sequence invalid: expected {expected}, got {actual}")]
    BadNonce { expected: u64, actual: u64 },
    #[error("sender {0} is not an account actor")]
    NonAccountSender(Address),
    #[error("malformed message: {0}")]
    Malformed(String),
}

/// Checks a signed message against the current state of its sender.
pub trait SignedMessageValidator: Send + Sync {
    fn validate(
        &self,
        msg: &SignedMessage,
        from_actor: &ActorState,
    ) -> Result<(), MessageValidationError>;
}

/// Enforces signature correctness and nonce sequencing.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultMessageValidator;

impl SignedMessageValidator for DefaultMessageValidator {
    fn validate(
        &self,
        msg: &SignedMessage,
        from_actor: &ActorState,
    ) -> Result<(), MessageValidationError> {
        let message = msg.message();
        if message.version != 0 {
            return Err(MessageValidationError::Malformed(format!(
                "unsupported message version {}",
                message.version
            )));
        }
        if message.gas_limit == 0 {
            return Err(MessageValidationError::Malformed(
                "gas limit must be positive".into(),
            ));
        }
        if !is_account_actor(&from_actor.code) {
            return Err(MessageValidationError::NonAccountSender(message.from));
        }
        if message.sequence != from_actor.sequence {
            return Err(MessageValidationError::BadNonce {
                expected: from_actor.sequence,
                actual: message.sequence,
            });
        }
        msg.verify()
            .map_err(|e| MessageValidationError::BadSignature(e.to_string()))
    }
}

/// Accepts every message.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMessageValidator;

impl SignedMessageValidator for NoopMessageValidator {
    fn validate(&self, _: &SignedMessage, _: &ActorState) -> Result<(), MessageValidationError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::actors::ACCOUNT_ACTOR_CODE_ID;
    use crate::message::Message;
    use crate::shim::econ::TokenAmount;
    use crate::test_utils::Signer;
    use cid::Cid;

    fn account(sequence: u64) -> ActorState {
        ActorState::new(
            *ACCOUNT_ACTOR_CODE_ID,
            Cid::default(),
            TokenAmount::from_atto(1_000),
            sequence,
        )
    }

    #[test]
    fn accepts_well_formed_message() {
        let signer = Signer::new(1);
        let msg = signer.sign(Message::transfer(
            signer.address(),
            Address::new_id(100),
            3,
            TokenAmount::from_atto(1),
        ));
        DefaultMessageValidator.validate(&msg, &account(3)).unwrap();
    }

    #[test]
    fn rejects_wrong_nonce() {
        let signer = Signer::new(1);
        let msg = signer.sign(Message::transfer(
            signer.address(),
            Address::new_id(100),
            2,
            TokenAmount::from_atto(1),
        ));
        assert_eq!(
            DefaultMessageValidator.validate(&msg, &account(3)),
            Err(MessageValidationError::BadNonce {
                expected: 3,
                actual: 2
            })
        );
        NoopMessageValidator.validate(&msg, &account(3)).unwrap();
    }

    #[test]
    fn rejects_foreign_signature() {
        let signer = Signer::new(1);
        let other = Signer::new(2);
        let mut msg = signer.sign(Message::transfer(
            signer.address(),
            Address::new_id(100),
            0,
            TokenAmount::from_atto(1),
        ));
        msg.signature = other
            .sign(Message::transfer(
                signer.address(),
                Address::new_id(100),
                0,
                TokenAmount::from_atto(1),
            ))
            .signature;
        assert!(matches!(
            DefaultMessageValidator.validate(&msg, &account(0)),
            Err(MessageValidationError::BadSignature(_))
        ));
    }

    #[test]
    fn rejects_non_account_sender() {
        let signer = Signer::new(1);
        let msg = signer.sign(Message::transfer(
            signer.address(),
            Address::new_id(100),
            0,
            TokenAmount::from_atto(1),
        ));
        let mut actor = account(0);
        actor.code = Cid::default();
        assert_eq!(
            DefaultMessageValidator.validate(&msg, &actor),
            Err(MessageValidationError::NonAccountSender(signer.address()))
        );
    }
}
