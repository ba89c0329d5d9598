// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use super::validation::MessageValidationError;
use crate::networks::UpgradeTableError;
use crate::shim::{address::Address, econ::TokenAmount, error::ExitCode};
use cid::Cid;
use thiserror::Error;

/// The error type that gets returned by actor method calls.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("ActorError(fatal: {fatal}, exit_code: {exit_code:?}, msg: {msg})")]
pub struct ActorError {
    /// Is this a fatal error.
    fatal: bool,
    /// The exit code for this invocation, must not be `0`.
    exit_code: ExitCode,
    /// Message for debugging purposes,
    msg: String,
}

impl ActorError {
    pub fn new(exit_code: ExitCode, msg: impl Into<String>) -> Self {
        Self {
            fatal: false,
            exit_code,
            msg: msg.into(),
        }
    }

    /// An error that aborts the whole batch instead of the message, e.g. a
    /// failing block store.
    pub fn fatal(err: impl std::fmt::Display) -> Self {
        Self {
            fatal: true,
            exit_code: ExitCode::SYS_ASSERTION_FAILED,
            msg: err.to_string(),
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.fatal
    }

    pub fn exit_code(&self) -> ExitCode {
        self.exit_code
    }

    pub fn msg(&self) -> &str {
        &self.msg
    }
}

/// Convenience macro for generating non-fatal actor errors
#[macro_export]
macro_rules! actor_error {
    ( $code:ident; $msg:literal $(, $ex:expr)+ $(,)? ) => {
        $crate::interpreter::ActorError::new(
            $crate::shim::error::ExitCode::$code,
            format!($msg, $($ex,)*),
        )
    };
    ( $code:ident; $msg:literal $(,)? ) => {
        $crate::interpreter::ActorError::new($crate::shim::error::ExitCode::$code, format!($msg))
    };
    ( $code:ident; $msg:expr $(,)? ) => {
        $crate::interpreter::ActorError::new($crate::shim::error::ExitCode::$code, $msg)
    };
}

/// Why a single message did not apply. Recorded in its
/// [`ApplicationResult`](super::ApplicationResult), never aborts the batch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MessageFailure {
    #[error("sender {0} not found")]
    ActorNotFound(Address),
    #[error(transparent)]
    Invalid(#[from] MessageValidationError),
    #[error("insufficient funds: required {required}, available {available}")]
    InsufficientFunds {
        required: TokenAmount,
        available: TokenAmount,
    },
    #[error("message reverted: {0}")]
    Reverted(ActorError),
}

impl MessageFailure {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::ActorNotFound(_) => ExitCode::SYS_SENDER_INVALID,
            Self::Invalid(MessageValidationError::BadNonce { .. }) => {
                ExitCode::SYS_SENDER_STATE_INVALID
            }
            Self::Invalid(_) => ExitCode::SYS_SENDER_INVALID,
            Self::InsufficientFunds { .. } => ExitCode::SYS_INSUFFICIENT_FUNDS,
            Self::Reverted(err) => err.exit_code(),
        }
    }
}

/// Errors that make a whole batch of messages unprocessable.
#[derive(Error, Debug)]
pub enum ProcessorError {
    #[error(transparent)]
    Version(#[from] UpgradeTableError),
    #[error("fatal error applying message {cid}: {err}")]
    ActorFatal { cid: Cid, err: ActorError },
    #[error(transparent)]
    Fatal(#[from] anyhow::Error),
}
