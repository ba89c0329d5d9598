// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use super::ExecutableActor;
use crate::actor_error;
use crate::interpreter::{ActorError, Runtime};
use crate::message::MethodNum;
use fvm_ipld_encoding::RawBytes;

/// Singleton actor that only holds a balance. Accepts value transfers and
/// rejects every method.
pub struct SystemActor;

impl ExecutableActor for SystemActor {
    fn invoke(
        &self,
        _rt: &mut dyn Runtime,
        method: MethodNum,
        _params: &RawBytes,
    ) -> Result<RawBytes, ActorError> {
        Err(actor_error!(USR_UNHANDLED_MESSAGE; "invalid method {}", method))
    }
}
