// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

pub mod account;
pub mod init;
pub mod system;

use super::{ActorError, Runtime};
use crate::message::MethodNum;
use ahash::HashMap;
use cid::Cid;
use fvm_ipld_encoding::{IPLD_RAW, RawBytes};
use multihash_codetable::{Code, MultihashDigest as _};
use std::fmt;
use std::sync::{Arc, LazyLock};

fn make_builtin(name: &str) -> Cid {
    Cid::new_v1(IPLD_RAW, Code::Blake2b256.digest(name.as_bytes()))
}

pub static SYSTEM_ACTOR_CODE_ID: LazyLock<Cid> = LazyLock::new(|| make_builtin("fil/1/system"));
pub static INIT_ACTOR_CODE_ID: LazyLock<Cid> = LazyLock::new(|| make_builtin("fil/1/init"));
pub static ACCOUNT_ACTOR_CODE_ID: LazyLock<Cid> = LazyLock::new(|| make_builtin("fil/1/account"));
pub static REWARD_ACTOR_CODE_ID: LazyLock<Cid> = LazyLock::new(|| make_builtin("fil/1/reward"));

/// Returns true if the code belongs to an account actor.
pub fn is_account_actor(code: &Cid) -> bool {
    code == &*ACCOUNT_ACTOR_CODE_ID
}

/// Executable code of an actor, dispatched by the processor on every
/// message with a non-zero method number.
pub trait ExecutableActor: Send + Sync {
    /// Invokes method with runtime on the actor's code
    fn invoke(
        &self,
        rt: &mut dyn Runtime,
        method: MethodNum,
        params: &RawBytes,
    ) -> Result<RawBytes, ActorError>;
}

/// Maps actor code identifiers to their executable implementation.
///
/// A registry is an ordinary value owned by the processor. Callers that need
/// extra actors build a copy with [`ActorRegistry::with_actor`].
#[derive(Clone, Default)]
pub struct ActorRegistry {
    actors: HashMap<Cid, Arc<dyn ExecutableActor>>,
}

impl ActorRegistry {
    /// Registry holding the builtin actors.
    pub fn builtin() -> Self {
        let mut registry = Self::default();
        registry.register(*SYSTEM_ACTOR_CODE_ID, Arc::new(system::SystemActor));
        registry.register(*REWARD_ACTOR_CODE_ID, Arc::new(system::SystemActor));
        registry.register(*INIT_ACTOR_CODE_ID, Arc::new(init::InitActor));
        registry.register(*ACCOUNT_ACTOR_CODE_ID, Arc::new(account::AccountActor));
        registry
    }

    /// Registers `actor` under `code`, returning the implementation it replaced.
    pub fn register(
        &mut self,
        code: Cid,
        actor: Arc<dyn ExecutableActor>,
    ) -> Option<Arc<dyn ExecutableActor>> {
        self.actors.insert(code, actor)
    }

    /// Returns a copy of this registry with one more entry, leaving `self`
    /// untouched.
    pub fn with_actor(&self, code: Cid, actor: Arc<dyn ExecutableActor>) -> Self {
        let mut registry = self.clone();
        registry.register(code, actor);
        registry
    }

    pub fn get(&self, code: &Cid) -> Option<&Arc<dyn ExecutableActor>> {
        self.actors.get(code)
    }

    pub fn contains(&self, code: &Cid) -> bool {
        self.actors.contains_key(code)
    }

    pub fn len(&self) -> usize {
        self.actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }
}

impl fmt::Debug for ActorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.actors.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    impl ExecutableActor for Echo {
        fn invoke(
            &self,
            _rt: &mut dyn Runtime,
            _method: MethodNum,
            params: &RawBytes,
        ) -> Result<RawBytes, ActorError> {
            Ok(params.clone())
        }
    }

    #[test]
    fn builtin_code_ids_are_distinct() {
        let registry = ActorRegistry::builtin();
        assert_eq!(registry.len(), 4);
        assert_ne!(*ACCOUNT_ACTOR_CODE_ID, *INIT_ACTOR_CODE_ID);
        assert!(is_account_actor(&ACCOUNT_ACTOR_CODE_ID));
        assert!(!is_account_actor(&SYSTEM_ACTOR_CODE_ID));
    }

    #[test]
    fn scoped_copy_leaves_original_untouched() {
        let registry = ActorRegistry::builtin();
        let code = make_builtin("test/echo");
        let scoped = registry.with_actor(code, Arc::new(Echo));
        assert!(scoped.contains(&code));
        assert!(!registry.contains(&code));
        assert_eq!(scoped.len(), registry.len() + 1);
    }
}
