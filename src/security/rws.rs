//! Per-resource ACL with owner, readers, writers, and grant semantics.

use std::collections::HashSet;
use std::sync::Weak;

use parking_lot::Mutex;
use uuid::Uuid;

use super::pkr::PKR;
use super::registry::PrincipalRegistry;

struct State {
    readers: HashSet<Uuid>,
    writers: HashSet<Uuid>,
}

/// `{uuid, ownerPKR, readers, writers, principals}`. Invariant:
/// `readers ∩ writers = ∅` after every operation.
pub struct ReaderWriterSet {
    pub uuid: Uuid,
    pub owner: PKR,
    registry: Weak<PrincipalRegistry>,
    state: Mutex<State>,
}

impl ReaderWriterSet {
    pub fn new(uuid: Uuid, owner: PKR, registry: Weak<PrincipalRegistry>) -> Self {
        Self {
            uuid,
            owner,
            registry,
            state: Mutex::new(State {
                readers: HashSet::new(),
                writers: HashSet::new(),
            }),
        }
    }

    fn is_kernel(&self, pkr: &PKR) -> bool {
        self.registry
            .upgrade()
            .and_then(|r| r.kernel_uuid())
            .is_some_and(|kernel_uuid| kernel_uuid == pkr.uuid)
    }

    fn is_owner(&self, pkr: &PKR) -> bool {
        pkr.uuid == self.owner.uuid
    }

    pub fn is_owner_pkr(&self, pkr: &PKR) -> bool {
        self.is_owner(pkr)
    }

    /// Kernel and owner can always grant; nobody else can.
    pub fn can_grant(&self, pkr: &PKR) -> bool {
        self.is_kernel(pkr) || self.is_owner(pkr)
    }

    /// Kernel and owner always read/write; readers additionally read,
    /// writers additionally write.
    pub fn can_read(&self, pkr: &PKR) -> bool {
        if self.is_kernel(pkr) || self.is_owner(pkr) {
            return true;
        }
        self.state.lock().readers.contains(&pkr.uuid)
    }

    pub fn can_write(&self, pkr: &PKR) -> bool {
        if self.is_kernel(pkr) || self.is_owner(pkr) {
            return true;
        }
        self.state.lock().writers.contains(&pkr.uuid)
    }

    /// Adding an already-present grantee is a no-op returning `true`.
    pub fn add_reader(&self, granter: &PKR, grantee: &PKR) -> bool {
        if !self.can_grant(granter) {
            return false;
        }
        let mut state = self.state.lock();
        state.writers.remove(&grantee.uuid);
        state.readers.insert(grantee.uuid);
        true
    }

    pub fn add_writer(&self, granter: &PKR, grantee: &PKR) -> bool {
        if !self.can_grant(granter) {
            return false;
        }
        let mut state = self.state.lock();
        state.readers.remove(&grantee.uuid);
        state.writers.insert(grantee.uuid);
        true
    }

    /// Returns `true` once the operation completes, regardless of whether
    /// `grantee` was a member beforehand; only `false` when `granter` lacks
    /// `can_grant`.
    pub fn remove_reader(&self, granter: &PKR, grantee: &PKR) -> bool {
        if !self.can_grant(granter) {
            return false;
        }
        self.state.lock().readers.remove(&grantee.uuid);
        true
    }

    pub fn remove_writer(&self, granter: &PKR, grantee: &PKR) -> bool {
        if !self.can_grant(granter) {
            return false;
        }
        self.state.lock().writers.remove(&grantee.uuid);
        true
    }

    pub fn promote(&self, granter: &PKR, grantee: &PKR) -> bool {
        self.add_writer(granter, grantee)
    }

    pub fn demote(&self, granter: &PKR, grantee: &PKR) -> bool {
        self.add_reader(granter, grantee)
    }

    /// Yields an independent copy: same `uuid`, `owner`, and registry
    /// reference, but fresh `readers`/`writers` sets that mutating the
    /// clone never reflects back onto `self`.
    pub fn clone(&self) -> Self {
        let state = self.state.lock();
        Self {
            uuid: self.uuid,
            owner: self.owner.clone(),
            registry: self.registry.clone(),
            state: Mutex::new(State {
                readers: state.readers.clone(),
                writers: state.writers.clone(),
            }),
        }
    }
}
