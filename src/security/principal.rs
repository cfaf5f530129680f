//! A named security subject.

use std::any::Any;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use uuid::Uuid;

use crate::clock::{Clock, MonotonicInstant};
use crate::error::{Result, SubsystemError};

use super::pkr::PKR;

/// The closed set of principal kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrincipalKind {
    Kernel,
    TopLevel,
    Child,
    Friend,
    Resource,
}

impl PrincipalKind {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "kernel" => Ok(Self::Kernel),
            "topLevel" => Ok(Self::TopLevel),
            "child" => Ok(Self::Child),
            "friend" => Ok(Self::Friend),
            "resource" => Ok(Self::Resource),
            other => Err(SubsystemError::InvalidKind(other.to_string())),
        }
    }
}

struct MutableState {
    public_key: String,
    name: Option<String>,
    pkr_cache: Option<PKR>,
    instance: Option<Arc<dyn Any + Send + Sync>>,
}

/// `{uuid, kind, publicKey, name, metadata, createdAt, instance?}`.
pub struct Principal {
    pub uuid: Uuid,
    pub kind: PrincipalKind,
    pub metadata: Value,
    pub created_at: MonotonicInstant,
    /// The kernel's private token at the time this principal was minted;
    /// carried into every PKR this principal issues.
    pub minter: String,
    state: Mutex<MutableState>,
}

impl Principal {
    pub fn new(
        uuid: Uuid,
        kind: PrincipalKind,
        public_key: String,
        name: Option<String>,
        metadata: Value,
        created_at: MonotonicInstant,
        minter: String,
    ) -> Self {
        Self {
            uuid,
            kind,
            metadata,
            created_at,
            minter,
            state: Mutex::new(MutableState {
                public_key,
                name,
                pkr_cache: None,
                instance: None,
            }),
        }
    }

    pub fn public_key(&self) -> String {
        self.state.lock().public_key.clone()
    }

    pub fn name(&self) -> Option<String> {
        self.state.lock().name.clone()
    }

    pub fn rename(&self, name: Option<String>) {
        self.state.lock().name = name;
    }

    /// Binds `instance` once; a second call fails with `AlreadyAttached`.
    pub fn attach_instance(&self, instance: Arc<dyn Any + Send + Sync>) -> Result<()> {
        let mut state = self.state.lock();
        if state.instance.is_some() {
            return Err(SubsystemError::AlreadyAttached(self.uuid.to_string()));
        }
        state.instance = Some(instance);
        Ok(())
    }

    pub fn instance(&self) -> Option<Arc<dyn Any + Send + Sync>> {
        self.state.lock().instance.clone()
    }

    /// Lazily creates and caches the current PKR.
    pub fn pkr(&self, clock: &dyn Clock, validity: std::time::Duration) -> PKR {
        let mut state = self.state.lock();
        if let Some(cached) = &state.pkr_cache {
            return cached.clone();
        }
        let now = clock.now();
        let pkr = PKR {
            uuid: self.uuid,
            kind: self.kind,
            name: state.name.clone(),
            public_key: state.public_key.clone(),
            minter: self.minter.clone(),
            not_before: now,
            not_after: now.checked_add(validity).unwrap_or(now),
        };
        state.pkr_cache = Some(pkr.clone());
        pkr
    }

    /// Replaces `public_key`, invalidates the cached PKR, and returns the
    /// freshly minted one.
    pub fn refresh(&self, new_public_key: String, clock: &dyn Clock, validity: std::time::Duration) -> PKR {
        {
            let mut state = self.state.lock();
            state.public_key = new_public_key;
            state.pkr_cache = None;
        }
        self.pkr(clock, validity)
    }
}
