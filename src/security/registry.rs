//! Minting, lookup, rotation, RWS, and identity creation.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use uuid::Uuid;

use crate::clock::{Clock, IdGen};
use crate::error::{Result, SubsystemError};
use crate::future::BoxFuture;
use crate::message::Message;

use super::principal::{Principal, PrincipalKind};
use super::pkr::PKR;
use super::rws::ReaderWriterSet;

const DEFAULT_PKR_VALIDITY: Duration = Duration::from_secs(3600);

/// Capability a kernel-attached instance must expose for identity creation
/// to succeed.
pub trait KernelCapability: Send + Sync {
    fn send_protected(&self, msg: &Message) -> BoxFuture<'_, Result<Value>>;
}

/// `{pkr, canRead, canWrite, canGrant, sendProtected}`.
pub struct Identity {
    pub pkr: PKR,
    pub can_read: bool,
    pub can_write: bool,
    pub can_grant: bool,
    kernel: Arc<dyn KernelCapability>,
}

impl Identity {
    pub fn require_read(&self) -> Result<()> {
        require(self.can_read, "read")
    }

    pub fn require_write(&self) -> Result<()> {
        require(self.can_write, "write")
    }

    pub fn require_grant(&self) -> Result<()> {
        require(self.can_grant, "grant")
    }

    pub async fn send_protected(&self, msg: &Message) -> Result<Value> {
        self.kernel.send_protected(msg).await
    }
}

fn require(allowed: bool, capability: &str) -> Result<()> {
    if allowed {
        Ok(())
    } else {
        Err(SubsystemError::invalid_argument(format!(
            "identity lacks `{capability}` capability"
        )))
    }
}

/// Options for [`PrincipalRegistry::create_principal`].
#[derive(Default)]
pub struct CreatePrincipalOptions {
    pub name: Option<String>,
    pub owner_pkr: Option<PKR>,
    pub instance: Option<Arc<dyn Any + Send + Sync>>,
    pub metadata: Value,
}

#[derive(Default)]
struct Indexes {
    principals: HashMap<Uuid, Arc<Principal>>,
    by_name: HashMap<String, Uuid>,
    by_public_key: HashMap<String, Uuid>,
    by_private_key: HashMap<String, Uuid>,
    public_to_private: HashMap<String, String>,
    rws_cache: HashMap<Uuid, Arc<ReaderWriterSet>>,
    kernel_id: Option<Uuid>,
}

/// Owns every [`Principal`] in a subsystem and mediates minting, rotation,
/// and RWS creation.
pub struct PrincipalRegistry {
    indexes: Mutex<Indexes>,
    rotation_locks: Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>,
    clock: Arc<dyn Clock>,
    id_gen: Arc<dyn IdGen>,
    pkr_validity: Duration,
}

impl PrincipalRegistry {
    pub fn new(clock: Arc<dyn Clock>, id_gen: Arc<dyn IdGen>) -> Arc<Self> {
        Arc::new(Self {
            indexes: Mutex::new(Indexes::default()),
            rotation_locks: Mutex::new(HashMap::new()),
            clock,
            id_gen,
            pkr_validity: DEFAULT_PKR_VALIDITY,
        })
    }

    pub fn kernel_uuid(&self) -> Option<Uuid> {
        self.indexes.lock().kernel_id
    }

    /// Returns `{publicKey}` for child/resource, `{publicKey, privateKey}`
    /// otherwise.
    fn mint(&self, kind: PrincipalKind) -> (String, Option<String>) {
        let public_key = self.id_gen.new_uuid_v4().to_string();
        let private_key = match kind {
            PrincipalKind::Child | PrincipalKind::Resource => None,
            _ => Some(self.id_gen.new_uuid_v4().to_string()),
        };
        (public_key, private_key)
    }

    pub fn create_principal(
        self: &Arc<Self>,
        kind: PrincipalKind,
        opts: CreatePrincipalOptions,
    ) -> Result<PKR> {
        {
            let idx = self.indexes.lock();
            if kind == PrincipalKind::Kernel && idx.kernel_id.is_some() {
                return Err(SubsystemError::DuplicateKernel);
            }
            if let Some(name) = &opts.name {
                if idx.by_name.contains_key(name) {
                    return Err(SubsystemError::NameConflict(name.clone()));
                }
            }
        }

        let (public_key, own_private_key) = self.mint(kind);
        let uuid = self.id_gen.new_uuid_v4();

        let private_key = match kind {
            PrincipalKind::Child | PrincipalKind::Resource => {
                let owner_pkr = opts.owner_pkr.as_ref().ok_or_else(|| {
                    SubsystemError::invalid_argument("child/resource principals require an owner PKR")
                })?;
                let idx = self.indexes.lock();
                let owner = idx
                    .principals
                    .get(&owner_pkr.uuid)
                    .ok_or_else(|| SubsystemError::UnknownPKR(owner_pkr.uuid.to_string()))?;
                idx.public_to_private.get(&owner.public_key()).cloned()
            }
            _ => own_private_key,
        };

        let minter = {
            let idx = self.indexes.lock();
            match idx.kernel_id {
                Some(kernel_id) if kind != PrincipalKind::Kernel => idx
                    .principals
                    .get(&kernel_id)
                    .and_then(|k| idx.public_to_private.get(&k.public_key()).cloned())
                    .unwrap_or_default(),
                _ => private_key.clone().unwrap_or_default(),
            }
        };

        let principal = Arc::new(Principal::new(
            uuid,
            kind,
            public_key.clone(),
            opts.name.clone(),
            opts.metadata,
            self.clock.now(),
            minter,
        ));

        if let Some(instance) = opts.instance {
            principal.attach_instance(instance)?;
        }

        {
            let mut idx = self.indexes.lock();
            idx.principals.insert(uuid, principal.clone());
            if let Some(name) = &opts.name {
                idx.by_name.insert(name.clone(), uuid);
            }
            idx.by_public_key.insert(public_key.clone(), uuid);
            if let Some(private) = &private_key {
                idx.by_private_key.entry(private.clone()).or_insert(uuid);
            }
            idx.public_to_private
                .insert(public_key, private_key.unwrap_or_default());
            if kind == PrincipalKind::Kernel {
                idx.kernel_id = Some(uuid);
            }
        }

        Ok(principal.pkr(self.clock.as_ref(), self.pkr_validity))
    }

    /// Returns the principal's current private token. The lookup uses the
    /// principal's *current* `public_key`, not `pkr`'s captured one, so this
    /// keeps working across rotations.
    pub fn resolve_pkr(&self, pkr: &PKR) -> Result<Option<String>> {
        let idx = self.indexes.lock();
        let Some(principal) = idx.principals.get(&pkr.uuid) else {
            return Ok(None);
        };
        Ok(idx.public_to_private.get(&principal.public_key()).cloned())
    }

    /// If the current PKR is not expired, returns it unchanged. Otherwise
    /// mints a fresh public key (the private token never changes), updates
    /// every index, and reconstructs the principal's identity if one was
    /// attached. Concurrent callers for the same principal share the
    /// outcome via a per-uuid lock.
    pub async fn refresh_principal(self: &Arc<Self>, uuid: Uuid) -> Result<PKR> {
        let lock = {
            let mut locks = self.rotation_locks.lock();
            locks
                .entry(uuid)
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        };
        let _guard = lock.lock().await;

        let principal = {
            let idx = self.indexes.lock();
            idx.principals
                .get(&uuid)
                .cloned()
                .ok_or_else(|| SubsystemError::UnknownPKR(uuid.to_string()))?
        };

        let current = principal.pkr(self.clock.as_ref(), self.pkr_validity);
        if !current.is_expired(self.clock.now()) {
            return Ok(current);
        }

        let old_public = principal.public_key();
        let new_public = self.id_gen.new_uuid_v4().to_string();
        let new_pkr = principal.refresh(new_public.clone(), self.clock.as_ref(), self.pkr_validity);

        {
            let mut idx = self.indexes.lock();
            let private = idx.public_to_private.remove(&old_public).unwrap_or_default();
            idx.public_to_private.insert(new_public.clone(), private);
            idx.by_public_key.remove(&old_public);
            idx.by_public_key.insert(new_public, uuid);
        }

        Ok(new_pkr)
    }

    pub fn create_identity(self: &Arc<Self>, pkr: &PKR) -> Result<Identity> {
        self.build_identity(pkr, true, true)
    }

    pub fn create_friend_identity(self: &Arc<Self>, pkr: &PKR) -> Result<Identity> {
        self.build_identity(pkr, true, false)
    }

    fn build_identity(self: &Arc<Self>, pkr: &PKR, can_read: bool, can_write: bool) -> Result<Identity> {
        let idx = self.indexes.lock();
        if !idx.principals.contains_key(&pkr.uuid) {
            return Err(SubsystemError::InvalidOrUnknownPKR(pkr.uuid.to_string()));
        }
        let kernel_id = idx.kernel_id.ok_or(SubsystemError::KernelUnavailable)?;
        let kernel = idx
            .principals
            .get(&kernel_id)
            .cloned()
            .ok_or(SubsystemError::KernelUnavailable)?;
        drop(idx);

        let instance = kernel.instance().ok_or(SubsystemError::KernelMissingSendProtected)?;
        let capability = instance
            .downcast::<ArcKernelCapability>()
            .map(|wrapper| wrapper.0.clone())
            .map_err(|_| SubsystemError::KernelMissingSendProtected)?;

        Ok(Identity {
            pkr: pkr.clone(),
            can_read,
            can_write,
            can_grant: true,
            kernel: capability,
        })
    }

    pub fn create_rws(self: &Arc<Self>, owner_pkr: PKR) -> Arc<ReaderWriterSet> {
        let mut idx = self.indexes.lock();
        if let Some(existing) = idx.rws_cache.get(&owner_pkr.uuid) {
            return existing.clone();
        }
        let rws = Arc::new(ReaderWriterSet::new(
            owner_pkr.uuid,
            owner_pkr.clone(),
            Arc::downgrade(self),
        ));
        idx.rws_cache.insert(owner_pkr.uuid, rws.clone());
        rws
    }

    pub fn get(&self, uuid: Uuid) -> Option<Arc<Principal>> {
        self.indexes.lock().principals.get(&uuid).cloned()
    }

    pub fn has(&self, id: &str) -> bool {
        let idx = self.indexes.lock();
        Uuid::parse_str(id).is_ok_and(|u| idx.principals.contains_key(&u))
            || idx.by_name.contains_key(id)
            || idx.by_public_key.contains_key(id)
            || idx.by_private_key.contains_key(id)
    }

    /// Replaces a principal's name and reconciles the `by_name` index: the
    /// old name (if any) is freed for reuse and the new one (if `Some`) is
    /// indexed. Fails with `UnknownPKR` if `uuid` isn't registered, or
    /// `NameConflict` if `name` is already taken by a different principal.
    pub fn rename_principal(&self, uuid: Uuid, name: Option<String>) -> Result<()> {
        let mut idx = self.indexes.lock();
        let principal = idx
            .principals
            .get(&uuid)
            .cloned()
            .ok_or_else(|| SubsystemError::UnknownPKR(uuid.to_string()))?;

        if let Some(new_name) = &name {
            if idx.by_name.get(new_name).is_some_and(|&owner| owner != uuid) {
                return Err(SubsystemError::NameConflict(new_name.clone()));
            }
        }

        let old_name = principal.name();
        principal.rename(name.clone());

        if let Some(old_name) = old_name {
            idx.by_name.remove(&old_name);
        }
        if let Some(new_name) = name {
            idx.by_name.insert(new_name, uuid);
        }
        Ok(())
    }

    pub fn delete(&self, uuid: Uuid) -> bool {
        let mut idx = self.indexes.lock();
        let Some(principal) = idx.principals.remove(&uuid) else {
            return false;
        };
        if let Some(name) = principal.name() {
            idx.by_name.remove(&name);
        }
        let public_key = principal.public_key();
        if let Some(private) = idx.public_to_private.remove(&public_key) {
            idx.by_private_key.retain(|_, v| *v != uuid);
            let _ = private;
        }
        idx.by_public_key.remove(&public_key);
        idx.rws_cache.remove(&uuid);
        if idx.kernel_id == Some(uuid) {
            idx.kernel_id = None;
        }
        true
    }

    pub fn clear(&self) {
        *self.indexes.lock() = Indexes::default();
    }

    pub fn size(&self) -> usize {
        self.indexes.lock().principals.len()
    }

    pub fn iter(&self) -> Vec<Arc<Principal>> {
        self.indexes.lock().principals.values().cloned().collect()
    }
}

/// Wraps a [`KernelCapability`] so it can be attached as a principal
/// instance and later recovered with `Any::downcast`.
pub struct ArcKernelCapability(pub Arc<dyn KernelCapability>);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{FixedClock, RandomIdGen, SystemClock};

    fn registry() -> Arc<PrincipalRegistry> {
        PrincipalRegistry::new(Arc::new(SystemClock), Arc::new(RandomIdGen))
    }

    #[test]
    fn create_principal_with_duplicate_name_conflicts() {
        let reg = registry();
        reg.create_principal(
            PrincipalKind::TopLevel,
            CreatePrincipalOptions {
                name: Some("alice".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        let err = reg
            .create_principal(
                PrincipalKind::TopLevel,
                CreatePrincipalOptions {
                    name: Some("alice".to_string()),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, SubsystemError::NameConflict(_)));
    }

    #[test]
    fn second_kernel_is_rejected() {
        let reg = registry();
        reg.create_principal(PrincipalKind::Kernel, CreatePrincipalOptions::default())
            .unwrap();
        let err = reg
            .create_principal(PrincipalKind::Kernel, CreatePrincipalOptions::default())
            .unwrap_err();
        assert!(matches!(err, SubsystemError::DuplicateKernel));
    }

    #[tokio::test]
    async fn resolve_pkr_is_a_no_op_before_expiry() {
        let reg = registry();
        let pkr = reg
            .create_principal(
                PrincipalKind::TopLevel,
                CreatePrincipalOptions {
                    name: Some("alice".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        let priv0 = reg.resolve_pkr(&pkr).unwrap().unwrap();

        let unchanged = reg.refresh_principal(pkr.uuid).await.unwrap();
        assert_eq!(unchanged, pkr);
        assert_eq!(reg.resolve_pkr(&unchanged).unwrap().unwrap(), priv0);
    }

    #[tokio::test]
    async fn refresh_principal_rotates_public_key_past_expiry() {
        let clock = Arc::new(FixedClock::new());
        let reg = PrincipalRegistry::new(clock.clone(), Arc::new(RandomIdGen));
        let pkr = reg
            .create_principal(
                PrincipalKind::TopLevel,
                CreatePrincipalOptions {
                    name: Some("alice".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        let priv0 = reg.resolve_pkr(&pkr).unwrap().unwrap();
        let old_public = pkr.public_key.clone();

        clock.advance(DEFAULT_PKR_VALIDITY.as_millis() as u64 + 1);

        let rotated = reg.refresh_principal(pkr.uuid).await.unwrap();
        assert_ne!(rotated.public_key, old_public);
        assert_eq!(reg.resolve_pkr(&rotated).unwrap().unwrap(), priv0);
        assert!(!reg.has(&old_public));
        assert!(reg.has(&rotated.public_key));
    }

    #[test]
    fn rename_principal_reconciles_the_name_index() {
        let reg = registry();
        let pkr = reg
            .create_principal(
                PrincipalKind::TopLevel,
                CreatePrincipalOptions {
                    name: Some("alice".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();

        reg.rename_principal(pkr.uuid, Some("alicia".to_string())).unwrap();
        assert!(!reg.has("alice"));
        assert!(reg.has("alicia"));

        reg.create_principal(
            PrincipalKind::TopLevel,
            CreatePrincipalOptions {
                name: Some("alice".to_string()),
                ..Default::default()
            },
        )
        .unwrap();

        reg.rename_principal(pkr.uuid, None).unwrap();
        assert!(!reg.has("alicia"));
        assert!(reg.has("alice"));
    }

    #[test]
    fn rename_principal_fails_for_unknown_uuid() {
        let reg = registry();
        let err = reg.rename_principal(Uuid::new_v4(), Some("nobody".to_string())).unwrap_err();
        assert!(matches!(err, SubsystemError::UnknownPKR(_)));
    }

    #[test]
    fn child_principal_inherits_owner_private_token() {
        let reg = registry();
        let owner_pkr = reg
            .create_principal(PrincipalKind::TopLevel, CreatePrincipalOptions::default())
            .unwrap();
        let owner_private = reg.resolve_pkr(&owner_pkr).unwrap().unwrap();

        let child_pkr = reg
            .create_principal(
                PrincipalKind::Child,
                CreatePrincipalOptions {
                    owner_pkr: Some(owner_pkr),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(reg.resolve_pkr(&child_pkr).unwrap().unwrap(), owner_private);
    }

    #[test]
    fn delete_clears_every_index() {
        let reg = registry();
        let pkr = reg
            .create_principal(
                PrincipalKind::TopLevel,
                CreatePrincipalOptions {
                    name: Some("bob".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(reg.delete(pkr.uuid));
        assert_eq!(reg.size(), 0);
        assert!(!reg.has("bob"));
    }
}
