//! Public Key Record: an immutable, signed-by-construction view of a
//! principal.

use uuid::Uuid;

use crate::clock::MonotonicInstant;

use super::principal::PrincipalKind;

/// `{uuid, kind, name, publicKey, minter, notBefore, notAfter}`.
/// Rotated by creating a new PKR; older PKRs stop being authoritative but
/// still identify the principal for lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PKR {
    pub uuid: Uuid,
    pub kind: PrincipalKind,
    pub name: Option<String>,
    pub public_key: String,
    /// The kernel's private token at minting time; identifies who signed
    /// this record into existence.
    pub minter: String,
    pub not_before: MonotonicInstant,
    pub not_after: MonotonicInstant,
}

impl PKR {
    pub fn is_minter(&self, kernel_private_token: &str) -> bool {
        self.minter == kernel_private_token
    }

    pub fn is_expired(&self, now: MonotonicInstant) -> bool {
        now >= self.not_after
    }
}
