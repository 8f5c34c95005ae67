//! Network role and the single authority-gated mutation boundary
//!
//! Every mutation of replicated character state takes an [`Authorized`]
//! proof. The only way to obtain one is [`NetRole::authorize`], so a
//! non-authoritative instance cannot reach a mutating code path at all:
//! its calls become silent no-ops instead of errors.

use tracing::trace;

/// Proof that the caller is running on the authority
#[derive(Debug, Clone, Copy)]
pub struct Authorized {
    _private: (),
}

/// What this process instance is allowed to do with a character
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetRole {
    authoritative: bool,
    locally_controlled: bool,
}

impl NetRole {
    /// Dedicated server: owns the simulation, renders nothing
    pub const fn server() -> Self {
        Self {
            authoritative: true,
            locally_controlled: false,
        }
    }

    /// Listen server whose own player is simulated and viewed here
    pub const fn host() -> Self {
        Self {
            authoritative: true,
            locally_controlled: true,
        }
    }

    /// The owning player's client: renders snapshots, plays local feedback
    pub const fn owner() -> Self {
        Self {
            authoritative: false,
            locally_controlled: true,
        }
    }

    /// Any other client
    pub const fn observer() -> Self {
        Self {
            authoritative: false,
            locally_controlled: false,
        }
    }

    pub fn is_authority(&self) -> bool {
        self.authoritative
    }

    pub fn is_locally_controlled(&self) -> bool {
        self.locally_controlled
    }

    /// Run `mutation` if this instance is the authority, otherwise ignore it
    pub fn authorize<T>(&self, operation: &'static str, mutation: impl FnOnce(Authorized) -> T) -> Option<T> {
        if self.authoritative {
            Some(mutation(Authorized { _private: () }))
        } else {
            trace!(operation, "Ignored mutation on non-authoritative instance");
            None
        }
    }
}
