// src/identity.rs
use std::sync::RwLock;

use crate::models::file::Principal;

/// Yields the signed-in caller, or `None` while signed out.
pub trait IdentityProvider: Send + Sync {
    fn current(&self) -> Option<Principal>;
}

/// Identity fixed at startup.
#[derive(Debug, Default)]
pub struct StaticIdentity {
    principal: RwLock<Option<Principal>>,
}

impl StaticIdentity {
    pub fn new(principal: Option<Principal>) -> Self {
        Self {
            principal: RwLock::new(principal.filter(|p| !p.is_anonymous())),
        }
    }

    #[cfg(test)]
    pub fn sign_in(&self, principal: Principal) {
        *self.principal.write().unwrap_or_else(|e| e.into_inner()) = Some(principal);
    }

    #[cfg(test)]
    pub fn sign_out(&self) {
        *self.principal.write().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

impl IdentityProvider for StaticIdentity {
    fn current(&self) -> Option<Principal> {
        self.principal.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}
