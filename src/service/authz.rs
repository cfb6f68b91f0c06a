use std::sync::Arc;

use crate::error::{Error, Result};
use crate::store::Store;
use crate::types::{AccountType, PermissionName, User};

/// Answers global permission checks against role grants.
#[derive(Clone)]
pub struct Authorizer {
    store: Arc<dyn Store>,
}

impl Authorizer {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Admin accounts hold every permission, including names outside the
    /// seeded catalog. Everyone else needs a role that grants the name.
    pub fn authorize(&self, principal_id: &str, permission: &str) -> Result<bool> {
        let principal = self
            .store
            .get_user(principal_id)?
            .ok_or(Error::PrincipalNotFound)?;

        if principal.account_type == AccountType::Admin {
            return Ok(true);
        }

        self.store.user_has_permission(principal_id, permission)
    }

    pub fn require(&self, principal_id: &str, permission: &str) -> Result<()> {
        if self.authorize(principal_id, permission)? {
            Ok(())
        } else {
            tracing::debug!("Principal {principal_id} lacks permission {permission}");
            Err(Error::Forbidden("missing required permission"))
        }
    }

    /// Permission names to snapshot into a session token.
    pub fn effective_permissions(&self, user: &User) -> Result<Vec<String>> {
        if user.is_admin() {
            return Ok(PermissionName::CATALOG
                .iter()
                .map(|(name, _)| (*name).to_string())
                .collect());
        }
        self.store.list_user_permissions(&user.id)
    }
}
