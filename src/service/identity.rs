use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use super::Authorizer;
use crate::auth::{IssuedToken, PasswordHashService, TokenIssuer, validate_password};
use crate::error::{Error, Result};
use crate::store::Store;
use crate::types::{AccountType, PermissionName, User};

const MAX_LOGIN_LEN: usize = 64;
const MAX_MAIL_LEN: usize = 254;

#[derive(Debug, Clone)]
pub struct NewAccount {
    pub login: String,
    pub mail: String,
    pub password: String,
    pub display_name: String,
    pub account_type: AccountType,
    pub role_id: Option<String>,
    pub group_id: Option<String>,
}

/// Partial user update. Double options distinguish "leave alone" from "clear".
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub mail: Option<String>,
    pub display_name: Option<String>,
    pub password: Option<String>,
    pub role_id: Option<Option<String>>,
    pub group_id: Option<Option<String>>,
}

impl UserUpdate {
    fn touches_assignment(&self) -> bool {
        self.role_id.is_some() || self.group_id.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub token: IssuedToken,
    pub user: User,
    pub permissions: Vec<String>,
}

/// Accounts, credentials, and session issuance.
pub struct IdentityService {
    store: Arc<dyn Store>,
    authz: Authorizer,
    hasher: PasswordHashService,
    tokens: Arc<TokenIssuer>,
}

fn validate_login(login: &str) -> Result<()> {
    if login.is_empty() {
        return Err(Error::BadRequest("login cannot be empty".to_string()));
    }
    if login.len() > MAX_LOGIN_LEN {
        return Err(Error::BadRequest(format!(
            "login cannot exceed {MAX_LOGIN_LEN} characters"
        )));
    }
    if login.contains(char::is_whitespace) {
        return Err(Error::BadRequest(
            "login cannot contain whitespace".to_string(),
        ));
    }
    Ok(())
}

fn validate_mail(mail: &str) -> Result<()> {
    let valid = mail.len() <= MAX_MAIL_LEN
        && !mail.contains(char::is_whitespace)
        && mail
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if !valid {
        return Err(Error::BadRequest(format!("invalid mail address '{mail}'")));
    }
    Ok(())
}

impl IdentityService {
    pub fn new(store: Arc<dyn Store>, authz: Authorizer, tokens: Arc<TokenIssuer>) -> Self {
        Self {
            store,
            authz,
            hasher: PasswordHashService::new(),
            tokens,
        }
    }

    fn check_assignment(&self, role_id: Option<&str>, group_id: Option<&str>) -> Result<()> {
        if let Some(role_id) = role_id {
            if self.store.get_role(role_id)?.is_none() {
                return Err(Error::NotFound("role"));
            }
        }
        if let Some(group_id) = group_id {
            if self.store.get_group(group_id)?.is_none() {
                return Err(Error::NotFound("group"));
            }
        }
        Ok(())
    }

    /// Creates an account without any authorization check. Used by open
    /// registration and by the bootstrap CLI.
    pub fn create_account(&self, account: NewAccount) -> Result<User> {
        let login = account.login.trim().to_string();
        let mail = account.mail.trim().to_string();
        validate_login(&login)?;
        validate_mail(&mail)?;
        validate_password(&account.password)?;
        self.check_assignment(account.role_id.as_deref(), account.group_id.as_deref())?;

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4().to_string(),
            display_name: if account.display_name.trim().is_empty() {
                login.clone()
            } else {
                account.display_name.trim().to_string()
            },
            login,
            mail,
            password_hash: self.hasher.hash(&account.password)?,
            account_type: account.account_type,
            role_id: account.role_id,
            group_id: account.group_id,
            created_at: now,
            updated_at: now,
        };
        self.store.create_user(&user)?;

        tracing::info!("Created {} account {} ({})", user.account_type, user.login, user.id);
        Ok(user)
    }

    /// Self-service registration. Always yields a plain user account.
    pub fn register(
        &self,
        login: &str,
        mail: &str,
        password: &str,
        display_name: &str,
    ) -> Result<User> {
        self.create_account(NewAccount {
            login: login.to_string(),
            mail: mail.to_string(),
            password: password.to_string(),
            display_name: display_name.to_string(),
            account_type: AccountType::User,
            role_id: None,
            group_id: None,
        })
    }

    pub fn create_user(&self, actor: &User, account: NewAccount) -> Result<User> {
        self.authz.require(&actor.id, PermissionName::MANAGE_USERS)?;
        self.create_account(account)
    }

    pub fn login(&self, login: &str, password: &str) -> Result<LoginOutcome> {
        let user = self
            .store
            .get_user_by_login(login.trim())?
            .ok_or(Error::Unauthorized)?;

        if !self.hasher.verify(password, &user.password_hash)? {
            tracing::debug!("Failed login for {}", user.login);
            return Err(Error::Unauthorized);
        }

        let permissions = self.authz.effective_permissions(&user)?;
        let token = self.tokens.issue(&user, permissions.clone())?;

        tracing::info!("User {} logged in", user.login);
        Ok(LoginOutcome {
            token,
            user,
            permissions,
        })
    }

    pub fn permissions_of(&self, user: &User) -> Result<Vec<String>> {
        self.authz.effective_permissions(user)
    }

    pub fn get_user(&self, actor: &User, id: &str) -> Result<User> {
        if actor.id != id {
            self.authz.require(&actor.id, PermissionName::MANAGE_USERS)?;
        }
        self.store.get_user(id)?.ok_or(Error::NotFound("user"))
    }

    pub fn list_users(
        &self,
        actor: &User,
        group_id: Option<&str>,
        cursor: &str,
        limit: i32,
    ) -> Result<Vec<User>> {
        self.authz.require(&actor.id, PermissionName::MANAGE_USERS)?;
        self.store.list_users(group_id, cursor, limit)
    }

    /// Profile fields are self-service. Role and group assignment, and any
    /// change to another account, need `manage_users`.
    pub fn update_user(&self, actor: &User, id: &str, update: UserUpdate) -> Result<User> {
        if actor.id != id || update.touches_assignment() {
            self.authz.require(&actor.id, PermissionName::MANAGE_USERS)?;
        }

        let mut user = self.store.get_user(id)?.ok_or(Error::NotFound("user"))?;

        if let Some(mail) = update.mail {
            let mail = mail.trim().to_string();
            validate_mail(&mail)?;
            user.mail = mail;
        }
        if let Some(display_name) = update.display_name {
            user.display_name = display_name.trim().to_string();
        }
        if let Some(password) = update.password {
            validate_password(&password)?;
            user.password_hash = self.hasher.hash(&password)?;
        }
        if let Some(role_id) = update.role_id {
            self.check_assignment(role_id.as_deref(), None)?;
            user.role_id = role_id;
        }
        if let Some(group_id) = update.group_id {
            self.check_assignment(None, group_id.as_deref())?;
            user.group_id = group_id;
        }
        user.updated_at = Utc::now();

        self.store.update_user(&user)?;
        Ok(user)
    }

    /// Refused with `Conflict` while the user still owns files.
    pub fn delete_user(&self, actor: &User, id: &str) -> Result<()> {
        self.authz.require(&actor.id, PermissionName::MANAGE_USERS)?;
        if actor.id == id {
            return Err(Error::BadRequest("cannot delete your own account".to_string()));
        }
        if !self.store.delete_user(id)? {
            return Err(Error::NotFound("user"));
        }
        tracing::info!("Deleted user {id}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::generate_secret;
    use crate::service::test_support::{admin, store_with_role};

    fn service(store: Arc<dyn Store>) -> IdentityService {
        let tokens = Arc::new(TokenIssuer::new(&generate_secret(), 3600).unwrap());
        IdentityService::new(store.clone(), Authorizer::new(store), tokens)
    }

    #[test]
    fn test_register_then_login() {
        let store = store_with_role(&[]);
        let identity = service(store);

        let user = identity
            .register("alice", "alice@example.com", "s3cret-pass", "")
            .unwrap();
        assert_eq!(user.display_name, "alice");
        assert_eq!(user.account_type, AccountType::User);
        assert!(user.password_hash.starts_with("$argon2id$"));

        let outcome = identity.login("alice", "s3cret-pass").unwrap();
        assert_eq!(outcome.user.id, user.id);
        assert!(outcome.permissions.is_empty());
        assert!(!outcome.token.token.is_empty());

        assert!(matches!(
            identity.login("alice", "wrong-pass"),
            Err(Error::Unauthorized)
        ));
        assert!(matches!(
            identity.login("nobody", "s3cret-pass"),
            Err(Error::Unauthorized)
        ));
    }

    #[test]
    fn test_register_validates_and_rejects_duplicates() {
        let store = store_with_role(&[]);
        let identity = service(store);

        assert!(matches!(
            identity.register("bob", "not-a-mail", "s3cret-pass", ""),
            Err(Error::BadRequest(_))
        ));
        assert!(matches!(
            identity.register("bob", "bob@example.com", "short", ""),
            Err(Error::BadRequest(_))
        ));
        assert!(matches!(
            identity.register("b o b", "bob@example.com", "s3cret-pass", ""),
            Err(Error::BadRequest(_))
        ));

        identity
            .register("bob", "bob@example.com", "s3cret-pass", "")
            .unwrap();
        assert!(matches!(
            identity.register("bob", "other@example.com", "s3cret-pass", ""),
            Err(Error::Conflict(_))
        ));
    }

    #[test]
    fn test_self_update_cannot_change_role() {
        let store = store_with_role(&[]);
        let identity = service(store);
        let user = identity
            .register("carol", "carol@example.com", "s3cret-pass", "")
            .unwrap();

        let renamed = identity
            .update_user(
                &user,
                &user.id,
                UserUpdate {
                    display_name: Some("Carol C.".to_string()),
                    ..UserUpdate::default()
                },
            )
            .unwrap();
        assert_eq!(renamed.display_name, "Carol C.");

        let escalate = identity.update_user(
            &user,
            &user.id,
            UserUpdate {
                role_id: Some(Some("role-1".to_string())),
                ..UserUpdate::default()
            },
        );
        assert!(matches!(escalate, Err(Error::Forbidden(_))));
    }

    #[test]
    fn test_admin_manages_users() {
        let store = store_with_role(&[]);
        let root = admin(&*store, "root");
        let identity = service(store);
        let user = identity
            .register("dave", "dave@example.com", "s3cret-pass", "")
            .unwrap();

        let updated = identity
            .update_user(
                &root,
                &user.id,
                UserUpdate {
                    role_id: Some(Some("role-1".to_string())),
                    ..UserUpdate::default()
                },
            )
            .unwrap();
        assert_eq!(updated.role_id.as_deref(), Some("role-1"));

        assert!(matches!(
            identity.update_user(
                &root,
                &user.id,
                UserUpdate {
                    group_id: Some(Some("ghost".to_string())),
                    ..UserUpdate::default()
                },
            ),
            Err(Error::NotFound("group"))
        ));

        assert!(matches!(
            identity.get_user(&user, &root.id),
            Err(Error::Forbidden(_))
        ));
        assert_eq!(identity.get_user(&root, &user.id).unwrap().login, "dave");

        identity.delete_user(&root, &user.id).unwrap();
        assert!(matches!(
            identity.delete_user(&root, &user.id),
            Err(Error::NotFound("user"))
        ));
    }
}
