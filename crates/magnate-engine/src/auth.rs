//! Access gate - accounts, sessions, and request authentication.
//!
//! Tokens are opaque random values bound to a user in storage; no claims to
//! verify, revocation is deletion. Password digests are blake3 over a
//! per-user random salt. Both ride on crates the rest of the node already
//! uses.

use crate::error::{Error, Result};
use crate::models::{StoredUser, User};
use crate::node::AppState;
use crate::storage::Storage;
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use rand::RngCore;
use std::sync::Arc;

fn digest_password(salt_hex: &str, password: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(salt_hex.as_bytes());
    hasher.update(password.as_bytes());
    hasher.finalize().to_hex().to_string()
}

fn random_hex(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Account and session operations over shared storage.
#[derive(Clone)]
pub struct AuthGate {
    storage: Arc<Storage>,
    /// Username that is always created as admin (bootstrap override).
    admin_username: Option<String>,
}

impl AuthGate {
    pub fn new(storage: Arc<Storage>, admin_username: Option<String>) -> Self {
        Self {
            storage,
            admin_username,
        }
    }

    /// Register an account. The first account ever created becomes admin,
    /// as does any account matching the configured admin username.
    pub fn register(&self, username: &str, password: &str) -> Result<User> {
        if username.trim().is_empty() || password.is_empty() {
            return Err(Error::Validation("Username and password are required".into()));
        }
        let salt = random_hex(16);
        let digest = digest_password(&salt, password);
        let forced_admin = self
            .admin_username
            .as_deref()
            .is_some_and(|admin| admin == username);
        let stored = self
            .storage
            .create_user(username, &salt, &digest, true, forced_admin)?;
        Ok(stored.public())
    }

    /// Log in and issue a session token.
    pub fn login(&self, username: &str, password: &str) -> Result<String> {
        let user = self
            .storage
            .find_user_by_username(username)?
            .ok_or_else(|| Error::NotFound("User not found".into()))?;
        if !verify_password(&user, password) {
            return Err(Error::Unauthorized("Invalid credentials".into()));
        }
        let token = random_hex(32);
        self.storage.put_session(&token, user.id)?;
        Ok(token)
    }

    /// Resolve a bearer token to its account.
    pub fn authenticate(&self, token: &str) -> Result<User> {
        let user_id = self
            .storage
            .get_session(token)?
            .ok_or_else(|| Error::Unauthorized("Invalid token".into()))?;
        let user = self
            .storage
            .get_user(user_id)?
            .ok_or_else(|| Error::Unauthorized("User not found".into()))?;
        Ok(user.public())
    }
}

fn verify_password(user: &StoredUser, password: &str) -> bool {
    let candidate = blake3::Hasher::new()
        .update(user.salt.as_bytes())
        .update(password.as_bytes())
        .finalize();
    // Hash comparison is constant-time; fall through to false on a corrupt
    // stored digest rather than erroring.
    match blake3::Hash::from_hex(&user.password_digest) {
        Ok(stored) => stored == candidate,
        Err(_) => false,
    }
}

/// Extractor for an authenticated caller.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| Error::Unauthorized("Not authorized".into()))?;
        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| Error::Unauthorized("Not authorized".into()))?;
        Ok(AuthUser(state.gate.authenticate(token)?))
    }
}

/// Extractor for an authenticated admin caller.
#[derive(Debug, Clone)]
pub struct AdminUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let AuthUser(user) = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_admin {
            return Err(Error::Forbidden("Admin access only".into()));
        }
        Ok(AdminUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn gate() -> (tempfile::TempDir, AuthGate) {
        let dir = tempdir().unwrap();
        let storage = Arc::new(Storage::open(dir.path()).unwrap());
        (dir, AuthGate::new(storage, None))
    }

    #[test]
    fn register_then_login() {
        let (_dir, gate) = gate();
        let user = gate.register("alice", "hunter2").unwrap();
        assert_eq!(user.username, "alice");
        assert!(user.is_admin, "first account bootstraps as admin");

        let token = gate.login("alice", "hunter2").unwrap();
        let authed = gate.authenticate(&token).unwrap();
        assert_eq!(authed.id, user.id);
    }

    #[test]
    fn duplicate_registration_is_conflict() {
        let (_dir, gate) = gate();
        gate.register("alice", "hunter2").unwrap();
        let err = gate.register("alice", "other").unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[test]
    fn empty_credentials_are_rejected() {
        let (_dir, gate) = gate();
        assert!(matches!(
            gate.register("", "pw").unwrap_err(),
            Error::Validation(_)
        ));
        assert!(matches!(
            gate.register("alice", "").unwrap_err(),
            Error::Validation(_)
        ));
    }

    #[test]
    fn wrong_password_is_unauthorized() {
        let (_dir, gate) = gate();
        gate.register("alice", "hunter2").unwrap();
        let err = gate.login("alice", "wrong").unwrap_err();
        assert!(matches!(err, Error::Unauthorized(_)));
    }

    #[test]
    fn unknown_user_is_not_found() {
        let (_dir, gate) = gate();
        let err = gate.login("nobody", "pw").unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn bogus_token_is_unauthorized() {
        let (_dir, gate) = gate();
        let err = gate.authenticate("deadbeef").unwrap_err();
        assert!(matches!(err, Error::Unauthorized(_)));
    }

    #[test]
    fn configured_admin_username_is_admin() {
        let dir = tempdir().unwrap();
        let storage = Arc::new(Storage::open(dir.path()).unwrap());
        let gate = AuthGate::new(storage, Some("overlord".into()));
        gate.register("alice", "pw").unwrap();
        let boss = gate.register("overlord", "pw").unwrap();
        assert!(boss.is_admin);
    }

    #[test]
    fn salts_differ_between_users() {
        let (_dir, gate) = gate();
        let a = digest_password("aa", "pw");
        let b = digest_password("bb", "pw");
        assert_ne!(a, b);
    }
}
