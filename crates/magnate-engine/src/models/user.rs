//! User model - account identity referenced by the ledger.

use serde::{Deserialize, Serialize};

/// Public view of an account, as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Unique identifier
    pub id: u64,

    /// Login name, unique across accounts
    pub username: String,

    /// Whether the account may mutate the catalog
    pub is_admin: bool,
}

/// Persisted account record. Carries the credential digest and is never
/// serialized out through the API; handlers convert to [`User`] first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredUser {
    pub id: u64,
    pub username: String,
    pub is_admin: bool,

    /// Random per-user salt, hex-encoded
    pub salt: String,

    /// blake3 keyed digest of the password, hex-encoded
    pub password_digest: String,
}

impl StoredUser {
    /// Storage key prefix for users.
    pub const KEY_PREFIX: &'static str = "user";

    /// Public view of this account.
    pub fn public(&self) -> User {
        User {
            id: self.id,
            username: self.username.clone(),
            is_admin: self.is_admin,
        }
    }
}
