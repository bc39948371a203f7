//! Link records - per-user ownership rows joining accounts to the catalog.

use serde::{Deserialize, Serialize};

/// A (user, resource) holding. At most one link exists per pair; absence of
/// a link means the user holds zero of that resource.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserResourceLink {
    pub user_id: u64,
    pub resource_id: u64,
    pub amount: f64,
}

impl UserResourceLink {
    /// Storage key prefix for user-resource links.
    pub const KEY_PREFIX: &'static str = "ures";
}

/// A (user, upgrade) ownership record. Existence is ownership; there is no
/// payload and the engine never revokes a granted upgrade.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserUpgradeLink {
    pub user_id: u64,
    pub upgrade_id: u64,
}

impl UserUpgradeLink {
    /// Storage key prefix for user-upgrade links.
    pub const KEY_PREFIX: &'static str = "uupg";
}
