//! Upgrade model - purchasable production multipliers.

use serde::{Deserialize, Serialize};

/// A catalog upgrade.
///
/// `prerequisite_id` edges form a directed graph over the catalog. In
/// practice the seeded catalog is a forest, but nothing here assumes
/// acyclicity: every check the engine performs is a single hop, so a
/// malformed (cyclic or dangling) edge degrades to "prerequisite not owned"
/// rather than misbehaving.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Upgrade {
    /// Unique identifier
    pub id: u64,

    /// Human-readable name
    pub name: String,

    /// Resource-generation multiplier granted by owning this upgrade
    pub production: f64,

    /// Listed price
    pub price: f64,

    /// Upgrade that must be owned before this one becomes purchasable
    #[serde(default)]
    pub prerequisite_id: Option<u64>,
}

impl Upgrade {
    /// Create a new upgrade without a prerequisite.
    pub fn new(id: u64, name: String, production: f64, price: f64) -> Self {
        Self {
            id,
            name,
            production,
            price,
            prerequisite_id: None,
        }
    }

    /// Attach a prerequisite edge.
    pub fn with_prerequisite(mut self, prerequisite_id: u64) -> Self {
        self.prerequisite_id = Some(prerequisite_id);
        self
    }

    /// Storage key prefix for upgrades.
    pub const KEY_PREFIX: &'static str = "upgrade";
}

/// Public purchase receipt returned by the buy protocol.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PurchasedUpgrade {
    pub upgrade_id: u64,
    pub name: String,
    pub production: f64,
    pub price: f64,
}

impl From<&Upgrade> for PurchasedUpgrade {
    fn from(upgrade: &Upgrade) -> Self {
        Self {
            upgrade_id: upgrade.id,
            name: upgrade.name.clone(),
            production: upgrade.production,
            price: upgrade.price,
        }
    }
}
