//! Resource model - a typed currency in the game economy.

use serde::{Deserialize, Serialize};

/// A catalog resource definition.
///
/// Resources are immutable per catalog version: players never change them,
/// only administrators do. Player holdings live in per-user links, not here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Resource {
    /// Unique identifier
    pub id: u64,

    /// Human-readable name, unique across the catalog
    pub name: String,

    /// Unit price used for valuation
    pub price: f64,
}

impl Resource {
    /// Create a new resource.
    pub fn new(id: u64, name: String, price: f64) -> Self {
        Self { id, name, price }
    }

    /// Storage key prefix for resources.
    pub const KEY_PREFIX: &'static str = "resource";
}
