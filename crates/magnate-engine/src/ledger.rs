//! Ownership ledger - per-user holdings over the catalog.
//!
//! The ledger is the only shared mutable state in the system. Absence of a
//! resource link is the zero state, never an error; upgrade ownership is
//! existence of a link and is monotonic (nothing here revokes it).

use crate::error::{Error, Result};
use crate::models::Upgrade;
use crate::storage::Storage;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A user's holding of one resource, joined with its catalog fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceHolding {
    pub resource_id: u64,
    pub name: String,
    pub price: f64,
    pub amount: f64,
}

/// Ledger operations over shared storage.
#[derive(Clone)]
pub struct Ledger {
    storage: Arc<Storage>,
}

impl Ledger {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }

    /// Amount of a resource held by a user. No link means zero.
    pub fn resource_amount(&self, user_id: u64, resource_id: u64) -> Result<f64> {
        Ok(self
            .storage
            .get_resource_link(user_id, resource_id)?
            .map(|link| link.amount)
            .unwrap_or(0.0))
    }

    /// The user's holding joined with catalog fields, if a link exists.
    pub fn holding(&self, user_id: u64, resource_id: u64) -> Result<Option<ResourceHolding>> {
        let Some(link) = self.storage.get_resource_link(user_id, resource_id)? else {
            return Ok(None);
        };
        let resource = self
            .storage
            .get_resource(resource_id)?
            .ok_or_else(|| Error::NotFound("Resource not found".into()))?;
        Ok(Some(ResourceHolding {
            resource_id,
            name: resource.name,
            price: resource.price,
            amount: link.amount,
        }))
    }

    /// Create a link with an initial amount. Fails `Conflict` if the pair is
    /// already linked and `NotFound` if the resource is not in the catalog.
    pub fn create_resource_link(
        &self,
        user_id: u64,
        resource_id: u64,
        amount: f64,
    ) -> Result<ResourceHolding> {
        if amount < 0.0 {
            return Err(Error::Validation("Amount cannot be negative".into()));
        }
        let resource = self
            .storage
            .get_resource(resource_id)?
            .ok_or_else(|| Error::NotFound("Resource not found".into()))?;
        if !self
            .storage
            .insert_resource_link_if_absent(user_id, resource_id, amount)?
        {
            return Err(Error::Conflict("Resource already linked to user".into()));
        }
        Ok(ResourceHolding {
            resource_id,
            name: resource.name,
            price: resource.price,
            amount,
        })
    }

    /// Set the amount for a (user, resource) pair, creating the link when
    /// absent. Only a resource missing from the catalog is an error.
    pub fn set_resource_amount(
        &self,
        user_id: u64,
        resource_id: u64,
        amount: f64,
    ) -> Result<ResourceHolding> {
        if amount < 0.0 {
            return Err(Error::Validation("Amount cannot be negative".into()));
        }
        let resource = self
            .storage
            .get_resource(resource_id)?
            .ok_or_else(|| Error::NotFound("Resource not found".into()))?;
        // Create-or-overwrite collapse to one write under a keyed store.
        self.storage
            .put_resource_link(user_id, resource_id, amount)?;
        Ok(ResourceHolding {
            resource_id,
            name: resource.name,
            price: resource.price,
            amount,
        })
    }

    /// Ensure a zero-amount link exists for every catalog resource.
    ///
    /// Idempotent: insert-if-absent per item, so a re-run never resets
    /// amounts written between calls, and pre-existing links never abort the
    /// rest of the batch. Returns the user's full holding set.
    pub fn init_resources(&self, user_id: u64) -> Result<Vec<ResourceHolding>> {
        for resource in self.storage.list_resources()? {
            self.storage
                .insert_resource_link_if_absent(user_id, resource.id, 0.0)?;
        }
        self.holdings(user_id)
    }

    /// All of the user's holdings joined with catalog fields, sorted by
    /// resource name. Links whose resource was deleted out from under them
    /// are skipped rather than surfaced as errors.
    pub fn holdings(&self, user_id: u64) -> Result<Vec<ResourceHolding>> {
        let mut holdings = Vec::new();
        for link in self.storage.user_resource_links(user_id)? {
            if let Some(resource) = self.storage.get_resource(link.resource_id)? {
                holdings.push(ResourceHolding {
                    resource_id: link.resource_id,
                    name: resource.name,
                    price: resource.price,
                    amount: link.amount,
                });
            }
        }
        holdings.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(holdings)
    }

    /// Whether the user owns the upgrade.
    pub fn owns_upgrade(&self, user_id: u64, upgrade_id: u64) -> Result<bool> {
        self.storage.owns_upgrade(user_id, upgrade_id)
    }

    /// Grant an upgrade. `NotFound` for an unknown catalog id, `Conflict`
    /// if already owned; the insert is a compare-and-insert, so of any
    /// concurrent grants for one pair exactly one succeeds.
    pub fn grant_upgrade(&self, user_id: u64, upgrade_id: u64) -> Result<Upgrade> {
        let upgrade = self
            .storage
            .get_upgrade(upgrade_id)?
            .ok_or_else(|| Error::NotFound("Upgrade not found".into()))?;
        if !self
            .storage
            .insert_upgrade_link_if_absent(user_id, upgrade_id)?
        {
            return Err(Error::Conflict("Upgrade already owned".into()));
        }
        Ok(upgrade)
    }

    /// Bulk-grant every catalog upgrade, skipping owned ones. Duplicates in
    /// the batch never abort the rest. Returns the user's owned id set.
    pub fn init_upgrades(&self, user_id: u64) -> Result<Vec<u64>> {
        for upgrade in self.storage.list_upgrades()? {
            self.storage
                .insert_upgrade_link_if_absent(user_id, upgrade.id)?;
        }
        self.storage.user_upgrade_ids(user_id)
    }
}
