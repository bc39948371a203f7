//! Progression engine - purchase validation and catalog queries.
//!
//! The engine only reads the catalog; catalog mutation is a separate
//! admin capability on the storage layer.

use crate::error::{Error, Result};
use crate::ledger::Ledger;
use crate::models::{PurchasedUpgrade, Upgrade};
use crate::storage::Storage;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

/// Sort field for upgrade listings.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortField {
    #[default]
    Name,
    Price,
    Production,
    Id,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// Query parameters for the upgrade listing.
///
/// `limit == 0` disables pagination entirely: every matching upgrade is
/// returned and the pagination block is null.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpgradeQuery {
    pub min_production: Option<f64>,
    pub max_production: Option<f64>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    /// Case-insensitive substring match on the name
    pub name: Option<String>,
    /// Tri-state: Some(true) owned only, Some(false) unowned only, None all
    pub owned: Option<bool>,
    pub sort: Option<SortField>,
    pub order: Option<SortOrder>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

/// Pagination block reported alongside a paged listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: u64,
    pub total_pages: u64,
    pub total_items: u64,
    pub items_per_page: u64,
}

/// A filtered, sorted, optionally paginated upgrade listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpgradePage {
    pub upgrades: Vec<Upgrade>,
    pub pagination: Option<Pagination>,
}

/// Next-step suggestions derived from the prerequisite relation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextUpgrades {
    /// First unowned upgrade (name order) whose prerequisite is absent or owned
    pub next_available: Option<Upgrade>,
    /// First unowned upgrade (name order) whose prerequisite is not owned
    pub next_locked: Option<Upgrade>,
}

/// Purchase and query logic over the catalog and ledger.
#[derive(Clone)]
pub struct Engine {
    storage: Arc<Storage>,
    ledger: Ledger,
}

impl Engine {
    pub fn new(storage: Arc<Storage>) -> Self {
        let ledger = Ledger::new(Arc::clone(&storage));
        Self { storage, ledger }
    }

    /// Buy an upgrade for a user.
    ///
    /// Succeeds iff the upgrade exists, is not already owned, and its
    /// prerequisite (if any) is owned. A prerequisite id pointing at a
    /// deleted upgrade can never be owned, so it fails the same way an
    /// unowned one does. The grant is a compare-and-insert, so two
    /// concurrent purchases of the same upgrade produce one success and one
    /// `Conflict`.
    ///
    /// Purchase does not debit any resource balance; the listed price is
    /// informational at this layer.
    pub fn buy_upgrade(&self, user_id: u64, upgrade_id: u64) -> Result<PurchasedUpgrade> {
        let upgrade = self
            .storage
            .get_upgrade(upgrade_id)?
            .ok_or_else(|| Error::NotFound("Upgrade not found".into()))?;

        if self.ledger.owns_upgrade(user_id, upgrade_id)? {
            return Err(Error::Conflict("Upgrade already owned".into()));
        }

        if let Some(prerequisite_id) = upgrade.prerequisite_id {
            if !self.ledger.owns_upgrade(user_id, prerequisite_id)? {
                return Err(Error::PreconditionFailed(
                    "Prerequisites not met for this upgrade".into(),
                ));
            }
        }

        // The grant can still lose to a concurrent buyer; surface that as
        // the same Conflict the ownership check above produces.
        let granted = self.ledger.grant_upgrade(user_id, upgrade_id)?;
        Ok(PurchasedUpgrade::from(&granted))
    }

    /// First available and first locked upgrades for a user, scanning the
    /// name-sorted catalog. The two scans are independent; either may come
    /// up empty.
    pub fn next_upgrades(&self, user_id: u64) -> Result<NextUpgrades> {
        let catalog = self.storage.list_upgrades()?;
        let owned: HashSet<u64> = self.storage.user_upgrade_ids(user_id)?.into_iter().collect();

        let next_available = catalog
            .iter()
            .find(|u| {
                !owned.contains(&u.id)
                    && u.prerequisite_id.map_or(true, |p| owned.contains(&p))
            })
            .cloned();

        let next_locked = catalog
            .iter()
            .find(|u| {
                !owned.contains(&u.id)
                    && u.prerequisite_id.is_some_and(|p| !owned.contains(&p))
            })
            .cloned();

        Ok(NextUpgrades {
            next_available,
            next_locked,
        })
    }

    /// Filtered, sorted, paginated upgrade listing.
    ///
    /// `total_items`/`total_pages` are computed against the post-filter,
    /// pre-pagination set.
    pub fn list_upgrades(&self, user_id: u64, query: &UpgradeQuery) -> Result<UpgradePage> {
        let mut upgrades = self.storage.list_upgrades()?;

        if let Some(min) = query.min_production {
            upgrades.retain(|u| u.production >= min);
        }
        if let Some(max) = query.max_production {
            upgrades.retain(|u| u.production <= max);
        }
        if let Some(min) = query.min_price {
            upgrades.retain(|u| u.price >= min);
        }
        if let Some(max) = query.max_price {
            upgrades.retain(|u| u.price <= max);
        }
        if let Some(needle) = &query.name {
            let needle = needle.to_lowercase();
            upgrades.retain(|u| u.name.to_lowercase().contains(&needle));
        }
        if let Some(owned_filter) = query.owned {
            let owned: HashSet<u64> =
                self.storage.user_upgrade_ids(user_id)?.into_iter().collect();
            upgrades.retain(|u| owned.contains(&u.id) == owned_filter);
        }

        let field = query.sort.unwrap_or_default();
        let order = query.order.unwrap_or_default();
        upgrades.sort_by(|a, b| {
            let cmp = match field {
                SortField::Name => a.name.cmp(&b.name),
                SortField::Id => a.id.cmp(&b.id),
                SortField::Price => a
                    .price
                    .partial_cmp(&b.price)
                    .unwrap_or(Ordering::Equal),
                SortField::Production => a
                    .production
                    .partial_cmp(&b.production)
                    .unwrap_or(Ordering::Equal),
            };
            let cmp = match order {
                SortOrder::Asc => cmp,
                SortOrder::Desc => cmp.reverse(),
            };
            // Id tie-break stays ascending in either direction.
            cmp.then(a.id.cmp(&b.id))
        });

        let limit = query.limit.unwrap_or(0);
        if limit == 0 {
            return Ok(UpgradePage {
                upgrades,
                pagination: None,
            });
        }

        let total_items = upgrades.len() as u64;
        let total_pages = total_items.div_ceil(limit);
        let page = query.page.unwrap_or(1).max(1);
        // Query values are caller-supplied; the offset must not overflow.
        let offset = page.saturating_sub(1).saturating_mul(limit);
        let upgrades = upgrades
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();

        Ok(UpgradePage {
            upgrades,
            pagination: Some(Pagination {
                current_page: page,
                total_pages,
                total_items,
                items_per_page: limit,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn engine_with_chain() -> (tempfile::TempDir, Arc<Storage>, Engine) {
        let dir = tempdir().unwrap();
        let storage = Arc::new(Storage::open(dir.path()).unwrap());
        storage
            .create_upgrade(Some(1), "Speed Boost I", 2.0, 500.0, None)
            .unwrap();
        storage
            .create_upgrade(Some(2), "Speed Boost II", 4.0, 1000.0, Some(1))
            .unwrap();
        let engine = Engine::new(Arc::clone(&storage));
        (dir, storage, engine)
    }

    #[test]
    fn buy_unknown_upgrade_is_not_found() {
        let (_dir, _storage, engine) = engine_with_chain();
        let err = engine.buy_upgrade(1, 999).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn buy_without_prerequisite_fails_precondition() {
        let (_dir, _storage, engine) = engine_with_chain();
        let err = engine.buy_upgrade(1, 2).unwrap_err();
        assert!(matches!(err, Error::PreconditionFailed(_)));
    }

    #[test]
    fn buy_twice_is_conflict() {
        let (_dir, _storage, engine) = engine_with_chain();
        let receipt = engine.buy_upgrade(1, 1).unwrap();
        assert_eq!(receipt.upgrade_id, 1);
        assert_eq!(receipt.name, "Speed Boost I");
        let err = engine.buy_upgrade(1, 1).unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[test]
    fn prerequisite_chain_unlocks_in_order() {
        let (_dir, _storage, engine) = engine_with_chain();
        engine.buy_upgrade(1, 1).unwrap();
        let receipt = engine.buy_upgrade(1, 2).unwrap();
        assert_eq!(receipt.upgrade_id, 2);
    }

    #[test]
    fn dangling_prerequisite_is_precondition_failed() {
        let (_dir, storage, engine) = engine_with_chain();
        storage
            .create_upgrade(Some(3), "Orphan", 8.0, 1.0, Some(42))
            .unwrap();
        let err = engine.buy_upgrade(1, 3).unwrap_err();
        assert!(matches!(err, Error::PreconditionFailed(_)));
    }

    #[test]
    fn concurrent_purchases_succeed_exactly_once() {
        let (_dir, _storage, engine) = engine_with_chain();
        let mut successes = 0;
        let mut conflicts = 0;
        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let engine = engine.clone();
                    scope.spawn(move || engine.buy_upgrade(1, 1))
                })
                .collect();
            for handle in handles {
                match handle.join().unwrap() {
                    Ok(_) => successes += 1,
                    Err(Error::Conflict(_)) => conflicts += 1,
                    Err(other) => panic!("unexpected error: {other}"),
                }
            }
        });
        assert_eq!(successes, 1);
        assert_eq!(conflicts, 7);
    }

    #[test]
    fn next_upgrades_scenario() {
        let (_dir, _storage, engine) = engine_with_chain();

        // Fresh user: upgrade 1 is available, upgrade 2 is locked behind it.
        let next = engine.next_upgrades(1).unwrap();
        assert_eq!(next.next_available.as_ref().map(|u| u.id), Some(1));
        assert_eq!(next.next_locked.as_ref().map(|u| u.id), Some(2));

        // After buying upgrade 1, upgrade 2 opens up and nothing is locked.
        engine.buy_upgrade(1, 1).unwrap();
        let next = engine.next_upgrades(1).unwrap();
        assert_eq!(next.next_available.as_ref().map(|u| u.id), Some(2));
        assert!(next.next_locked.is_none());

        // Everything owned: both suggestions empty.
        engine.buy_upgrade(1, 2).unwrap();
        let next = engine.next_upgrades(1).unwrap();
        assert!(next.next_available.is_none());
        assert!(next.next_locked.is_none());
    }

    fn seeded_engine() -> (tempfile::TempDir, Arc<Storage>, Engine) {
        let dir = tempdir().unwrap();
        let storage = Arc::new(Storage::open(dir.path()).unwrap());
        storage
            .create_upgrade(Some(1), "Speed Boost I", 2.0, 500.0, None)
            .unwrap();
        storage
            .create_upgrade(Some(2), "Power Boost I", 4.0, 1000.0, None)
            .unwrap();
        storage
            .create_upgrade(Some(3), "Auto Miner", 6.0, 1500.0, None)
            .unwrap();
        let engine = Engine::new(Arc::clone(&storage));
        (dir, storage, engine)
    }

    #[test]
    fn filter_by_price_range() {
        let (_dir, _storage, engine) = seeded_engine();
        let query = UpgradeQuery {
            min_price: Some(400.0),
            max_price: Some(600.0),
            ..Default::default()
        };
        let page = engine.list_upgrades(1, &query).unwrap();
        assert_eq!(page.upgrades.len(), 1);
        assert_eq!(page.upgrades[0].name, "Speed Boost I");
        assert!(page.pagination.is_none());
    }

    #[test]
    fn filter_by_production_range() {
        let (_dir, _storage, engine) = seeded_engine();
        let query = UpgradeQuery {
            min_production: Some(3.0),
            max_production: Some(5.0),
            ..Default::default()
        };
        let page = engine.list_upgrades(1, &query).unwrap();
        assert_eq!(page.upgrades.len(), 1);
        assert_eq!(page.upgrades[0].name, "Power Boost I");
    }

    #[test]
    fn filter_by_name_is_case_insensitive() {
        let (_dir, _storage, engine) = seeded_engine();
        let query = UpgradeQuery {
            name: Some("speed".into()),
            ..Default::default()
        };
        let page = engine.list_upgrades(1, &query).unwrap();
        assert_eq!(page.upgrades.len(), 1);
        assert_eq!(page.upgrades[0].name, "Speed Boost I");
    }

    #[test]
    fn owned_tri_state_filter() {
        let (_dir, _storage, engine) = seeded_engine();
        engine.buy_upgrade(1, 3).unwrap();

        let owned = engine
            .list_upgrades(
                1,
                &UpgradeQuery {
                    owned: Some(true),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(owned.upgrades.len(), 1);
        assert_eq!(owned.upgrades[0].id, 3);

        let unowned = engine
            .list_upgrades(
                1,
                &UpgradeQuery {
                    owned: Some(false),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(unowned.upgrades.len(), 2);

        let all = engine.list_upgrades(1, &UpgradeQuery::default()).unwrap();
        assert_eq!(all.upgrades.len(), 3);
    }

    #[test]
    fn default_sort_is_name_ascending() {
        let (_dir, _storage, engine) = seeded_engine();
        let page = engine.list_upgrades(1, &UpgradeQuery::default()).unwrap();
        let names: Vec<&str> = page.upgrades.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["Auto Miner", "Power Boost I", "Speed Boost I"]);
    }

    #[test]
    fn sort_by_price_descending() {
        let (_dir, _storage, engine) = seeded_engine();
        let query = UpgradeQuery {
            sort: Some(SortField::Price),
            order: Some(SortOrder::Desc),
            ..Default::default()
        };
        let page = engine.list_upgrades(1, &query).unwrap();
        let prices: Vec<f64> = page.upgrades.iter().map(|u| u.price).collect();
        assert_eq!(prices, vec![1500.0, 1000.0, 500.0]);
    }

    #[test]
    fn id_tie_break_is_stable_across_directions() {
        let dir = tempdir().unwrap();
        let storage = Arc::new(Storage::open(dir.path()).unwrap());
        storage
            .create_upgrade(Some(1), "Alpha", 2.0, 1000.0, None)
            .unwrap();
        storage
            .create_upgrade(Some(2), "Beta", 2.0, 1000.0, None)
            .unwrap();
        storage
            .create_upgrade(Some(3), "Gamma", 2.0, 500.0, None)
            .unwrap();
        let engine = Engine::new(Arc::clone(&storage));

        let asc = engine
            .list_upgrades(
                1,
                &UpgradeQuery {
                    sort: Some(SortField::Price),
                    ..Default::default()
                },
            )
            .unwrap();
        let ids: Vec<u64> = asc.upgrades.iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![3, 1, 2]);

        let desc = engine
            .list_upgrades(
                1,
                &UpgradeQuery {
                    sort: Some(SortField::Price),
                    order: Some(SortOrder::Desc),
                    ..Default::default()
                },
            )
            .unwrap();
        // Equal-priced rows keep ascending id order in both directions.
        let ids: Vec<u64> = desc.upgrades.iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn pagination_law() {
        let (_dir, _storage, engine) = seeded_engine();
        let query = UpgradeQuery {
            limit: Some(2),
            ..Default::default()
        };
        let page = engine.list_upgrades(1, &query).unwrap();
        let pagination = page.pagination.unwrap();
        assert_eq!(pagination.total_items, 3);
        // ceil(3 / 2) = 2
        assert_eq!(pagination.total_pages, 2);
        assert_eq!(pagination.current_page, 1);
        assert_eq!(pagination.items_per_page, 2);
        assert_eq!(page.upgrades.len(), 2);

        let query = UpgradeQuery {
            limit: Some(2),
            page: Some(2),
            ..Default::default()
        };
        let page = engine.list_upgrades(1, &query).unwrap();
        assert_eq!(page.upgrades.len(), 1);
        assert_eq!(page.pagination.unwrap().current_page, 2);
    }

    #[test]
    fn absurd_page_yields_empty_page() {
        let (_dir, _storage, engine) = seeded_engine();
        let query = UpgradeQuery {
            limit: Some(2),
            page: Some(u64::MAX),
            ..Default::default()
        };
        let page = engine.list_upgrades(1, &query).unwrap();
        assert!(page.upgrades.is_empty());
        assert_eq!(page.pagination.unwrap().current_page, u64::MAX);
    }

    #[test]
    fn zero_limit_disables_pagination() {
        let (_dir, _storage, engine) = seeded_engine();
        let query = UpgradeQuery {
            limit: Some(0),
            page: Some(5),
            ..Default::default()
        };
        let page = engine.list_upgrades(1, &query).unwrap();
        assert_eq!(page.upgrades.len(), 3);
        assert!(page.pagination.is_none());
    }
}
