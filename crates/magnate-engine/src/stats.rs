//! Per-user resource statistics.
//!
//! In-process replacement for a grouped aggregation: join every ledger link
//! to its resource definition, fold per user, then attach the username.

use crate::error::Result;
use crate::storage::Storage;
use serde::{Deserialize, Serialize};

/// One resource entry inside a user summary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceStat {
    pub name: String,
    pub amount: f64,
    /// amount * unit price
    pub value: f64,
}

/// Aggregated holdings of one user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserResourceStats {
    pub username: String,
    pub total_resources: f64,
    pub total_value: f64,
    pub resource_count: u64,
    pub resources: Vec<ResourceStat>,
}

/// Produce a summary for every user holding at least one resource link.
///
/// Links whose resource or user no longer exists are skipped; the join is
/// over current catalog and account state. The `resources` sub-list keeps
/// the join (storage iteration) order.
pub fn user_resource_stats(storage: &Storage) -> Result<Vec<UserResourceStats>> {
    let mut stats: Vec<UserResourceStats> = Vec::new();
    // Links iterate grouped by user id, so a linear fold groups correctly.
    let mut current_user: Option<u64> = None;

    for link in storage.all_resource_links()? {
        let Some(resource) = storage.get_resource(link.resource_id)? else {
            continue;
        };
        if current_user != Some(link.user_id) {
            let Some(user) = storage.get_user(link.user_id)? else {
                current_user = None;
                continue;
            };
            current_user = Some(link.user_id);
            stats.push(UserResourceStats {
                username: user.username,
                total_resources: 0.0,
                total_value: 0.0,
                resource_count: 0,
                resources: Vec::new(),
            });
        }
        let entry = stats.last_mut().expect("entry pushed for current user");
        let value = link.amount * resource.price;
        entry.total_resources += link.amount;
        entry.total_value += value;
        entry.resource_count += 1;
        entry.resources.push(ResourceStat {
            name: resource.name,
            amount: link.amount,
            value,
        });
    }

    Ok(stats)
}
