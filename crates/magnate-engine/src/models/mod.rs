//! Core data types for the progression engine.
//!
//! # Core Types
//!
//! - [`Resource`] - a catalog resource definition (name + unit price)
//! - [`Upgrade`] - a catalog upgrade with an optional prerequisite edge
//! - [`User`] - public view of an account
//! - [`UserResourceLink`] / [`UserUpgradeLink`] - per-user ownership records

mod link;
mod resource;
mod upgrade;
mod user;

pub use link::{UserResourceLink, UserUpgradeLink};
pub use resource::Resource;
pub use upgrade::{PurchasedUpgrade, Upgrade};
pub use user::{StoredUser, User};
