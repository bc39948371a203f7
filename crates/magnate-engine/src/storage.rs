//! Persistent storage using RocksDB.
//!
//! Values are JSON-encoded models under `prefix:{id}` keys; numeric ids are
//! zero-padded so prefix iteration yields numeric order. RocksDB has no
//! unique index, so uniqueness (link pairs, catalog names, usernames) is
//! enforced here: every check-then-insert runs under the storage write lock,
//! which is what lets concurrent grants of the same link resolve to exactly
//! one success.

use crate::error::{Error, Result};
use crate::models::{Resource, StoredUser, Upgrade, UserResourceLink, UserUpgradeLink};
use rocksdb::{Options, DB};
use std::path::Path;
use std::sync::Mutex;

/// Storage backend for catalog, accounts, sessions, and ownership links.
pub struct Storage {
    db: DB,
    /// Serializes mutation so insert-if-absent and counter bumps are atomic.
    write_lock: Mutex<()>,
}

fn entity_key(prefix: &str, id: u64) -> String {
    format!("{prefix}:{id:020}")
}

fn link_key(prefix: &str, user_id: u64, entity_id: u64) -> String {
    format!("{prefix}:{user_id:020}:{entity_id:020}")
}

impl Storage {
    /// Open or create storage at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        let db = DB::open(&opts, path)?;
        Ok(Self {
            db,
            write_lock: Mutex::new(()),
        })
    }

    fn get_json<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.db.get(key.as_bytes())? {
            Some(data) => Ok(Some(serde_json::from_slice(&data)?)),
            None => Ok(None),
        }
    }

    fn put_json<T: serde::Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let data = serde_json::to_vec(value)?;
        self.db.put(key.as_bytes(), data)?;
        Ok(())
    }

    /// Collect all values under a key prefix.
    fn scan_prefix<T: serde::de::DeserializeOwned>(&self, prefix: &str) -> Result<Vec<T>> {
        let mut out = Vec::new();
        let iter = self.db.prefix_iterator(prefix.as_bytes());
        for item in iter {
            let (key, value) = item?;
            if key.starts_with(prefix.as_bytes()) {
                out.push(serde_json::from_slice(&value)?);
            } else {
                break;
            }
        }
        Ok(out)
    }

    /// Allocate the next id from a named counter.
    fn next_id(&self, name: &str) -> Result<u64> {
        let _guard = self.write_lock.lock().expect("storage lock poisoned");
        let key = format!("seq:{name}");
        let current: u64 = self.get_json(&key)?.unwrap_or(0);
        let next = current + 1;
        self.put_json(&key, &next)?;
        Ok(next)
    }

    // --- Resources (catalog) ---

    /// Create a resource with a freshly allocated id. Names are unique.
    pub fn create_resource(&self, name: &str, price: f64) -> Result<Resource> {
        let id = self.next_id("resource")?;
        let _guard = self.write_lock.lock().expect("storage lock poisoned");
        let name_key = format!("resource_name:{name}");
        if self.db.get(name_key.as_bytes())?.is_some() {
            return Err(Error::Conflict("Resource already exists".into()));
        }
        let resource = Resource::new(id, name.to_string(), price);
        self.put_json(&entity_key(Resource::KEY_PREFIX, id), &resource)?;
        self.db.put(name_key.as_bytes(), id.to_string().as_bytes())?;
        Ok(resource)
    }

    /// Get a resource by id.
    pub fn get_resource(&self, id: u64) -> Result<Option<Resource>> {
        self.get_json(&entity_key(Resource::KEY_PREFIX, id))
    }

    /// Update a resource's name and/or price.
    pub fn update_resource(
        &self,
        id: u64,
        name: Option<&str>,
        price: Option<f64>,
    ) -> Result<Resource> {
        let _guard = self.write_lock.lock().expect("storage lock poisoned");
        let mut resource: Resource = self
            .get_json(&entity_key(Resource::KEY_PREFIX, id))?
            .ok_or_else(|| Error::NotFound("Resource not found".into()))?;

        if let Some(new_name) = name {
            if new_name != resource.name {
                let new_key = format!("resource_name:{new_name}");
                if self.db.get(new_key.as_bytes())?.is_some() {
                    return Err(Error::Conflict("Resource already exists".into()));
                }
                let old_key = format!("resource_name:{}", resource.name);
                self.db.delete(old_key.as_bytes())?;
                self.db.put(new_key.as_bytes(), id.to_string().as_bytes())?;
                resource.name = new_name.to_string();
            }
        }
        if let Some(new_price) = price {
            resource.price = new_price;
        }
        self.put_json(&entity_key(Resource::KEY_PREFIX, id), &resource)?;
        Ok(resource)
    }

    /// Delete a resource and cascade its user links.
    pub fn delete_resource(&self, id: u64) -> Result<()> {
        let _guard = self.write_lock.lock().expect("storage lock poisoned");
        let resource: Resource = self
            .get_json(&entity_key(Resource::KEY_PREFIX, id))?
            .ok_or_else(|| Error::NotFound("Resource not found".into()))?;

        self.db
            .delete(entity_key(Resource::KEY_PREFIX, id).as_bytes())?;
        self.db
            .delete(format!("resource_name:{}", resource.name).as_bytes())?;

        // Orphaned links must not survive the catalog entry.
        let links: Vec<UserResourceLink> =
            self.scan_prefix(&format!("{}:", UserResourceLink::KEY_PREFIX))?;
        for link in links.iter().filter(|l| l.resource_id == id) {
            self.db
                .delete(link_key(UserResourceLink::KEY_PREFIX, link.user_id, id).as_bytes())?;
        }
        Ok(())
    }

    /// List all resources, sorted by name.
    pub fn list_resources(&self) -> Result<Vec<Resource>> {
        let mut resources: Vec<Resource> =
            self.scan_prefix(&format!("{}:", Resource::KEY_PREFIX))?;
        resources.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(resources)
    }

    // --- Upgrades (catalog) ---

    /// Create an upgrade. Catalog seeds pass an explicit id so prerequisite
    /// edges stay stable across environments; otherwise one is allocated.
    pub fn create_upgrade(
        &self,
        id: Option<u64>,
        name: &str,
        production: f64,
        price: f64,
        prerequisite_id: Option<u64>,
    ) -> Result<Upgrade> {
        let explicit = id.is_some();
        let id = match id {
            Some(id) => id,
            None => self.next_id("upgrade")?,
        };
        let _guard = self.write_lock.lock().expect("storage lock poisoned");
        let key = entity_key(Upgrade::KEY_PREFIX, id);
        if self.db.get(key.as_bytes())?.is_some() {
            return Err(Error::Conflict("Upgrade already exists".into()));
        }
        let mut upgrade = Upgrade::new(id, name.to_string(), production, price);
        upgrade.prerequisite_id = prerequisite_id;
        self.put_json(&key, &upgrade)?;
        if explicit {
            // Keep the allocator ahead of seeded ids so a later allocation
            // cannot collide with an explicitly created upgrade.
            let seq_key = "seq:upgrade";
            let current: u64 = self.get_json(seq_key)?.unwrap_or(0);
            if id > current {
                self.put_json(seq_key, &id)?;
            }
        }
        Ok(upgrade)
    }

    /// Get an upgrade by id.
    pub fn get_upgrade(&self, id: u64) -> Result<Option<Upgrade>> {
        self.get_json(&entity_key(Upgrade::KEY_PREFIX, id))
    }

    /// Delete an upgrade and cascade its ownership links. Upgrades that
    /// referenced it as a prerequisite keep the dangling edge; the engine
    /// treats an unresolvable prerequisite as not owned.
    pub fn delete_upgrade(&self, id: u64) -> Result<()> {
        let _guard = self.write_lock.lock().expect("storage lock poisoned");
        let key = entity_key(Upgrade::KEY_PREFIX, id);
        if self.db.get(key.as_bytes())?.is_none() {
            return Err(Error::NotFound("Upgrade not found".into()));
        }
        self.db.delete(key.as_bytes())?;

        let links: Vec<UserUpgradeLink> =
            self.scan_prefix(&format!("{}:", UserUpgradeLink::KEY_PREFIX))?;
        for link in links.iter().filter(|l| l.upgrade_id == id) {
            self.db
                .delete(link_key(UserUpgradeLink::KEY_PREFIX, link.user_id, id).as_bytes())?;
        }
        Ok(())
    }

    /// List all upgrades, sorted by name (id tie-break for deterministic
    /// first-match scans).
    pub fn list_upgrades(&self) -> Result<Vec<Upgrade>> {
        let mut upgrades: Vec<Upgrade> = self.scan_prefix(&format!("{}:", Upgrade::KEY_PREFIX))?;
        upgrades.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(upgrades)
    }

    // --- Users ---

    /// Create a user. Usernames are unique; the caller decides admin status.
    pub fn create_user(
        &self,
        username: &str,
        salt: &str,
        password_digest: &str,
        make_admin_if_first: bool,
        forced_admin: bool,
    ) -> Result<StoredUser> {
        let id = self.next_id("user")?;
        let _guard = self.write_lock.lock().expect("storage lock poisoned");
        let name_key = format!("username:{username}");
        if self.db.get(name_key.as_bytes())?.is_some() {
            return Err(Error::Conflict("User already exists".into()));
        }
        let user = StoredUser {
            id,
            username: username.to_string(),
            is_admin: forced_admin || (make_admin_if_first && id == 1),
            salt: salt.to_string(),
            password_digest: password_digest.to_string(),
        };
        self.put_json(&entity_key(StoredUser::KEY_PREFIX, id), &user)?;
        self.db.put(name_key.as_bytes(), id.to_string().as_bytes())?;
        Ok(user)
    }

    /// Get a user by id.
    pub fn get_user(&self, id: u64) -> Result<Option<StoredUser>> {
        self.get_json(&entity_key(StoredUser::KEY_PREFIX, id))
    }

    /// Look a user up by username through the uniqueness index.
    pub fn find_user_by_username(&self, username: &str) -> Result<Option<StoredUser>> {
        let name_key = format!("username:{username}");
        let Some(raw) = self.db.get(name_key.as_bytes())? else {
            return Ok(None);
        };
        let id: u64 = String::from_utf8_lossy(&raw)
            .parse()
            .map_err(|_| Error::Storage("corrupt username index".into()))?;
        self.get_user(id)
    }

    /// List all users, sorted by username.
    pub fn list_users(&self) -> Result<Vec<StoredUser>> {
        let mut users: Vec<StoredUser> =
            self.scan_prefix(&format!("{}:", StoredUser::KEY_PREFIX))?;
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(users)
    }

    // --- Sessions ---

    /// Bind a bearer token to a user.
    pub fn put_session(&self, token: &str, user_id: u64) -> Result<()> {
        self.put_json(&format!("session:{token}"), &user_id)
    }

    /// Resolve a bearer token.
    pub fn get_session(&self, token: &str) -> Result<Option<u64>> {
        self.get_json(&format!("session:{token}"))
    }

    // --- Resource links (ownership ledger rows) ---

    /// Get a user's link for one resource, if any.
    pub fn get_resource_link(
        &self,
        user_id: u64,
        resource_id: u64,
    ) -> Result<Option<UserResourceLink>> {
        self.get_json(&link_key(UserResourceLink::KEY_PREFIX, user_id, resource_id))
    }

    /// Unconditionally write a link row (overwrite semantics).
    pub fn put_resource_link(&self, user_id: u64, resource_id: u64, amount: f64) -> Result<()> {
        let link = UserResourceLink {
            user_id,
            resource_id,
            amount,
        };
        self.put_json(
            &link_key(UserResourceLink::KEY_PREFIX, user_id, resource_id),
            &link,
        )
    }

    /// Insert a link only if the (user, resource) pair has none yet.
    /// Returns whether an insert happened. Existing amounts are never
    /// touched, which is what makes bulk initialization idempotent.
    pub fn insert_resource_link_if_absent(
        &self,
        user_id: u64,
        resource_id: u64,
        amount: f64,
    ) -> Result<bool> {
        let _guard = self.write_lock.lock().expect("storage lock poisoned");
        let key = link_key(UserResourceLink::KEY_PREFIX, user_id, resource_id);
        if self.db.get(key.as_bytes())?.is_some() {
            return Ok(false);
        }
        let link = UserResourceLink {
            user_id,
            resource_id,
            amount,
        };
        self.put_json(&key, &link)?;
        Ok(true)
    }

    /// All resource links for one user, in resource-id order.
    pub fn user_resource_links(&self, user_id: u64) -> Result<Vec<UserResourceLink>> {
        self.scan_prefix(&format!("{}:{user_id:020}:", UserResourceLink::KEY_PREFIX))
    }

    /// Every resource link in the ledger (aggregation input).
    pub fn all_resource_links(&self) -> Result<Vec<UserResourceLink>> {
        self.scan_prefix(&format!("{}:", UserResourceLink::KEY_PREFIX))
    }

    // --- Upgrade links (ownership ledger rows) ---

    /// Whether the user owns the upgrade.
    pub fn owns_upgrade(&self, user_id: u64, upgrade_id: u64) -> Result<bool> {
        let key = link_key(UserUpgradeLink::KEY_PREFIX, user_id, upgrade_id);
        Ok(self.db.get(key.as_bytes())?.is_some())
    }

    /// Compare-and-insert for upgrade ownership. Exactly one of any set of
    /// concurrent callers for the same pair observes `true`.
    pub fn insert_upgrade_link_if_absent(&self, user_id: u64, upgrade_id: u64) -> Result<bool> {
        let _guard = self.write_lock.lock().expect("storage lock poisoned");
        let key = link_key(UserUpgradeLink::KEY_PREFIX, user_id, upgrade_id);
        if self.db.get(key.as_bytes())?.is_some() {
            return Ok(false);
        }
        let link = UserUpgradeLink {
            user_id,
            upgrade_id,
        };
        self.put_json(&key, &link)?;
        Ok(true)
    }

    /// Ids of all upgrades the user owns, in id order.
    pub fn user_upgrade_ids(&self, user_id: u64) -> Result<Vec<u64>> {
        let links: Vec<UserUpgradeLink> =
            self.scan_prefix(&format!("{}:{user_id:020}:", UserUpgradeLink::KEY_PREFIX))?;
        Ok(links.into_iter().map(|l| l.upgrade_id).collect())
    }
}
