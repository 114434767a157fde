//! The process-wide `StoreName -> Store` registry.
//!
//! `Catalog` guards the name-to-store mapping with a coarse read/write lock:
//! `create_store`/`drop_store`/`purge_stores` take the write lock; dispatch
//! to an existing store takes the read lock and then defers to that store's
//! own lock.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::index::NonLinearIndexConfig;
use crate::limits::BoundedAllocator;
use crate::store::{Store, StoreInfo};

pub struct Catalog {
    stores: RwLock<HashMap<String, Arc<RwLock<Store>>>>,
    allocator: Arc<BoundedAllocator>,
}

impl Catalog {
    pub fn new(allocator: Arc<BoundedAllocator>) -> Self {
        Self {
            stores: RwLock::new(HashMap::new()),
            allocator,
        }
    }

    pub fn allocator(&self) -> &Arc<BoundedAllocator> {
        &self.allocator
    }

    pub fn create_store(
        &self,
        name: &str,
        dimension: usize,
        predicate_fields: &[String],
        non_linear: &[NonLinearIndexConfig],
        error_if_exists: bool,
    ) -> Result<()> {
        if dimension == 0 {
            return Err(Error::InvalidDimension(dimension));
        }
        let mut stores = self.stores.write();
        if stores.contains_key(name) {
            if error_if_exists {
                return Err(Error::StoreAlreadyExists(name.to_string()));
            }
            return Ok(());
        }
        let store = Store::new(dimension, predicate_fields, non_linear, self.allocator.clone());
        stores.insert(name.to_string(), Arc::new(RwLock::new(store)));
        Ok(())
    }

    /// Inserts an already-built store directly, used when restoring from a
    /// snapshot. Overwrites any existing store of the same name.
    pub fn insert_store(&self, name: String, store: Store) {
        self.stores.write().insert(name, Arc::new(RwLock::new(store)));
    }

    pub fn drop_store(&self, name: &str, error_if_not_exists: bool) -> Result<usize> {
        let mut stores = self.stores.write();
        if stores.remove(name).is_some() {
            Ok(1)
        } else if error_if_not_exists {
            Err(Error::StoreNotFound(name.to_string()))
        } else {
            Ok(0)
        }
    }

    pub fn purge_stores(&self) {
        self.stores.write().clear();
    }

    pub fn list_stores(&self) -> Vec<StoreInfo> {
        self.stores
            .read()
            .iter()
            .map(|(name, store)| store.read().info(name))
            .collect()
    }

    pub fn store_names(&self) -> Vec<String> {
        self.stores.read().keys().cloned().collect()
    }

    fn handle_of(&self, name: &str) -> Result<Arc<RwLock<Store>>> {
        self.stores
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::StoreNotFound(name.to_string()))
    }

    /// Dispatches a read-only operation under the store's read lock.
    pub fn with_store_read<T>(&self, name: &str, f: impl FnOnce(&Store) -> Result<T>) -> Result<T> {
        let handle = self.handle_of(name)?;
        let guard = handle.read();
        f(&guard)
    }

    /// Dispatches a mutating operation under the store's write lock.
    pub fn with_store_write<T>(&self, name: &str, f: impl FnOnce(&mut Store) -> Result<T>) -> Result<T> {
        let handle = self.handle_of(name)?;
        let mut guard = handle.write();
        f(&mut guard)
    }
}
