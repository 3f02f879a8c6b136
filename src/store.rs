use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use crate::model::Product;
use crate::util::{read_json, write_json_pretty};

/// Durable product list in a single JSON file. Every mutation loads the
/// full list, applies the change, and rewrites the file whole. The store
/// owns product lifetime; callers work on transient copies. No locking —
/// single process, single user, last writer wins.
pub struct InventoryStore {
    path: PathBuf,
}

impl InventoryStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let store = Self { path: path.into() };
        if !store.path.exists() {
            write_json_pretty(&store.path, &Vec::<Product>::new()).with_context(|| {
                format!("failed to initialize inventory: {}", store.path.display())
            })?;
            debug!(path = %store.path.display(), "created empty inventory file");
        }
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Vec<Product>> {
        read_json(&self.path)
    }

    pub fn save(&self, products: &[Product]) -> Result<()> {
        write_json_pretty(&self.path, &products)
            .with_context(|| format!("failed to persist inventory: {}", self.path.display()))
    }

    pub fn add(&self, product: Product) -> Result<()> {
        let mut products = self.load()?;
        products.push(product);
        self.save(&products)
    }

    /// Marks the product at `index` (into the full list) as consumed.
    /// Returns false when the index is out of range.
    pub fn mark_consumed(&self, index: usize) -> Result<bool> {
        let mut products = self.load()?;
        let Some(product) = products.get_mut(index) else {
            return Ok(false);
        };
        product.consumed = true;
        self.save(&products)?;
        Ok(true)
    }

    pub fn remove(&self, index: usize) -> Result<bool> {
        let mut products = self.load()?;
        if index >= products.len() {
            return Ok(false);
        }
        products.remove(index);
        self.save(&products)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample_product(name: &str) -> Product {
        Product::new(
            name,
            "Dairy",
            NaiveDate::from_ymd_opt(2025, 6, 20).unwrap(),
            Some(4.99),
        )
        .unwrap()
    }

    fn temp_store() -> (tempfile::TempDir, InventoryStore) {
        let root = tempfile::tempdir().unwrap();
        let store = InventoryStore::open(root.path().join("pantry.json")).unwrap();
        (root, store)
    }

    #[test]
    fn open_creates_empty_inventory() {
        let (_root, store) = temp_store();
        assert!(store.path().exists());
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn add_appends_and_persists() {
        let (_root, store) = temp_store();
        store.add(sample_product("Mleko")).unwrap();
        store.add(sample_product("Masło")).unwrap();

        let products = store.load().unwrap();
        assert_eq!(products.len(), 2);
        assert_eq!(products[0].name, "Mleko");
        assert_eq!(products[1].name, "Masło");
    }

    #[test]
    fn mark_consumed_touches_only_the_target() {
        let (_root, store) = temp_store();
        store.add(sample_product("Mleko")).unwrap();
        store.add(sample_product("Masło")).unwrap();

        assert!(store.mark_consumed(1).unwrap());

        // Reopen to prove the change survived the rewrite.
        let reopened = InventoryStore::open(store.path().to_path_buf()).unwrap();
        let products = reopened.load().unwrap();
        assert!(!products[0].consumed);
        assert!(products[1].consumed);
        assert_eq!(products[0].name, "Mleko");
        assert_eq!(products[0].price, Some(4.99));
    }

    #[test]
    fn mark_consumed_rejects_out_of_range_index() {
        let (_root, store) = temp_store();
        store.add(sample_product("Mleko")).unwrap();
        assert!(!store.mark_consumed(5).unwrap());
    }

    #[test]
    fn remove_deletes_the_product() {
        let (_root, store) = temp_store();
        store.add(sample_product("Mleko")).unwrap();
        store.add(sample_product("Masło")).unwrap();

        assert!(store.remove(0).unwrap());
        let products = store.load().unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].name, "Masło");

        assert!(!store.remove(10).unwrap());
    }
}
