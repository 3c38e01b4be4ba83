//! Local JSON state between invocations: the cart and the bulk-document selection.

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use shared::{BulkSelection, Cart};
use std::path::{Path, PathBuf};

use crate::config::Config;

const CART_FILE: &str = "cart.json";
const SELECTION_FILE: &str = "selection.json";

fn load_json<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Ok(T::default());
    }
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content).with_context(|| format!("corrupt state file {}", path.display()))
}

fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    std::fs::write(path, serde_json::to_string_pretty(value)?)?;
    Ok(())
}

pub struct Store {
    dir: PathBuf,
}

impl Store {
    pub fn open() -> Result<Self> {
        Ok(Self::at(Config::data_dir()?))
    }

    pub fn at(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn cart(&self) -> Result<Cart> {
        load_json(&self.dir.join(CART_FILE))
    }

    pub fn save_cart(&self, cart: &Cart) -> Result<()> {
        save_json(&self.dir.join(CART_FILE), cart)
    }

    pub fn selection(&self) -> Result<BulkSelection> {
        load_json(&self.dir.join(SELECTION_FILE))
    }

    pub fn save_selection(&self, selection: &BulkSelection) -> Result<()> {
        save_json(&self.dir.join(SELECTION_FILE), selection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{CartItem, CompanySummary, ServiceInfo};
    use uuid::Uuid;

    fn temp_store() -> (Store, PathBuf) {
        let dir = std::env::temp_dir().join(format!("filings-store-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        (Store::at(&dir), dir)
    }

    #[test]
    fn test_cart_persists() {
        let (store, dir) = temp_store();
        assert!(store.cart().unwrap().is_empty());

        let service = ServiceInfo {
            id: Uuid::new_v4(),
            title: "Confirmation Statement".to_string(),
            slug: "confirmation-statement".to_string(),
            base_price: 4999,
            is_active: true,
            category: None,
        };
        let mut cart = Cart::new();
        cart.add(CartItem::new(&service, "01234567", "ACME LTD"));
        store.save_cart(&cart).unwrap();

        let loaded = store.cart().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.total(), 4999);

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_selection_persists() {
        let (store, dir) = temp_store();
        let mut selection = store.selection().unwrap();
        selection.toggle_company(CompanySummary {
            company_number: "01234567".to_string(),
            company_name: "ACME LTD".to_string(),
            ..Default::default()
        });
        store.save_selection(&selection).unwrap();

        assert!(store.selection().unwrap().is_company_selected("01234567"));
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_corrupt_state_is_an_error() {
        let (store, dir) = temp_store();
        std::fs::write(dir.join(CART_FILE), "{not json").unwrap();
        assert!(store.cart().is_err());
        let _ = std::fs::remove_dir_all(dir);
    }
}
