//! Customer cart state, persisted by clients as JSON.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{CreateOrderRequest, ServiceInfo};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub service_id: Uuid,
    pub service_title: String,
    pub price: i64,
    pub company_number: String,
    pub company_name: String,
}

impl CartItem {
    pub fn new(service: &ServiceInfo, company_number: &str, company_name: &str) -> Self {
        Self {
            service_id: service.id,
            service_title: service.title.clone(),
            price: service.base_price,
            company_number: company_number.to_string(),
            company_name: company_name.to_string(),
        }
    }

    fn same_line(&self, other: &CartItem) -> bool {
        self.service_id == other.service_id && self.company_number == other.company_number
    }
}

#[derive(Debug, Clone)]
pub enum CartAction {
    Add(CartItem),
    Remove {
        service_id: Uuid,
        company_number: String,
    },
    Clear,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    #[serde(default)]
    items: Vec<CartItem>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply an action. Returns whether the cart changed.
    pub fn apply(&mut self, action: CartAction) -> bool {
        match action {
            CartAction::Add(item) => {
                if self.items.iter().any(|existing| existing.same_line(&item)) {
                    return false;
                }
                self.items.push(item);
                true
            }
            CartAction::Remove {
                service_id,
                company_number,
            } => {
                let before = self.items.len();
                self.items.retain(|item| {
                    !(item.service_id == service_id && item.company_number == company_number)
                });
                self.items.len() != before
            }
            CartAction::Clear => {
                let changed = !self.items.is_empty();
                self.items.clear();
                changed
            }
        }
    }

    pub fn add(&mut self, item: CartItem) -> bool {
        self.apply(CartAction::Add(item))
    }

    pub fn remove(&mut self, service_id: Uuid, company_number: &str) -> bool {
        self.apply(CartAction::Remove {
            service_id,
            company_number: company_number.to_string(),
        })
    }

    pub fn clear(&mut self) -> bool {
        self.apply(CartAction::Clear)
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Saturates at `i64::MAX`; the server rejects such orders anyway
    pub fn total(&self) -> i64 {
        self.items
            .iter()
            .fold(0i64, |total, item| total.saturating_add(item.price))
    }

    /// Drop the lines an order was placed for. Returns whether the cart changed.
    pub fn remove_ordered(&mut self, request: &CreateOrderRequest) -> bool {
        let before = self.items.len();
        self.items.retain(|item| {
            !(item.company_number == request.company_number
                && request.service_ids.contains(&item.service_id))
        });
        self.items.len() != before
    }

    /// One order request per company, preserving first-seen order
    pub fn to_order_requests(&self) -> Vec<CreateOrderRequest> {
        let mut requests: Vec<CreateOrderRequest> = Vec::new();
        for item in &self.items {
            match requests
                .iter_mut()
                .find(|req| req.company_number == item.company_number)
            {
                Some(req) => req.service_ids.push(item.service_id),
                None => requests.push(CreateOrderRequest {
                    company_number: item.company_number.clone(),
                    company_name: item.company_name.clone(),
                    service_ids: vec![item.service_id],
                    notes: None,
                }),
            }
        }
        requests
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(title: &str, price: i64) -> ServiceInfo {
        ServiceInfo {
            id: Uuid::new_v4(),
            title: title.to_string(),
            slug: crate::slugify(title),
            base_price: price,
            is_active: true,
            category: None,
        }
    }

    #[test]
    fn test_add_ignores_duplicate_line() {
        let cs = service("Confirmation Statement", 4999);
        let mut cart = Cart::new();
        assert!(cart.add(CartItem::new(&cs, "01234567", "ACME LTD")));
        assert!(!cart.add(CartItem::new(&cs, "01234567", "ACME LTD")));
        assert!(cart.add(CartItem::new(&cs, "07654321", "OTHER LTD")));
        assert_eq!(cart.len(), 2);
        assert_eq!(cart.total(), 9998);
    }

    #[test]
    fn test_remove_and_clear() {
        let cs = service("Confirmation Statement", 4999);
        let accounts = service("Dormant Accounts", 7500);
        let mut cart = Cart::new();
        cart.add(CartItem::new(&cs, "01234567", "ACME LTD"));
        cart.add(CartItem::new(&accounts, "01234567", "ACME LTD"));

        assert!(cart.remove(cs.id, "01234567"));
        assert!(!cart.remove(cs.id, "01234567"));
        assert_eq!(cart.total(), 7500);

        assert!(cart.clear());
        assert!(!cart.clear());
        assert!(cart.is_empty());
    }

    #[test]
    fn test_order_requests_grouped_by_company() {
        let cs = service("Confirmation Statement", 4999);
        let accounts = service("Dormant Accounts", 7500);
        let mut cart = Cart::new();
        cart.add(CartItem::new(&cs, "01234567", "ACME LTD"));
        cart.add(CartItem::new(&cs, "07654321", "OTHER LTD"));
        cart.add(CartItem::new(&accounts, "01234567", "ACME LTD"));

        let requests = cart.to_order_requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].company_number, "01234567");
        assert_eq!(requests[0].service_ids, vec![cs.id, accounts.id]);
        assert_eq!(requests[1].service_ids, vec![cs.id]);
    }

    #[test]
    fn test_persisted_cart_reloads() {
        let cs = service("Confirmation Statement", 4999);
        let mut cart = Cart::new();
        cart.add(CartItem::new(&cs, "01234567", "ACME LTD"));

        let json = cart.to_json().unwrap();
        let restored = Cart::from_json(&json).unwrap();
        assert_eq!(restored, cart);

        let empty = Cart::from_json("{}").unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn test_remove_ordered_keeps_other_companies() {
        let cs = service("Confirmation Statement", 4999);
        let accounts = service("Dormant Accounts", 7500);
        let mut cart = Cart::new();
        cart.add(CartItem::new(&cs, "01234567", "ACME LTD"));
        cart.add(CartItem::new(&accounts, "01234567", "ACME LTD"));
        cart.add(CartItem::new(&cs, "07654321", "OTHER LTD"));

        let requests = cart.to_order_requests();
        assert!(cart.remove_ordered(&requests[0]));
        assert!(!cart.remove_ordered(&requests[0]));
        assert_eq!(cart.len(), 1);
        assert_eq!(cart.items()[0].company_number, "07654321");
    }

    #[test]
    fn test_total_saturates() {
        let mut cart = Cart::new();
        cart.add(CartItem::new(&service("Everything", i64::MAX), "01234567", "ACME LTD"));
        cart.add(CartItem::new(&service("Confirmation Statement", 4999), "01234567", "ACME LTD"));
        assert_eq!(cart.total(), i64::MAX);
    }
}
