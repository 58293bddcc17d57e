use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::aggregate::Entity;
use crate::error::{DomainError, Result};

/// A user's order: item lines plus the running total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub paid: bool,
    /// `(item_id, quantity)` lines in insertion order, one per item.
    pub items: Vec<(String, i64)>,
    pub user_id: String,
    pub total_cost: i64,
}

impl Order {
    /// Creates an empty, unpaid order for `user_id`.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            paid: false,
            items: Vec::new(),
            user_id: user_id.into(),
            total_cost: 0,
        }
    }

    /// Adds `quantity` units of `item_id` priced at `unit_price`.
    ///
    /// An existing line for the same item has its quantity increased. A
    /// line quantity or total that would overflow is rejected and leaves the
    /// order unchanged.
    pub fn add_line(&mut self, order_id: &str, item_id: &str, quantity: i64, unit_price: i64) -> Result<()> {
        if self.paid {
            return Err(DomainError::OrderAlreadyPaid(order_id.to_string()));
        }
        if quantity <= 0 {
            return Err(DomainError::InvalidQuantity(quantity));
        }

        let total_cost = quantity
            .checked_mul(unit_price)
            .and_then(|cost| self.total_cost.checked_add(cost))
            .ok_or(DomainError::InvalidQuantity(quantity))?;
        match self.items.iter_mut().find(|(id, _)| id == item_id) {
            Some((_, existing)) => {
                *existing = existing
                    .checked_add(quantity)
                    .ok_or(DomainError::InvalidQuantity(quantity))?;
            }
            None => self.items.push((item_id.to_string(), quantity)),
        }
        self.total_cost = total_cost;
        Ok(())
    }

    /// Sums quantities per item, saturating at `i64::MAX`.
    pub fn item_quantities(&self) -> BTreeMap<String, i64> {
        let mut quantities = BTreeMap::new();
        for (item_id, quantity) in &self.items {
            let total = quantities.entry(item_id.clone()).or_insert(0i64);
            *total = total.saturating_add(*quantity);
        }
        quantities
    }

    pub fn has_items(&self) -> bool {
        !self.items.is_empty()
    }

    /// Returns a copy of this order marked as paid.
    pub fn as_paid(&self) -> Self {
        Self {
            paid: true,
            ..self.clone()
        }
    }
}

impl Entity for Order {
    fn kind() -> &'static str {
        "Order"
    }
}
