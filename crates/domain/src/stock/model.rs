use serde::{Deserialize, Serialize};

use crate::aggregate::{Entity, Ledgered};
use crate::error::DomainError;
use crate::ledger::UpdateLedger;

/// An item in stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockItem {
    pub stock: i64,
    pub price: i64,
    pub ledger: UpdateLedger,
}

impl StockItem {
    /// Creates an item with no stock.
    pub fn new(price: i64) -> Self {
        Self {
            stock: 0,
            price,
            ledger: UpdateLedger::new(),
        }
    }

    pub fn view(&self) -> ItemView {
        ItemView {
            stock: self.stock,
            price: self.price,
        }
    }
}

impl Entity for StockItem {
    fn kind() -> &'static str {
        "Item"
    }
}

impl Ledgered for StockItem {
    fn quantity(&self) -> i64 {
        self.stock
    }

    fn set_quantity(&mut self, quantity: i64) {
        self.stock = quantity;
    }

    fn ledger(&self) -> &UpdateLedger {
        &self.ledger
    }

    fn ledger_mut(&mut self) -> &mut UpdateLedger {
        &mut self.ledger
    }

    fn insufficient(id: &str) -> DomainError {
        DomainError::InsufficientStock {
            item_id: id.to_string(),
        }
    }
}

/// Public projection of a [`StockItem`], without its ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemView {
    pub stock: i64,
    pub price: i64,
}
