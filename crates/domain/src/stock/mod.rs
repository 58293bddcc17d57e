//! Inventory: items with a price and a non-negative stock level.

mod model;
mod service;

pub use model::{ItemView, StockItem};
pub use service::StockService;
