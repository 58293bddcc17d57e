//! Orders: line items, running total and the paid flag.

mod model;
mod service;

pub use model::Order;
pub use service::OrderService;
