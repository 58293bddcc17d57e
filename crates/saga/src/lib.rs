//! Checkout saga across the order, stock and payment services.
//!
//! A checkout follows these steps:
//! 1. Reserve stock for every line item
//! 2. Charge the order total to the user
//! 3. Mark the order paid
//!
//! If step 1 or 2 fails, the steps that may have taken effect are
//! compensated in reverse order. A failure in step 3 is logged as an
//! inconsistency and left for an operator.

pub mod coordinator;
pub mod error;
pub mod services;
pub mod state;

pub use coordinator::{CheckoutOrchestrator, CheckoutOutcome, CheckoutReport};
pub use error::{CheckoutError, Result, ServiceError};
pub use services::{
    OrderGateway, PaymentGateway, RpcOrderGateway, RpcPaymentGateway, RpcStockGateway,
    StockGateway,
};
pub use state::{CheckoutStage, StageOutcome, StageRecord};
