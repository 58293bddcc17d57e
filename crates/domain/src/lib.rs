//! Order, stock and payment domains.
//!
//! This crate provides:
//! - [`AggregateStore`]: typed entity access with idempotent, ledgered
//!   quantity mutations, single and bulk
//! - the order, stock and payment services built on it
//! - the command protocol spoken over the broker
//! - routers that serve those commands on the service queues

pub mod aggregate;
pub mod error;
pub mod ledger;
pub mod order;
pub mod payment;
pub mod protocol;
pub mod router;
pub mod stock;
pub mod store;

pub use aggregate::{Entity, Ledgered};
pub use error::{DomainError, Result};
pub use ledger::{Decision, LEDGER_CAPACITY, Mutation, OpKind, OperationToken, UpdateLedger};
pub use order::{Order, OrderService};
pub use payment::{PaymentService, Wallet, WalletView};
pub use protocol::{
    ORDER_QUEUE, OrderCommand, PAYMENT_QUEUE, PaymentCommand, Reply, ReplyData, STOCK_QUEUE,
    SERVER_ERROR_MESSAGE, SERVICE_QUEUES, Status, StockCommand,
};
pub use router::{OrderRouter, PaymentRouter, StockRouter};
pub use stock::{ItemView, StockItem, StockService};
pub use store::AggregateStore;
