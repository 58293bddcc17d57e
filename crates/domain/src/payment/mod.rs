//! User wallets holding a non-negative credit balance.

mod model;
mod service;

pub use model::{Wallet, WalletView};
pub use service::PaymentService;
