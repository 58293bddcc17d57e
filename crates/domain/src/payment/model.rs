use serde::{Deserialize, Serialize};

use crate::aggregate::{Entity, Ledgered};
use crate::error::DomainError;
use crate::ledger::UpdateLedger;

/// A user's credit balance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub credit: i64,
    pub ledger: UpdateLedger,
}

impl Wallet {
    pub fn view(&self) -> WalletView {
        WalletView {
            credit: self.credit,
        }
    }
}

impl Entity for Wallet {
    fn kind() -> &'static str {
        "User"
    }
}

impl Ledgered for Wallet {
    fn quantity(&self) -> i64 {
        self.credit
    }

    fn set_quantity(&mut self, quantity: i64) {
        self.credit = quantity;
    }

    fn ledger(&self) -> &UpdateLedger {
        &self.ledger
    }

    fn ledger_mut(&mut self) -> &mut UpdateLedger {
        &mut self.ledger
    }

    fn insufficient(id: &str) -> DomainError {
        DomainError::InsufficientCredit {
            user_id: id.to_string(),
        }
    }
}

/// Public projection of a [`Wallet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletView {
    pub credit: i64,
}
