//! Checkout state machine.

use serde::{Deserialize, Serialize};

/// The stage a checkout is in.
///
/// Stage transitions:
/// ```text
/// ReservingStock ──► ChargingPayment ──► ConfirmingOrder ──► Done
///       │                  │                    │
///       │                  │ rejected           └── failure ──► Failed (not compensated)
///       │                  ├──────────────────────────► CompensatingStock ──► Failed
///       │                  └─ server error ─► CompensatingPayment ──┘
///       ├─ rejected ──────────────────────────────────────────────────────► Failed
///       └─ server error ─────────────────────────► CompensatingStock ──► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CheckoutStage {
    ReservingStock,
    ChargingPayment,
    ConfirmingOrder,
    CompensatingStock,
    CompensatingPayment,
    /// All steps succeeded (terminal state).
    Done,
    /// The checkout failed (terminal state).
    Failed,
}

impl CheckoutStage {
    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, CheckoutStage::Done | CheckoutStage::Failed)
    }

    /// Returns true if this stage undoes an earlier one.
    pub fn is_compensation(&self) -> bool {
        matches!(
            self,
            CheckoutStage::CompensatingStock | CheckoutStage::CompensatingPayment
        )
    }

    /// Returns the stage name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutStage::ReservingStock => "reserving_stock",
            CheckoutStage::ChargingPayment => "charging_payment",
            CheckoutStage::ConfirmingOrder => "confirming_order",
            CheckoutStage::CompensatingStock => "compensating_stock",
            CheckoutStage::CompensatingPayment => "compensating_payment",
            CheckoutStage::Done => "done",
            CheckoutStage::Failed => "failed",
        }
    }
}

impl std::fmt::Display for CheckoutStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a stage ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StageOutcome {
    Succeeded,
    Failed(String),
}

/// One entry of a checkout's stage trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage: CheckoutStage,
    pub outcome: StageOutcome,
}
