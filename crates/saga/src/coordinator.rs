//! Checkout orchestrator.

use std::collections::BTreeMap;
use std::time::Instant;

use domain::Status;

use crate::error::{CheckoutError, Result, ServiceError};
use crate::services::{OrderGateway, PaymentGateway, StockGateway};
use crate::state::{CheckoutStage, StageOutcome, StageRecord};

/// How a successful checkout ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutOutcome {
    /// Stock was reserved, payment taken and the order marked paid.
    Completed,
    /// The order had already been paid; nothing was run.
    AlreadyPaid,
}

/// Result of one checkout, with the stages it went through.
#[derive(Debug)]
pub struct CheckoutReport {
    pub order_id: String,
    /// Terminal stage: [`CheckoutStage::Done`] or [`CheckoutStage::Failed`].
    pub stage: CheckoutStage,
    pub trail: Vec<StageRecord>,
    pub outcome: Result<CheckoutOutcome>,
}

impl CheckoutReport {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Returns true if the trail contains `stage`.
    pub fn visited(&self, stage: CheckoutStage) -> bool {
        self.trail.iter().any(|record| record.stage == stage)
    }
}

/// Runs checkouts: reserve stock, charge the user, mark the order paid.
///
/// A failed step compensates the completed ones in reverse order before the
/// checkout is reported as failed. All remote calls are keyed by the order
/// id, so retrying a checkout never reserves or charges twice, and a
/// compensation undoes a step at most once.
///
/// Progress lives in the calling task only; nothing is persisted.
pub struct CheckoutOrchestrator<O, S, P>
where
    O: OrderGateway,
    S: StockGateway,
    P: PaymentGateway,
{
    orders: O,
    stock: S,
    payment: P,
}

impl<O, S, P> CheckoutOrchestrator<O, S, P>
where
    O: OrderGateway,
    S: StockGateway,
    P: PaymentGateway,
{
    /// Creates a new checkout orchestrator.
    pub fn new(orders: O, stock: S, payment: P) -> Self {
        Self {
            orders,
            stock,
            payment,
        }
    }

    /// Checks out order `order_id`.
    #[tracing::instrument(skip(self))]
    pub async fn checkout(&self, order_id: &str) -> CheckoutReport {
        metrics::counter!("checkout_total").increment(1);
        let started = Instant::now();

        let mut trail = Vec::new();
        let outcome = self.run(order_id, &mut trail).await;

        let duration = started.elapsed().as_secs_f64();
        metrics::histogram!("checkout_duration_seconds").record(duration);

        let stage = match &outcome {
            Ok(result) => {
                metrics::counter!("checkout_completed_total").increment(1);
                tracing::info!(?result, duration, "checkout completed");
                CheckoutStage::Done
            }
            Err(e) => {
                metrics::counter!("checkout_failed_total", "stage" => e.stage_label())
                    .increment(1);
                match e.status() {
                    Status::ClientError => tracing::info!(error = %e, "checkout rejected"),
                    _ => tracing::warn!(error = %e, "checkout failed"),
                }
                CheckoutStage::Failed
            }
        };

        CheckoutReport {
            order_id: order_id.to_string(),
            stage,
            trail,
            outcome,
        }
    }

    async fn run(&self, order_id: &str, trail: &mut Vec<StageRecord>) -> Result<CheckoutOutcome> {
        let order = self
            .orders
            .find_order(order_id)
            .await
            .map_err(CheckoutError::OrderLookup)?;

        if order.paid {
            tracing::info!("order already paid");
            return Ok(CheckoutOutcome::AlreadyPaid);
        }
        if !order.has_items() {
            return Err(CheckoutError::EmptyOrder(order_id.to_string()));
        }

        let quantities = order.item_quantities();

        // Step 1: reserve stock
        let reserved = self.stock.remove_stock_bulk(&quantities, order_id).await;
        record(trail, CheckoutStage::ReservingStock, &reserved);
        if let Err(e) = reserved {
            // A server error may hide a reservation that did land.
            if e.status() == Status::ServerError {
                self.compensate_stock(order_id, &quantities, trail).await;
            }
            return Err(CheckoutError::StepFailed {
                stage: CheckoutStage::ReservingStock,
                source: e,
            });
        }

        // Step 2: charge the user
        let charged = self
            .payment
            .remove_credit(&order.user_id, order.total_cost, order_id)
            .await;
        record(trail, CheckoutStage::ChargingPayment, &charged);
        if let Err(e) = charged {
            if e.status() == Status::ServerError {
                self.compensate_payment(order_id, &order.user_id, order.total_cost, trail)
                    .await;
            }
            self.compensate_stock(order_id, &quantities, trail).await;
            return Err(CheckoutError::StepFailed {
                stage: CheckoutStage::ChargingPayment,
                source: e,
            });
        }

        // Step 3: mark the order paid
        let confirmed = self.orders.confirm_order(order_id, &order.as_paid()).await;
        record(trail, CheckoutStage::ConfirmingOrder, &confirmed);
        if let Err(e) = confirmed {
            metrics::counter!("checkout_inconsistencies_total").increment(1);
            tracing::error!(
                error = %e,
                user_id = %order.user_id,
                total_cost = order.total_cost,
                "order charged but not confirmed, manual resolution required"
            );
            return Err(CheckoutError::Inconsistent {
                order_id: order_id.to_string(),
                source: e,
            });
        }

        Ok(CheckoutOutcome::Completed)
    }

    async fn compensate_stock(
        &self,
        order_id: &str,
        quantities: &BTreeMap<String, i64>,
        trail: &mut Vec<StageRecord>,
    ) {
        let result = self.stock.add_stock_bulk(quantities, order_id, true).await;
        record(trail, CheckoutStage::CompensatingStock, &result);
        if let Err(e) = result {
            compensation_failed(CheckoutStage::CompensatingStock, &e);
        }
    }

    async fn compensate_payment(
        &self,
        order_id: &str,
        user_id: &str,
        amount: i64,
        trail: &mut Vec<StageRecord>,
    ) {
        let result = self.payment.add_funds(user_id, amount, order_id, true).await;
        record(trail, CheckoutStage::CompensatingPayment, &result);
        if let Err(e) = result {
            compensation_failed(CheckoutStage::CompensatingPayment, &e);
        }
    }
}

fn record(
    trail: &mut Vec<StageRecord>,
    stage: CheckoutStage,
    result: &std::result::Result<(), ServiceError>,
) {
    let outcome = match result {
        Ok(()) => StageOutcome::Succeeded,
        Err(e) => StageOutcome::Failed(e.to_string()),
    };
    tracing::debug!(%stage, ?outcome, "checkout stage finished");
    trail.push(StageRecord { stage, outcome });
}

fn compensation_failed(stage: CheckoutStage, error: &ServiceError) {
    metrics::counter!("checkout_compensation_failed_total", "stage" => stage.as_str()).increment(1);
    tracing::error!(%stage, %error, "compensation failed");
}
