//! Traits for persisted domain entities.

use serde::{Serialize, de::DeserializeOwned};

use crate::error::DomainError;
use crate::ledger::UpdateLedger;

/// A record stored under its id in a key-value store.
pub trait Entity: Serialize + DeserializeOwned + Send + Sync {
    /// Human-readable entity name, used in errors and logs.
    fn kind() -> &'static str;
}

/// An entity holding a non-negative quantity guarded by an [`UpdateLedger`].
///
/// Stock items and wallets are both mutated this way: the quantity only
/// changes through [`crate::AggregateStore::mutate`] and friends, which
/// consult the ledger first and reject results below zero.
pub trait Ledgered: Entity {
    fn quantity(&self) -> i64;

    fn set_quantity(&mut self, quantity: i64);

    fn ledger(&self) -> &UpdateLedger;

    fn ledger_mut(&mut self) -> &mut UpdateLedger;

    /// Error reported when a mutation would drive entity `id` below zero.
    fn insufficient(id: &str) -> DomainError;
}
