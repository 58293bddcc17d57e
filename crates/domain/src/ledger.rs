//! Per-entity idempotency ledger.
//!
//! Every successful mutation of a stock item or wallet records who asked for
//! it and in which direction. Messages are delivered at least once, so the
//! same request may arrive again; consulting the ledger before applying a
//! mutation turns the redelivery into a no-op.
//!
//! The ledger keeps the last [`LEDGER_CAPACITY`] tokens. A redelivery
//! arriving after its token has been evicted is applied again. A
//! compensation whose forward token has been evicted is still applied: the
//! ledger counts evictions, so it can tell "never happened" apart from
//! "forgotten".

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Number of operation tokens kept per entity.
pub const LEDGER_CAPACITY: usize = 20;

/// Direction of a quantity mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OpKind {
    Add,
    Sub,
}

impl OpKind {
    /// Returns the kind that undoes this one.
    pub fn opposite(self) -> Self {
        match self {
            OpKind::Add => OpKind::Sub,
            OpKind::Sub => OpKind::Add,
        }
    }

    /// Applies a non-negative `delta` to `value` in this direction.
    ///
    /// Returns `None` if the result does not fit in an `i64`.
    pub fn apply(self, value: i64, delta: i64) -> Option<i64> {
        match self {
            OpKind::Add => value.checked_add(delta),
            OpKind::Sub => value.checked_sub(delta),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OpKind::Add => "add",
            OpKind::Sub => "sub",
        }
    }
}

impl std::fmt::Display for OpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Records that `initiator` applied a mutation of `kind`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationToken {
    pub initiator: String,
    pub kind: OpKind,
}

/// Bounded log of the most recent operation tokens, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateLedger {
    entries: VecDeque<OperationToken>,
    /// Tokens dropped to stay within capacity.
    evicted: u64,
}

impl UpdateLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the kind of the most recent operation by `initiator`.
    pub fn latest_for(&self, initiator: &str) -> Option<OpKind> {
        self.entries
            .iter()
            .rev()
            .find(|token| token.initiator == initiator)
            .map(|token| token.kind)
    }

    /// Appends a token, evicting the oldest one when full.
    pub fn record(&mut self, token: OperationToken) {
        if self.entries.len() == LEDGER_CAPACITY {
            self.entries.pop_front();
            self.evicted += 1;
        }
        self.entries.push_back(token);
    }

    /// Returns how many tokens have been evicted over the ledger's lifetime.
    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &OperationToken> {
        self.entries.iter()
    }
}

/// What a mutation request asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mutation {
    pub kind: OpKind,
    /// Idempotency key: an order id, or the request's correlation id.
    pub initiator: String,
    /// Undoes an earlier mutation by the same initiator.
    pub compensation: bool,
}

/// Result of checking a [`Mutation`] against a ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The mutation should be applied and recorded.
    Apply,
    /// The initiator's latest operation already has this kind.
    Replay,
    /// A compensation that is already applied, or whose forward operation
    /// provably never took effect.
    NothingToUndo,
}

impl Mutation {
    pub fn add(initiator: impl Into<String>) -> Self {
        Self {
            kind: OpKind::Add,
            initiator: initiator.into(),
            compensation: false,
        }
    }

    pub fn sub(initiator: impl Into<String>) -> Self {
        Self {
            kind: OpKind::Sub,
            initiator: initiator.into(),
            compensation: false,
        }
    }

    /// Marks the mutation as a compensation.
    pub fn compensating(mut self, compensation: bool) -> Self {
        self.compensation = compensation;
        self
    }

    /// Decides whether this mutation takes effect on an entity with `ledger`.
    ///
    /// A forward mutation is a replay when the initiator's latest token has
    /// the same kind. A compensation is skipped when it already landed (its
    /// own kind is the initiator's latest token) or when the initiator has
    /// no token and the ledger never evicted one. With no token left after
    /// evictions the forward operation may have been forgotten, so the
    /// compensation applies.
    pub fn decide(&self, ledger: &UpdateLedger) -> Decision {
        let latest = ledger.latest_for(&self.initiator);
        if self.compensation {
            match latest {
                Some(kind) if kind == self.kind => Decision::NothingToUndo,
                Some(_) => Decision::Apply,
                None if ledger.evicted() == 0 => Decision::NothingToUndo,
                None => Decision::Apply,
            }
        } else if latest == Some(self.kind) {
            Decision::Replay
        } else {
            Decision::Apply
        }
    }

    pub fn token(&self) -> OperationToken {
        OperationToken {
            initiator: self.initiator.clone(),
            kind: self.kind,
        }
    }
}
