//! Typed access to entities in a key-value store.

use std::collections::BTreeMap;
use std::marker::PhantomData;

use store::StoreHandle;

use crate::aggregate::{Entity, Ledgered};
use crate::error::{DomainError, Result};
use crate::ledger::{Decision, Mutation};

/// Reads, writes and mutates entities of type `E` through a [`StoreHandle`].
///
/// Records are encoded with [`common::encode`] and stored under their id.
/// Mutations of [`Ledgered`] entities are idempotent per initiator: see
/// [`Mutation::decide`] for the rules.
pub struct AggregateStore<E> {
    handle: StoreHandle,
    _phantom: PhantomData<fn() -> E>,
}

impl<E> Clone for AggregateStore<E> {
    fn clone(&self) -> Self {
        Self {
            handle: self.handle.clone(),
            _phantom: PhantomData,
        }
    }
}

impl<E: Entity> AggregateStore<E> {
    pub fn new(handle: StoreHandle) -> Self {
        Self {
            handle,
            _phantom: PhantomData,
        }
    }

    /// Loads entity `id`, failing with [`DomainError::NotFound`] if absent.
    pub async fn read(&self, id: &str) -> Result<E> {
        match self.handle.get(id).await? {
            Some(bytes) => Ok(common::decode(&bytes)?),
            None => Err(not_found::<E>(id)),
        }
    }

    /// Loads several entities at once, in the order of `ids`.
    pub async fn read_bulk(&self, ids: &[String]) -> Result<Vec<Option<E>>> {
        self.handle
            .get_many(ids)
            .await?
            .into_iter()
            .map(|record| match record {
                Some(bytes) => Ok(Some(common::decode(&bytes)?)),
                None => Ok(None),
            })
            .collect()
    }

    /// Stores `entity` under `id`, replacing any previous record.
    pub async fn put(&self, id: &str, entity: &E) -> Result<()> {
        let bytes = common::encode(entity)?;
        self.handle.set(id, &bytes).await?;
        Ok(())
    }
}

impl<E: Ledgered> AggregateStore<E> {
    /// Applies `delta` to entity `id` and returns the resulting quantity.
    ///
    /// A replayed or redundant mutation returns the current quantity and
    /// writes nothing. A result below zero is rejected with the entity's
    /// insufficiency error, and a result outside `i64` with
    /// [`DomainError::InvalidAmount`]; neither writes anything.
    #[tracing::instrument(
        skip(self, mutation),
        fields(entity = E::kind(), op = %mutation.kind, initiator = %mutation.initiator)
    )]
    pub async fn mutate(&self, id: &str, delta: i64, mutation: &Mutation) -> Result<i64> {
        ensure_non_negative(delta)?;
        let mut entity = self.read(id).await?;

        let decision = mutation.decide(entity.ledger());
        if decision != Decision::Apply {
            record_skip::<E>(decision);
            tracing::debug!(?decision, "mutation skipped");
            return Ok(entity.quantity());
        }

        let updated = mutation
            .kind
            .apply(entity.quantity(), delta)
            .ok_or(DomainError::InvalidAmount(delta))?;
        if updated < 0 {
            return Err(E::insufficient(id));
        }

        entity.set_quantity(updated);
        entity.ledger_mut().record(mutation.token());
        self.put(id, &entity).await?;
        Ok(updated)
    }

    /// Applies every delta in `deltas` or none of them.
    ///
    /// Any missing id fails the batch with [`DomainError::NotFound`]. If the
    /// initiator already applied this kind to any of the entities the whole
    /// batch counts as a replay and is skipped. A compensating batch skips
    /// entities it was already applied to and entities whose ledger shows
    /// the forward operation never happened.
    ///
    /// The batch reads, computes and then writes in one bulk call, without
    /// guarding against a concurrent batch on overlapping ids in between.
    #[tracing::instrument(
        skip(self, deltas, mutation),
        fields(entity = E::kind(), op = %mutation.kind, initiator = %mutation.initiator, ids = deltas.len())
    )]
    pub async fn mutate_bulk(
        &self,
        deltas: &BTreeMap<String, i64>,
        mutation: &Mutation,
    ) -> Result<Decision> {
        for &delta in deltas.values() {
            ensure_non_negative(delta)?;
        }
        if deltas.is_empty() {
            return Ok(Decision::Apply);
        }

        let ids: Vec<String> = deltas.keys().cloned().collect();
        let records = self.read_bulk(&ids).await?;
        let mut entities = Vec::with_capacity(ids.len());
        for (id, record) in ids.iter().zip(records) {
            let entity = record.ok_or_else(|| not_found::<E>(id))?;
            entities.push((id, entity));
        }

        if !mutation.compensation
            && entities
                .iter()
                .any(|(_, entity)| mutation.decide(entity.ledger()) == Decision::Replay)
        {
            record_skip::<E>(Decision::Replay);
            tracing::debug!("bulk mutation replayed, skipping batch");
            return Ok(Decision::Replay);
        }

        let mut writes = Vec::with_capacity(entities.len());
        for (id, mut entity) in entities {
            if mutation.decide(entity.ledger()) != Decision::Apply {
                continue;
            }
            let delta = deltas[id];
            let updated = mutation
                .kind
                .apply(entity.quantity(), delta)
                .ok_or(DomainError::InvalidAmount(delta))?;
            if updated < 0 {
                return Err(E::insufficient(id));
            }
            entity.set_quantity(updated);
            entity.ledger_mut().record(mutation.token());
            writes.push((id.clone(), common::encode(&entity)?));
        }

        if writes.is_empty() {
            record_skip::<E>(Decision::NothingToUndo);
            tracing::debug!("bulk compensation has nothing to undo");
            return Ok(Decision::NothingToUndo);
        }

        self.handle.set_many(&writes).await?;
        Ok(Decision::Apply)
    }
}

fn not_found<E: Entity>(id: &str) -> DomainError {
    DomainError::NotFound {
        kind: E::kind(),
        id: id.to_string(),
    }
}

fn ensure_non_negative(amount: i64) -> Result<()> {
    if amount < 0 {
        return Err(DomainError::InvalidAmount(amount));
    }
    Ok(())
}

fn record_skip<E: Entity>(decision: Decision) {
    let reason = match decision {
        Decision::Replay => "replay",
        Decision::NothingToUndo => "nothing_to_undo",
        Decision::Apply => return,
    };
    metrics::counter!("mutations_skipped_total", "entity" => E::kind(), "reason" => reason)
        .increment(1);
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use common::RetryPolicy;
    use store::InMemoryKeyValueStore;

    use super::*;
    use crate::ledger::{LEDGER_CAPACITY, OpKind};
    use crate::stock::StockItem;

    fn setup() -> (AggregateStore<StockItem>, InMemoryKeyValueStore) {
        let backend = InMemoryKeyValueStore::new();
        let handle = StoreHandle::new(
            Arc::new(backend.clone()),
            RetryPolicy::bounded(3, Duration::from_millis(1)),
        );
        (AggregateStore::new(handle), backend)
    }

    async fn seed(store: &AggregateStore<StockItem>, id: &str, stock: i64) {
        let mut item = StockItem::new(10);
        item.stock = stock;
        store.put(id, &item).await.unwrap();
    }

    fn deltas(entries: &[(&str, i64)]) -> BTreeMap<String, i64> {
        entries
            .iter()
            .map(|(id, delta)| (id.to_string(), *delta))
            .collect()
    }

    #[tokio::test]
    async fn test_read_missing_is_not_found() {
        let (store, _) = setup();
        let result = store.read("nope").await;
        assert!(matches!(result, Err(DomainError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_read_bulk_preserves_order() {
        let (store, _) = setup();
        seed(&store, "a", 1).await;
        seed(&store, "b", 2).await;

        let items = store
            .read_bulk(&["b".to_string(), "x".to_string(), "a".to_string()])
            .await
            .unwrap();

        assert_eq!(items[0].as_ref().map(|i| i.stock), Some(2));
        assert!(items[1].is_none());
        assert_eq!(items[2].as_ref().map(|i| i.stock), Some(1));
    }

    #[tokio::test]
    async fn test_mutate_records_token() {
        let (store, _) = setup();
        seed(&store, "a", 5).await;

        let value = store.mutate("a", 2, &Mutation::sub("req-1")).await.unwrap();

        assert_eq!(value, 3);
        let item = store.read("a").await.unwrap();
        assert_eq!(item.stock, 3);
        assert_eq!(item.ledger.latest_for("req-1"), Some(OpKind::Sub));
    }

    #[tokio::test]
    async fn test_replayed_mutation_does_not_write() {
        let (store, backend) = setup();
        seed(&store, "a", 5).await;
        let mutation = Mutation::sub("req-1");

        store.mutate("a", 2, &mutation).await.unwrap();
        let writes = backend.write_count();
        let value = store.mutate("a", 2, &mutation).await.unwrap();

        assert_eq!(value, 3);
        assert_eq!(backend.write_count(), writes);
        assert_eq!(store.read("a").await.unwrap().stock, 3);
    }

    #[tokio::test]
    async fn test_mutate_rejects_negative_result() {
        let (store, backend) = setup();
        seed(&store, "a", 1).await;
        let writes = backend.write_count();

        let result = store.mutate("a", 2, &Mutation::sub("req-1")).await;

        assert!(matches!(result, Err(DomainError::InsufficientStock { .. })));
        assert_eq!(backend.write_count(), writes);
        assert!(store.read("a").await.unwrap().ledger.is_empty());
    }

    #[tokio::test]
    async fn test_mutate_rejects_negative_delta() {
        let (store, _) = setup();
        seed(&store, "a", 1).await;

        let result = store.mutate("a", -4, &Mutation::add("req-1")).await;
        assert!(matches!(result, Err(DomainError::InvalidAmount(-4))));
    }

    #[tokio::test]
    async fn test_invariant_holds_for_mixed_sequence() {
        let (store, _) = setup();
        seed(&store, "a", 0).await;

        let ops = [
            (OpKind::Add, 3),
            (OpKind::Sub, 5),
            (OpKind::Sub, 2),
            (OpKind::Add, 1),
            (OpKind::Sub, 2),
            (OpKind::Sub, 1),
        ];
        for (i, (kind, delta)) in ops.into_iter().enumerate() {
            let mutation = Mutation {
                kind,
                initiator: format!("req-{i}"),
                compensation: false,
            };
            let _ = store.mutate("a", delta, &mutation).await;
            assert!(store.read("a").await.unwrap().stock >= 0);
        }
        assert_eq!(store.read("a").await.unwrap().stock, 0);
    }

    #[tokio::test]
    async fn test_bulk_all_or_nothing() {
        let (store, backend) = setup();
        seed(&store, "a", 5).await;
        seed(&store, "b", 3).await;
        let writes = backend.write_count();

        let result = store
            .mutate_bulk(&deltas(&[("a", 2), ("b", 5)]), &Mutation::sub("order-x"))
            .await;

        assert!(matches!(result, Err(DomainError::InsufficientStock { ref item_id }) if item_id == "b"));
        assert_eq!(backend.write_count(), writes);
        assert_eq!(store.read("a").await.unwrap().stock, 5);
        assert_eq!(store.read("b").await.unwrap().stock, 3);
    }

    #[tokio::test]
    async fn test_bulk_missing_id_fails_without_write() {
        let (store, backend) = setup();
        seed(&store, "a", 5).await;
        let writes = backend.write_count();

        let result = store
            .mutate_bulk(&deltas(&[("a", 1), ("ghost", 1)]), &Mutation::sub("order-x"))
            .await;

        assert!(matches!(result, Err(DomainError::NotFound { .. })));
        assert_eq!(backend.write_count(), writes);
    }

    #[tokio::test]
    async fn test_bulk_replay_skips_whole_batch() {
        let (store, backend) = setup();
        seed(&store, "a", 5).await;
        seed(&store, "b", 5).await;
        let mutation = Mutation::sub("order-x");

        let first = store
            .mutate_bulk(&deltas(&[("a", 1), ("b", 2)]), &mutation)
            .await
            .unwrap();
        let writes = backend.write_count();
        let second = store
            .mutate_bulk(&deltas(&[("a", 1), ("b", 2)]), &mutation)
            .await
            .unwrap();

        assert_eq!(first, Decision::Apply);
        assert_eq!(second, Decision::Replay);
        assert_eq!(backend.write_count(), writes);
        assert_eq!(store.read("a").await.unwrap().stock, 4);
        assert_eq!(store.read("b").await.unwrap().stock, 3);
    }

    #[tokio::test]
    async fn test_bulk_compensation_is_guarded() {
        let (store, _) = setup();
        seed(&store, "a", 5).await;
        seed(&store, "b", 5).await;
        let batch = deltas(&[("a", 1), ("b", 2)]);
        let undo = Mutation::add("order-x").compensating(true);

        // Nothing was taken yet.
        assert_eq!(
            store.mutate_bulk(&batch, &undo).await.unwrap(),
            Decision::NothingToUndo
        );

        store
            .mutate_bulk(&batch, &Mutation::sub("order-x"))
            .await
            .unwrap();
        assert_eq!(store.mutate_bulk(&batch, &undo).await.unwrap(), Decision::Apply);
        assert_eq!(
            store.mutate_bulk(&batch, &undo).await.unwrap(),
            Decision::NothingToUndo
        );

        assert_eq!(store.read("a").await.unwrap().stock, 5);
        assert_eq!(store.read("b").await.unwrap().stock, 5);
    }

    async fn churn(store: &AggregateStore<StockItem>, id: &str, count: usize) {
        for i in 0..count {
            store
                .mutate(id, 1, &Mutation::sub(format!("other-{i}")))
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_redelivery_within_window_is_replay() {
        let (store, _) = setup();
        seed(&store, "hot", 100).await;
        let reserve = Mutation::sub("order-x");

        store.mutate_bulk(&deltas(&[("hot", 5)]), &reserve).await.unwrap();
        churn(&store, "hot", LEDGER_CAPACITY - 1).await;
        let redelivered = store
            .mutate_bulk(&deltas(&[("hot", 5)]), &reserve)
            .await
            .unwrap();

        assert_eq!(redelivered, Decision::Replay);
        assert_eq!(store.read("hot").await.unwrap().stock, 76);
    }

    #[tokio::test]
    async fn test_redelivery_beyond_window_applies_again() {
        let (store, _) = setup();
        seed(&store, "hot", 100).await;
        let reserve = Mutation::sub("order-x");

        store.mutate_bulk(&deltas(&[("hot", 5)]), &reserve).await.unwrap();
        churn(&store, "hot", LEDGER_CAPACITY).await;
        let redelivered = store
            .mutate_bulk(&deltas(&[("hot", 5)]), &reserve)
            .await
            .unwrap();

        assert_eq!(redelivered, Decision::Apply);
        assert_eq!(store.read("hot").await.unwrap().stock, 70);
    }

    #[tokio::test]
    async fn test_compensation_within_window_restores() {
        let (store, _) = setup();
        seed(&store, "hot", 100).await;
        let batch = deltas(&[("hot", 5)]);

        store.mutate_bulk(&batch, &Mutation::sub("order-x")).await.unwrap();
        churn(&store, "hot", LEDGER_CAPACITY - 1).await;
        let undo = Mutation::add("order-x").compensating(true);

        assert_eq!(store.mutate_bulk(&batch, &undo).await.unwrap(), Decision::Apply);
        assert_eq!(store.read("hot").await.unwrap().stock, 81);
    }

    #[tokio::test]
    async fn test_compensation_after_forward_token_evicted_restores() {
        let (store, _) = setup();
        seed(&store, "hot", 100).await;
        let batch = deltas(&[("hot", 5)]);

        store.mutate_bulk(&batch, &Mutation::sub("order-x")).await.unwrap();
        churn(&store, "hot", LEDGER_CAPACITY).await;
        let item = store.read("hot").await.unwrap();
        assert_eq!(item.stock, 75);
        assert_eq!(item.ledger.latest_for("order-x"), None);

        let undo = Mutation::add("order-x").compensating(true);
        assert_eq!(store.mutate_bulk(&batch, &undo).await.unwrap(), Decision::Apply);
        assert_eq!(store.read("hot").await.unwrap().stock, 80);

        // The compensation token is now the latest, so a redelivery is skipped.
        assert_eq!(
            store.mutate_bulk(&batch, &undo).await.unwrap(),
            Decision::NothingToUndo
        );
        assert_eq!(store.read("hot").await.unwrap().stock, 80);
    }

    #[tokio::test]
    async fn test_single_compensation_after_eviction_restores() {
        let (store, _) = setup();
        seed(&store, "hot", 100).await;

        store.mutate("hot", 5, &Mutation::sub("order-x")).await.unwrap();
        churn(&store, "hot", LEDGER_CAPACITY).await;
        let value = store
            .mutate("hot", 5, &Mutation::add("order-x").compensating(true))
            .await
            .unwrap();

        assert_eq!(value, 80);
    }

    #[tokio::test]
    async fn test_overflowing_add_is_rejected() {
        let (store, backend) = setup();
        seed(&store, "a", 5).await;
        let writes = backend.write_count();

        let single = store.mutate("a", i64::MAX, &Mutation::add("req-1")).await;
        let bulk = store
            .mutate_bulk(&deltas(&[("a", i64::MAX)]), &Mutation::add("req-2"))
            .await;

        assert!(matches!(single, Err(DomainError::InvalidAmount(i64::MAX))));
        assert!(matches!(bulk, Err(DomainError::InvalidAmount(i64::MAX))));
        assert_eq!(backend.write_count(), writes);
        let item = store.read("a").await.unwrap();
        assert_eq!(item.stock, 5);
        assert!(item.ledger.is_empty());
    }

    #[tokio::test]
    async fn test_bulk_store_unavailable() {
        let (store, backend) = setup();
        seed(&store, "a", 5).await;
        backend.set_unavailable(true);

        let result = store
            .mutate_bulk(&deltas(&[("a", 1)]), &Mutation::sub("order-x"))
            .await;

        assert!(matches!(result, Err(DomainError::Store(_))));
    }
}
