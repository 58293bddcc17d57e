use common::AggregateId;

use super::Wallet;
use crate::error::Result;
use crate::ledger::Mutation;
use crate::store::AggregateStore;

/// Payment operations over an [`AggregateStore`].
#[derive(Clone)]
pub struct PaymentService {
    store: AggregateStore<Wallet>,
}

impl PaymentService {
    pub fn new(store: AggregateStore<Wallet>) -> Self {
        Self { store }
    }

    /// Creates a user with zero credit and returns its id.
    #[tracing::instrument(skip(self))]
    pub async fn create_user(&self) -> Result<String> {
        let user_id = AggregateId::new().into_string();
        self.store.put(&user_id, &Wallet::default()).await?;
        tracing::info!(%user_id, "user created");
        Ok(user_id)
    }

    pub async fn find_user(&self, user_id: &str) -> Result<Wallet> {
        self.store.read(user_id).await
    }

    /// Credits `amount`, once per `key`. A compensating call refunds the
    /// charge made earlier under the same key, at most once.
    #[tracing::instrument(skip(self))]
    pub async fn add_funds(
        &self,
        user_id: &str,
        amount: i64,
        key: &str,
        compensation: bool,
    ) -> Result<i64> {
        self.store
            .mutate(user_id, amount, &Mutation::add(key).compensating(compensation))
            .await
    }

    /// Charges `amount`, once per `key`.
    #[tracing::instrument(skip(self))]
    pub async fn remove_credit(&self, user_id: &str, amount: i64, key: &str) -> Result<i64> {
        self.store
            .mutate(user_id, amount, &Mutation::sub(key))
            .await
    }
}
