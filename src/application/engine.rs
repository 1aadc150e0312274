use crate::domain::money::MinorAmount;
use crate::domain::ports::StoreRef;
use crate::domain::transaction::TxKind;
use crate::domain::user::UserId;
use crate::error::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// The single choke point for balance mutation.
///
/// Serializes concurrent charges against the same user with a per-user
/// async lock while leaving unrelated users free to proceed in parallel.
/// Refunds are ordinary credits with `TxKind::Refund`; there is exactly
/// one mutation path.
pub struct TransactionEngine {
    store: StoreRef,
    // One entry per user ever seen; never pruned, which is fine at this
    // scale and keeps lock identity stable.
    locks: Mutex<HashMap<UserId, Arc<Mutex<()>>>>,
}

impl TransactionEngine {
    pub fn new(store: StoreRef) -> Self {
        Self {
            store,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &StoreRef {
        &self.store
    }

    async fn user_lock(&self, user: UserId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        Arc::clone(locks.entry(user).or_default())
    }

    /// Applies a signed amount to the user's balance together with a log
    /// append.
    ///
    /// Returns `Ok(false)` without mutating anything when the user is
    /// unknown or a debit would drive the balance negative; that is an
    /// expected business condition, not an error. `Err` means the store
    /// could not persist the pair and nothing was applied.
    pub async fn charge_or_deposit(
        &self,
        user: UserId,
        amount: MinorAmount,
        kind: TxKind,
        details: &str,
    ) -> Result<bool> {
        let lock = self.user_lock(user).await;
        let _guard = lock.lock().await;

        let applied = self
            .store
            .apply_transaction(user, amount, kind, details)
            .await?;
        if applied {
            info!(%user, %amount, %kind, "transaction applied");
        } else {
            debug!(%user, %amount, %kind, "transaction rejected");
        }
        Ok(applied)
    }
}
