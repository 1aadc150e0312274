use crate::domain::money::MinorAmount;
use crate::domain::order::{NewOrder, Order, OrderId, OrderKind, OrderStatus};
use crate::domain::ports::LedgerStore;
use crate::domain::transaction::{TxKind, TxRecord};
use crate::domain::user::{ExternalId, User, UserId};
use crate::error::{LedgerError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct Inner {
    users: HashMap<UserId, User>,
    by_external: HashMap<ExternalId, UserId>,
    next_user: u64,
    // Chronological append order; listings reverse it.
    transactions: Vec<TxRecord>,
    orders: Vec<Order>,
    next_order: u64,
}

/// An in-memory ledger store behind a single `RwLock`.
///
/// The write-lock section is the atomic unit, so the balance write and
/// the log append in `apply_transaction` commit together. Used for tests
/// and for running without the `storage-rocksdb` feature.
#[derive(Default, Clone)]
pub struct InMemoryLedgerStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn get_or_create_user(
        &self,
        external_id: ExternalId,
        display_name: &str,
        referrer: Option<ExternalId>,
    ) -> Result<UserId> {
        let mut inner = self.inner.write().await;
        if let Some(id) = inner.by_external.get(&external_id) {
            return Ok(*id);
        }
        inner.next_user += 1;
        let id = UserId(inner.next_user);
        inner
            .users
            .insert(id, User::new(id, external_id, display_name, referrer));
        inner.by_external.insert(external_id, id);
        Ok(id)
    }

    async fn get_user(&self, external_id: ExternalId) -> Result<Option<User>> {
        let inner = self.inner.read().await;
        Ok(inner
            .by_external
            .get(&external_id)
            .and_then(|id| inner.users.get(id))
            .cloned())
    }

    async fn get_balance(&self, user: UserId) -> Result<MinorAmount> {
        let inner = self.inner.read().await;
        Ok(inner
            .users
            .get(&user)
            .map(|u| u.balance)
            .unwrap_or(MinorAmount::ZERO))
    }

    async fn apply_transaction(
        &self,
        user: UserId,
        amount: MinorAmount,
        kind: TxKind,
        details: &str,
    ) -> Result<bool> {
        let mut inner = self.inner.write().await;
        let Some(account) = inner.users.get_mut(&user) else {
            return Ok(false);
        };
        if amount.is_debit() && account.balance + amount < MinorAmount::ZERO {
            return Ok(false);
        }
        account.balance += amount;
        inner
            .transactions
            .push(TxRecord::new(user, amount, kind, details));
        Ok(true)
    }

    async fn list_transactions(&self, user: UserId) -> Result<Vec<TxRecord>> {
        let inner = self.inner.read().await;
        Ok(inner
            .transactions
            .iter()
            .filter(|tx| tx.user == user)
            .rev()
            .cloned()
            .collect())
    }

    async fn insert_order(&self, order: NewOrder) -> Result<Order> {
        let mut inner = self.inner.write().await;
        inner.next_order += 1;
        let order = Order {
            id: OrderId(inner.next_order),
            user: order.user,
            provider_order_id: order.provider_order_id,
            service: order.service,
            country: order.country,
            phone_number: order.phone_number,
            kind: order.kind,
            status: OrderStatus::Active,
            created_at: Utc::now(),
            expires_at: order.expires_at,
        };
        inner.orders.push(order.clone());
        Ok(order)
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        let inner = self.inner.read().await;
        Ok(inner.orders.iter().find(|o| o.id == id).cloned())
    }

    async fn set_order_status(&self, id: OrderId, status: OrderStatus) -> Result<()> {
        let mut inner = self.inner.write().await;
        let order = inner
            .orders
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or_else(|| LedgerError::Storage(format!("order {id} not found")))?;
        order.status = status;
        Ok(())
    }

    async fn set_order_expiry(&self, id: OrderId, expires_at: DateTime<Utc>) -> Result<()> {
        let mut inner = self.inner.write().await;
        let order = inner
            .orders
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or_else(|| LedgerError::Storage(format!("order {id} not found")))?;
        order.expires_at = Some(expires_at);
        Ok(())
    }

    async fn list_orders(&self, user: UserId, kind: OrderKind) -> Result<Vec<Order>> {
        let inner = self.inner.read().await;
        Ok(inner
            .orders
            .iter()
            .filter(|o| o.user == user && o.kind == kind)
            .rev()
            .cloned()
            .collect())
    }
}
