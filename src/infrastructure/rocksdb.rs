use crate::domain::money::MinorAmount;
use crate::domain::order::{NewOrder, Order, OrderId, OrderKind, OrderStatus};
use crate::domain::ports::LedgerStore;
use crate::domain::transaction::{TxKind, TxRecord};
use crate::domain::user::{ExternalId, User, UserId};
use crate::error::{LedgerError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Column Family for user records keyed by internal id.
pub const CF_USERS: &str = "users";
/// Column Family mapping external ids to internal ids.
pub const CF_USERS_BY_EXTERNAL: &str = "users_by_external";
/// Column Family for the append-only transaction log.
pub const CF_TRANSACTIONS: &str = "transactions";
/// Column Family for order records.
pub const CF_ORDERS: &str = "orders";

/// A persistent ledger store backed by RocksDB.
///
/// Values are JSON via serde_json; the balance write and the log append
/// of `apply_transaction` go through a single `WriteBatch` so the pair
/// commits atomically. `Clone` shares the underlying `Arc<DB>`.
#[derive(Clone)]
pub struct RocksDbLedgerStore {
    db: Arc<DB>,
    next_user: Arc<AtomicU64>,
    next_tx: Arc<AtomicU64>,
    next_order: Arc<AtomicU64>,
    // Guards the check-then-insert of user creation; all other writes
    // are serialized per user by the transaction engine.
    create_lock: Arc<Mutex<()>>,
}

impl RocksDbLedgerStore {
    /// Opens or creates the database, recovering the id counters from
    /// the highest keys present.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cfs = [CF_USERS, CF_USERS_BY_EXTERNAL, CF_TRANSACTIONS, CF_ORDERS]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()));
        let db = DB::open_cf_descriptors(&opts, path, cfs)?;

        let next_user = last_key(&db, CF_USERS)?;
        let next_tx = last_key(&db, CF_TRANSACTIONS)?;
        let next_order = last_key(&db, CF_ORDERS)?;

        Ok(Self {
            db: Arc::new(db),
            next_user: Arc::new(AtomicU64::new(next_user)),
            next_tx: Arc::new(AtomicU64::new(next_tx)),
            next_order: Arc::new(AtomicU64::new(next_order)),
            create_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| LedgerError::Storage(format!("column family {name} not found")))
    }

    fn load_user(&self, id: UserId) -> Result<Option<User>> {
        let cf = self.cf(CF_USERS)?;
        match self.db.get_pinned_cf(cf, id.0.to_be_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn load_order(&self, id: OrderId) -> Result<Option<Order>> {
        let cf = self.cf(CF_ORDERS)?;
        match self.db.get_pinned_cf(cf, id.0.to_be_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put_order(&self, order: &Order) -> Result<()> {
        let cf = self.cf(CF_ORDERS)?;
        self.db
            .put_cf(cf, order.id.0.to_be_bytes(), serde_json::to_vec(order)?)?;
        Ok(())
    }
}

fn last_key(db: &DB, cf_name: &str) -> Result<u64> {
    let cf = db
        .cf_handle(cf_name)
        .ok_or_else(|| LedgerError::Storage(format!("column family {cf_name} not found")))?;
    let Some(entry) = db.iterator_cf(cf, IteratorMode::End).next() else {
        return Ok(0);
    };
    let (key, _) = entry?;
    let bytes: [u8; 8] = key
        .as_ref()
        .try_into()
        .map_err(|_| LedgerError::Storage(format!("malformed key in {cf_name}")))?;
    Ok(u64::from_be_bytes(bytes))
}

#[async_trait]
impl LedgerStore for RocksDbLedgerStore {
    async fn get_or_create_user(
        &self,
        external_id: ExternalId,
        display_name: &str,
        referrer: Option<ExternalId>,
    ) -> Result<UserId> {
        let index_cf = self.cf(CF_USERS_BY_EXTERNAL)?;
        let index_key = external_id.0.to_be_bytes();

        let _guard = self
            .create_lock
            .lock()
            .map_err(|_| LedgerError::Storage("user creation lock poisoned".into()))?;
        if let Some(bytes) = self.db.get_pinned_cf(index_cf, index_key)? {
            let raw: [u8; 8] = bytes
                .as_ref()
                .try_into()
                .map_err(|_| LedgerError::Storage("malformed user index entry".into()))?;
            return Ok(UserId(u64::from_be_bytes(raw)));
        }

        let id = UserId(self.next_user.fetch_add(1, Ordering::SeqCst) + 1);
        let user = User::new(id, external_id, display_name, referrer);

        let mut batch = WriteBatch::default();
        batch.put_cf(self.cf(CF_USERS)?, id.0.to_be_bytes(), serde_json::to_vec(&user)?);
        batch.put_cf(index_cf, index_key, id.0.to_be_bytes());
        self.db.write(batch)?;
        Ok(id)
    }

    async fn get_user(&self, external_id: ExternalId) -> Result<Option<User>> {
        let index_cf = self.cf(CF_USERS_BY_EXTERNAL)?;
        let Some(bytes) = self.db.get_pinned_cf(index_cf, external_id.0.to_be_bytes())? else {
            return Ok(None);
        };
        let raw: [u8; 8] = bytes
            .as_ref()
            .try_into()
            .map_err(|_| LedgerError::Storage("malformed user index entry".into()))?;
        self.load_user(UserId(u64::from_be_bytes(raw)))
    }

    async fn get_balance(&self, user: UserId) -> Result<MinorAmount> {
        Ok(self
            .load_user(user)?
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
        let Some(mut account) = self.load_user(user)? else {
            return Ok(false);
        };
        if amount.is_debit() && account.balance + amount < MinorAmount::ZERO {
            return Ok(false);
        }
        account.balance += amount;

        let seq = self.next_tx.fetch_add(1, Ordering::SeqCst) + 1;
        let record = TxRecord::new(user, amount, kind, details);

        // Balance write and log append commit together or not at all.
        let mut batch = WriteBatch::default();
        batch.put_cf(
            self.cf(CF_USERS)?,
            user.0.to_be_bytes(),
            serde_json::to_vec(&account)?,
        );
        batch.put_cf(
            self.cf(CF_TRANSACTIONS)?,
            seq.to_be_bytes(),
            serde_json::to_vec(&record)?,
        );
        self.db.write(batch)?;
        Ok(true)
    }

    async fn list_transactions(&self, user: UserId) -> Result<Vec<TxRecord>> {
        let cf = self.cf(CF_TRANSACTIONS)?;
        let mut records = Vec::new();
        // Keys are the append sequence, so reverse iteration yields
        // most-recent-first.
        for entry in self.db.iterator_cf(cf, IteratorMode::End) {
            let (_, value) = entry?;
            let record: TxRecord = serde_json::from_slice(&value)?;
            if record.user == user {
                records.push(record);
            }
        }
        Ok(records)
    }

    async fn insert_order(&self, order: NewOrder) -> Result<Order> {
        let id = OrderId(self.next_order.fetch_add(1, Ordering::SeqCst) + 1);
        let order = Order {
            id,
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
        self.put_order(&order)?;
        Ok(order)
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        self.load_order(id)
    }

    async fn set_order_status(&self, id: OrderId, status: OrderStatus) -> Result<()> {
        let mut order = self
            .load_order(id)?
            .ok_or_else(|| LedgerError::Storage(format!("order {id} not found")))?;
        order.status = status;
        self.put_order(&order)
    }

    async fn set_order_expiry(&self, id: OrderId, expires_at: DateTime<Utc>) -> Result<()> {
        let mut order = self
            .load_order(id)?
            .ok_or_else(|| LedgerError::Storage(format!("order {id} not found")))?;
        order.expires_at = Some(expires_at);
        self.put_order(&order)
    }

    async fn list_orders(&self, user: UserId, kind: OrderKind) -> Result<Vec<Order>> {
        let cf = self.cf(CF_ORDERS)?;
        let mut orders = Vec::new();
        for entry in self.db.iterator_cf(cf, IteratorMode::End) {
            let (_, value) = entry?;
            let order: Order = serde_json::from_slice(&value)?;
            if order.user == user && order.kind == kind {
                orders.push(order);
            }
        }
        Ok(orders)
    }
}
