#![allow(dead_code)]

use async_trait::async_trait;
use simledger::application::catalog::CatalogCache;
use simledger::application::engine::TransactionEngine;
use simledger::application::orchestrator::PurchaseOrchestrator;
use simledger::domain::money::MinorAmount;
use simledger::domain::order::CountryCode;
use simledger::domain::ports::{
    Acquisition, CatalogProvider, Country, NotificationSink, PriceEntry, ProviderError,
    ProviderResult, ProvisionStatus, ProvisioningClient, StoreRef,
};
use simledger::domain::user::{ExternalId, UserId};
use simledger::error::LedgerError;
use simledger::infrastructure::in_memory::InMemoryLedgerStore;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

pub const TG: &str = "tg";
pub const RU: CountryCode = CountryCode(7);
pub const BUYER: ExternalId = ExternalId(1001);

/// A catalog with one country and a fixed price list.
pub struct FixedCatalog {
    prices: HashMap<String, PriceEntry>,
}

impl FixedCatalog {
    pub fn with_price(service: &str, cost_minor: i64) -> Self {
        Self {
            prices: HashMap::from([(
                service.to_string(),
                PriceEntry {
                    cost: MinorAmount::new(cost_minor),
                    available: 10,
                },
            )]),
        }
    }
}

#[async_trait]
impl CatalogProvider for FixedCatalog {
    async fn get_countries(&self) -> ProviderResult<Vec<Country>> {
        Ok(vec![Country {
            id: RU,
            display_name: "Russia".into(),
        }])
    }

    async fn get_prices(&self, country: CountryCode) -> ProviderResult<HashMap<String, PriceEntry>> {
        if country == RU {
            Ok(self.prices.clone())
        } else {
            Err(ProviderError::Business("unknown country".into()))
        }
    }
}

/// A store whose refund writes fail, simulating the ledger becoming
/// unavailable between a debit and its compensating credit.
pub struct RefundFailingStore {
    inner: InMemoryLedgerStore,
}

impl RefundFailingStore {
    pub fn new() -> Self {
        Self {
            inner: InMemoryLedgerStore::new(),
        }
    }
}

#[async_trait]
impl simledger::domain::ports::LedgerStore for RefundFailingStore {
    async fn get_or_create_user(
        &self,
        external_id: ExternalId,
        display_name: &str,
        referrer: Option<ExternalId>,
    ) -> simledger::error::Result<UserId> {
        self.inner
            .get_or_create_user(external_id, display_name, referrer)
            .await
    }

    async fn get_user(
        &self,
        external_id: ExternalId,
    ) -> simledger::error::Result<Option<simledger::domain::user::User>> {
        self.inner.get_user(external_id).await
    }

    async fn get_balance(&self, user: UserId) -> simledger::error::Result<MinorAmount> {
        self.inner.get_balance(user).await
    }

    async fn apply_transaction(
        &self,
        user: UserId,
        amount: MinorAmount,
        kind: simledger::domain::transaction::TxKind,
        details: &str,
    ) -> simledger::error::Result<bool> {
        if kind == simledger::domain::transaction::TxKind::Refund {
            return Err(LedgerError::Storage("write failed: disk unavailable".into()));
        }
        self.inner.apply_transaction(user, amount, kind, details).await
    }

    async fn list_transactions(
        &self,
        user: UserId,
    ) -> simledger::error::Result<Vec<simledger::domain::transaction::TxRecord>> {
        self.inner.list_transactions(user).await
    }

    async fn insert_order(
        &self,
        order: simledger::domain::order::NewOrder,
    ) -> simledger::error::Result<simledger::domain::order::Order> {
        self.inner.insert_order(order).await
    }

    async fn get_order(
        &self,
        id: simledger::domain::order::OrderId,
    ) -> simledger::error::Result<Option<simledger::domain::order::Order>> {
        self.inner.get_order(id).await
    }

    async fn set_order_status(
        &self,
        id: simledger::domain::order::OrderId,
        status: simledger::domain::order::OrderStatus,
    ) -> simledger::error::Result<()> {
        self.inner.set_order_status(id, status).await
    }

    async fn set_order_expiry(
        &self,
        id: simledger::domain::order::OrderId,
        expires_at: chrono::DateTime<chrono::Utc>,
    ) -> simledger::error::Result<()> {
        self.inner.set_order_expiry(id, expires_at).await
    }

    async fn list_orders(
        &self,
        user: UserId,
        kind: simledger::domain::order::OrderKind,
    ) -> simledger::error::Result<Vec<simledger::domain::order::Order>> {
        self.inner.list_orders(user, kind).await
    }
}

/// A provisioning client driven by scripted responses.
///
/// Queues are popped front-first; an empty acquisition queue fails with a
/// transport error, an empty status queue reports `Pending` (the steady
/// state while waiting for a code), an empty extension queue succeeds.
#[derive(Default)]
pub struct ScriptedProvisioning {
    pub acquisitions: Mutex<VecDeque<ProviderResult<Acquisition>>>,
    pub statuses: Mutex<VecDeque<ProviderResult<ProvisionStatus>>>,
    pub extensions: Mutex<VecDeque<ProviderResult<()>>>,
    pub cancel_errors: Mutex<VecDeque<ProviderError>>,
    pub acks: Mutex<Vec<i64>>,
    pub cancels: Mutex<Vec<i64>>,
}

impl ScriptedProvisioning {
    pub fn push_acquire_ok(&self, provider_order_id: i64, phone: &str) {
        self.acquisitions.lock().unwrap().push_back(Ok(Acquisition {
            provider_order_id,
            phone_number: phone.to_string(),
        }));
    }

    pub fn push_acquire_err(&self, err: ProviderError) {
        self.acquisitions.lock().unwrap().push_back(Err(err));
    }

    pub fn push_status(&self, status: ProviderResult<ProvisionStatus>) {
        self.statuses.lock().unwrap().push_back(status);
    }

    pub fn push_extension(&self, result: ProviderResult<()>) {
        self.extensions.lock().unwrap().push_back(result);
    }

    pub fn push_cancel_err(&self, err: ProviderError) {
        self.cancel_errors.lock().unwrap().push_back(err);
    }
}

#[async_trait]
impl ProvisioningClient for ScriptedProvisioning {
    async fn acquire_number(
        &self,
        _service: &str,
        _country: CountryCode,
    ) -> ProviderResult<Acquisition> {
        self.acquisitions
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::Transport("connection reset".into())))
    }

    async fn rent_number(
        &self,
        service: &str,
        country: CountryCode,
        _days: u32,
    ) -> ProviderResult<Acquisition> {
        self.acquire_number(service, country).await
    }

    async fn extend_rental(&self, _provider_order_id: i64, _days: u32) -> ProviderResult<()> {
        self.extensions
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(()))
    }

    async fn get_status(&self, _provider_order_id: i64) -> ProviderResult<ProvisionStatus> {
        self.statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(ProvisionStatus::Pending))
    }

    async fn acknowledge_completion(&self, provider_order_id: i64) -> ProviderResult<()> {
        self.acks.lock().unwrap().push(provider_order_id);
        Ok(())
    }

    async fn cancel(&self, provider_order_id: i64) -> ProviderResult<()> {
        if let Some(err) = self.cancel_errors.lock().unwrap().pop_front() {
            return Err(err);
        }
        self.cancels.lock().unwrap().push(provider_order_id);
        Ok(())
    }
}

/// Captures notification payloads for assertion.
#[derive(Default)]
pub struct RecordingSink {
    pub messages: Mutex<Vec<(ExternalId, String)>>,
}

impl RecordingSink {
    pub fn contains(&self, needle: &str) -> bool {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .any(|(_, text)| text.contains(needle))
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn send(&self, user: ExternalId, text: &str) {
        self.messages
            .lock()
            .unwrap()
            .push((user, text.to_string()));
    }
}

/// A fully wired saga environment over the in-memory store.
pub struct World {
    pub store: StoreRef,
    pub engine: Arc<TransactionEngine>,
    pub provisioning: Arc<ScriptedProvisioning>,
    pub sink: Arc<RecordingSink>,
    pub orchestrator: PurchaseOrchestrator,
    pub buyer: ExternalId,
    pub user: UserId,
}

impl World {
    pub async fn balance(&self) -> MinorAmount {
        self.store.get_balance(self.user).await.unwrap()
    }
}

/// Builds a world where `BUYER` holds `balance_minor` and `TG` in `RU`
/// costs `price_minor`.
pub async fn world(balance_minor: i64, price_minor: i64) -> World {
    world_over(Arc::new(InMemoryLedgerStore::new()), balance_minor, price_minor).await
}

/// Same wiring over an arbitrary store implementation.
pub async fn world_over(store: StoreRef, balance_minor: i64, price_minor: i64) -> World {
    let user = store
        .get_or_create_user(BUYER, "buyer", None)
        .await
        .unwrap();

    let engine = Arc::new(TransactionEngine::new(Arc::clone(&store)));
    if balance_minor > 0 {
        assert!(
            engine
                .charge_or_deposit(
                    user,
                    MinorAmount::new(balance_minor),
                    simledger::domain::transaction::TxKind::Deposit,
                    "seed",
                )
                .await
                .unwrap()
        );
    }

    let catalog = Arc::new(CatalogCache::new(Arc::new(FixedCatalog::with_price(
        TG,
        price_minor,
    ))));
    let provisioning = Arc::new(ScriptedProvisioning::default());
    let sink = Arc::new(RecordingSink::default());
    let orchestrator = PurchaseOrchestrator::new(
        Arc::clone(&engine),
        catalog,
        provisioning.clone(),
        sink.clone(),
    );

    World {
        store,
        engine,
        provisioning,
        sink,
        orchestrator,
        buyer: BUYER,
        user,
    }
}
