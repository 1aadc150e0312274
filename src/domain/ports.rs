use crate::domain::money::MinorAmount;
use crate::domain::order::{CountryCode, NewOrder, Order, OrderId, OrderKind, OrderStatus};
use crate::domain::transaction::{TxKind, TxRecord};
use crate::domain::user::{ExternalId, User, UserId};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Failures of an external provider call.
///
/// `Business` carries a structured rejection from the provider ("no
/// numbers available"); `Transport` covers timeouts and malformed
/// responses. The orchestrator compensates identically for both.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("provider rejected request: {0}")]
    Business(String),
    #[error("provider transport failure: {0}")]
    Transport(String),
}

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Country {
    pub id: CountryCode,
    pub display_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceEntry {
    pub cost: MinorAmount,
    pub available: u32,
}

/// Result of a successful number acquisition or rental.
#[derive(Debug, Clone, PartialEq)]
pub struct Acquisition {
    pub provider_order_id: i64,
    pub phone_number: String,
}

/// Provider-reported state of an active order.
#[derive(Debug, Clone, PartialEq)]
pub enum ProvisionStatus {
    Pending,
    CodeReceived(String),
    /// The provider invites requesting a further code; polling of the
    /// same order continues with no additional charge.
    WaitRetry,
    Cancelled,
}

/// Durable storage of users, the transaction log and orders.
///
/// I/O faults are `Err`; business rejections (unknown user, insufficient
/// funds) are ordinary `false`/empty results.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Idempotent: an existing external id returns its internal id
    /// unchanged, first-write-wins on the profile fields.
    async fn get_or_create_user(
        &self,
        external_id: ExternalId,
        display_name: &str,
        referrer: Option<ExternalId>,
    ) -> Result<UserId>;

    async fn get_user(&self, external_id: ExternalId) -> Result<Option<User>>;

    /// Returns zero for an unknown user; a read-before-create is a normal
    /// race in concurrent handler dispatch.
    async fn get_balance(&self, user: UserId) -> Result<MinorAmount>;

    /// Atomically appends a log record and updates the materialized
    /// balance. Returns `Ok(false)` with no mutation when the user is
    /// unknown or a debit would drive the balance negative.
    ///
    /// Only [`TransactionEngine`](crate::application::engine::TransactionEngine)
    /// may call this.
    async fn apply_transaction(
        &self,
        user: UserId,
        amount: MinorAmount,
        kind: TxKind,
        details: &str,
    ) -> Result<bool>;

    /// Most recent first.
    async fn list_transactions(&self, user: UserId) -> Result<Vec<TxRecord>>;

    async fn insert_order(&self, order: NewOrder) -> Result<Order>;

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>>;

    async fn set_order_status(&self, id: OrderId, status: OrderStatus) -> Result<()>;

    async fn set_order_expiry(&self, id: OrderId, expires_at: DateTime<Utc>) -> Result<()>;

    /// Most recent first.
    async fn list_orders(&self, user: UserId, kind: OrderKind) -> Result<Vec<Order>>;
}

/// Country/service/price catalog of the provisioning vendor.
#[async_trait]
pub trait CatalogProvider: Send + Sync {
    async fn get_countries(&self) -> ProviderResult<Vec<Country>>;

    /// Prices keyed by service code for one country.
    async fn get_prices(&self, country: CountryCode) -> ProviderResult<HashMap<String, PriceEntry>>;
}

/// The SMS-provisioning vendor. Every call may fail with a transport
/// error at any time.
#[async_trait]
pub trait ProvisioningClient: Send + Sync {
    async fn acquire_number(
        &self,
        service: &str,
        country: CountryCode,
    ) -> ProviderResult<Acquisition>;

    async fn rent_number(
        &self,
        service: &str,
        country: CountryCode,
        days: u32,
    ) -> ProviderResult<Acquisition>;

    async fn extend_rental(&self, provider_order_id: i64, days: u32) -> ProviderResult<()>;

    async fn get_status(&self, provider_order_id: i64) -> ProviderResult<ProvisionStatus>;

    async fn acknowledge_completion(&self, provider_order_id: i64) -> ProviderResult<()>;

    async fn cancel(&self, provider_order_id: i64) -> ProviderResult<()>;
}

/// Delivery of user-facing event text; the core does not know how the
/// payloads are rendered or transported.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, user: ExternalId, text: &str);
}

pub type StoreRef = Arc<dyn LedgerStore>;
pub type CatalogRef = Arc<dyn CatalogProvider>;
pub type ProvisioningRef = Arc<dyn ProvisioningClient>;
pub type SinkRef = Arc<dyn NotificationSink>;
