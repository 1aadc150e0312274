use crate::domain::user::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Provider-side numeric country identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CountryCode(pub u16);

impl fmt::Display for CountryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Store-assigned order id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrderId(pub u64);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderKind {
    Purchase,
    Rental,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Active,
    Completed,
    Cancelled,
    Expired,
}

/// A leased virtual number and its lifecycle with the provisioning
/// provider.
///
/// An order only ever exists for a reservation that was both charged and
/// successfully provisioned; it is created `Active` and finalized by the
/// polling monitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user: UserId,
    pub provider_order_id: i64,
    pub service: String,
    pub country: CountryCode,
    pub phone_number: String,
    pub kind: OrderKind,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    /// Set for rentals only.
    pub expires_at: Option<DateTime<Utc>>,
}

/// Order fields supplied by the orchestrator; the store assigns the id,
/// the `Active` status and the creation timestamp.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user: UserId,
    pub provider_order_id: i64,
    pub service: String,
    pub country: CountryCode,
    pub phone_number: String,
    pub kind: OrderKind,
    pub expires_at: Option<DateTime<Utc>>,
}
