use crate::domain::money::MinorAmount;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Platform-assigned identity of a user (e.g. a messenger account id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExternalId(pub i64);

/// Store-assigned internal user id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub u64);

impl fmt::Display for ExternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A ledger account holder.
///
/// `balance` is a materialized view over the transaction log; it is only
/// ever mutated together with a log append, and is never negative at a
/// committed state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub external_id: ExternalId,
    pub display_name: String,
    pub referrer: Option<ExternalId>,
    pub balance: MinorAmount,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(
        id: UserId,
        external_id: ExternalId,
        display_name: impl Into<String>,
        referrer: Option<ExternalId>,
    ) -> Self {
        Self {
            id,
            external_id,
            display_name: display_name.into(),
            referrer,
            balance: MinorAmount::ZERO,
            created_at: Utc::now(),
        }
    }
}
