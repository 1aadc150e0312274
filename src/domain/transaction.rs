use crate::domain::money::MinorAmount;
use crate::domain::user::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxKind {
    Deposit,
    Purchase,
    Rental,
    Refund,
}

impl TxKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxKind::Deposit => "deposit",
            TxKind::Purchase => "purchase",
            TxKind::Rental => "rental",
            TxKind::Refund => "refund",
        }
    }
}

impl fmt::Display for TxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable entry of the append-only transaction log.
///
/// Positive `amount` is a credit, negative a debit. The sum of a user's
/// records equals that user's current balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxRecord {
    pub user: UserId,
    pub amount: MinorAmount,
    pub kind: TxKind,
    pub details: String,
    pub created_at: DateTime<Utc>,
}

impl TxRecord {
    pub fn new(
        user: UserId,
        amount: MinorAmount,
        kind: TxKind,
        details: impl Into<String>,
    ) -> Self {
        Self {
            user,
            amount,
            kind,
            details: details.into(),
            created_at: Utc::now(),
        }
    }
}
