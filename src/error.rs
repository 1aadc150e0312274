use crate::domain::money::MinorAmount;
use crate::domain::user::UserId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LedgerError>;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[cfg(feature = "storage-rocksdb")]
    #[error("storage backend error: {0}")]
    Backend(#[from] rocksdb::Error),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    /// A compensating refund could not be persisted. The user has been
    /// debited without a matching order or refund; an operator must
    /// reconcile the ledger by hand.
    #[error("refund of {amount} to user {user} could not be applied ({reason}); manual reconciliation required")]
    ReconciliationRequired {
        user: UserId,
        amount: MinorAmount,
        reason: String,
    },
}
