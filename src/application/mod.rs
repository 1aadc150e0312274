//! Application layer: the transaction engine, the purchase saga and the
//! order-polling monitor, all working against the `domain::ports` traits.

pub mod catalog;
pub mod engine;
pub mod monitor;
pub mod orchestrator;
