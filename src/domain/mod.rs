pub mod money;
pub mod order;
pub mod ports;
pub mod transaction;
pub mod user;
