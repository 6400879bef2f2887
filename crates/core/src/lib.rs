//! The coordinator core: `StateDB`, `TxProcessor`, `TxSelector` and
//! `BatchBuilder`, wired together the way a zk-rollup node drives them in
//! sequence to forge one batch at a time.

pub mod batch_builder;
pub mod error;
pub mod interfaces;
pub mod statedb;
pub mod tx_processor;
pub mod tx_selector;

pub use batch_builder::{BatchBuilder, BuiltBatch};
pub use error::CoordinatorError;
pub use statedb::StateDB;
