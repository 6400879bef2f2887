//! Wire and data model for the rollup coordinator core: accounts, L1/L2
//! transactions, creation authorizations, and the `ZKInputs` witness shape.
//! Pure data — no storage, no state-transition logic. That lives in
//! `rollup_core`.

pub mod account;
pub mod auth;
pub mod confirmed_batch;
pub mod ids;
pub mod l1_tx;
pub mod l2_tx;
pub mod zk_inputs;

pub use account::Account;
pub use auth::AccountCreationAuth;
pub use confirmed_batch::ConfirmedBatch;
pub use l1_tx::{L1Origin, L1Tx, L1TxType};
pub use l2_tx::{AtomicRequest, L2Tx, L2TxType};
pub use zk_inputs::ZKInputs;
