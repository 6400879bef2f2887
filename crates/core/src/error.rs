//! The error-kind taxonomy of `spec.md` §7, one `thiserror::Error` enum per
//! component, composed into a top-level [`CoordinatorError`]. Nothing here
//! panics in non-test code, and nothing retries — `TxProcessor` returns
//! precise kinds; callers (`TxSelector`, `BatchBuilder`) decide whether to
//! absorb or propagate.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StateDbError {
    #[error("account {0} not found")]
    NotFound(u64),
    #[error("account {0} already exists")]
    AlreadyExists(u64),
    #[error("idx {0} exceeds 2^NLevels for this tree depth")]
    KeyTooBig(u64),
    #[error("idx {0} is reserved (0..255) and cannot be written via CreateAccount")]
    ReservedIdx(u64),
    #[error("checkpoint for batch {0} not found")]
    CheckpointNotFound(u64),
    #[error("checkpoint store is corrupt: {0}")]
    CheckpointCorrupt(String),
    #[error("key/value store I/O error: {0}")]
    Io(#[from] rocksdb::Error),
    #[error("(de)serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Rejected before touching state — the tx never leaves the selector, and
/// `BatchBuilder` never sees it (`spec.md` §7, "Structural").
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StructuralReason {
    #[error("malformed transaction: {0}")]
    Malformed(String),
    #[error("unknown token {0}")]
    UnknownToken(u32),
    #[error("signature verification failed")]
    InvalidSignature,
    #[error("tx expired: maxNumBatch {max_num_batch} < current batch {current_batch}")]
    MaxNumBatchExpired {
        max_num_batch: u64,
        current_batch: u64,
    },
    #[error("atomic group invariant violated: {0}")]
    AtomicGroupInvalid(String),
    #[error("amount is not representable in the (5,35) float encoding")]
    AmountNotRepresentable,
    #[error("account idx {0} is reserved and cannot be targeted")]
    ReservedIdx(u64),
}

/// The sender account exists and the tx is well-formed, but state at
/// processing time rejects it. The tx still consumes a batch slot
/// (`spec.md` §7, "State-conflict").
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConflictReason {
    #[error("nonce mismatch: tx has {tx_nonce}, account is at {account_nonce}")]
    NonceMismatch { tx_nonce: u64, account_nonce: u64 },
    #[error("insufficient balance: need {needed}, have {available}")]
    InsufficientBalance { needed: String, available: String },
    #[error("no account found for the requested destination")]
    NoSuchDestination,
    #[error("token mismatch: tx carries token {tx_token}, account holds {account_token}")]
    TokenMismatch { tx_token: u32, account_token: u32 },
}

/// The outcome of attempting to apply one tx, as `spec.md` §4.2's
/// "Failure model" defines it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TxRejection {
    #[error(transparent)]
    Structural(#[from] StructuralReason),
    #[error(transparent)]
    StateConflict(#[from] ConflictReason),
}

/// Why `TxSelector` declined to admit a candidate — surfaced to the pool
/// layer so it can expire or retry the tx (`spec.md` §4.3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscardReason {
    InsufficientBalance,
    InvalidNonce,
    MaxNumBatch,
    NoRecipient,
    AtomicGroupNotSelected,
    BudgetExhausted,
    Structural(StructuralReason),
}

#[derive(Error, Debug)]
pub enum TxProcessorError {
    #[error(transparent)]
    Rejected(#[from] TxRejection),
    #[error(transparent)]
    StateDb(#[from] StateDbError),
}

#[derive(Error, Debug)]
pub enum SelectorError {
    #[error(transparent)]
    StateDb(#[from] StateDbError),
}

#[derive(Error, Debug)]
pub enum BatchBuilderError {
    #[error("invariant violated, batch rolled back: {0}")]
    Invariant(String),
    #[error(transparent)]
    StateDb(#[from] StateDbError),
    #[error("unexpected tx-processor error for a tx the selector had already admitted: {0}")]
    UnexpectedTxFailure(#[from] TxProcessorError),
}

#[derive(Error, Debug)]
pub enum CoordinatorError {
    #[error(transparent)]
    StateDb(#[from] StateDbError),
    #[error(transparent)]
    TxProcessor(#[from] TxProcessorError),
    #[error(transparent)]
    Selector(#[from] SelectorError),
    #[error(transparent)]
    BatchBuilder(#[from] BatchBuilderError),
}
