//! Newtype identifiers. Kept as thin wrappers (never raw integers) so a
//! caller can't accidentally pass a `TokenId` where an `Idx` is expected.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Dense, monotonically-assigned account identifier. `0` and `1` are
/// reserved (`1` is the exit pseudo-account); user accounts start at `256`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Idx(u64);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdxError {
    #[error("idx {0} exceeds the 48-bit wire width")]
    TooWide(u64),
}

impl Idx {
    /// `idx = 0`: never a valid account, used as a "no account" sentinel.
    pub const NULL: Idx = Idx(0);
    /// `idx = 1`: the special exit pseudo-account.
    pub const EXIT: Idx = Idx(1);
    /// First non-reserved account index.
    pub const FIRST_USER: Idx = Idx(256);

    pub fn new(value: u64) -> Result<Self, IdxError> {
        if value >> 48 != 0 {
            return Err(IdxError::TooWide(value));
        }
        Ok(Idx(value))
    }

    pub fn get(self) -> u64 {
        self.0
    }

    pub fn is_reserved(self) -> bool {
        self.0 < Idx::FIRST_USER.0
    }

    pub fn next(self) -> Result<Self, IdxError> {
        Idx::new(self.0 + 1)
    }
}

impl std::fmt::Display for Idx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which fungible token an account holds, or a transaction moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TokenId(pub u32);

/// Strictly-monotonic per-account L2 tx counter, 40 bits wide on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Nonce(u64);

impl Nonce {
    pub const ZERO: Nonce = Nonce(0);

    pub fn new(value: u64) -> Result<Self, IdxError> {
        if value >> 40 != 0 {
            return Err(IdxError::TooWide(value));
        }
        Ok(Nonce(value))
    }

    pub fn get(self) -> u64 {
        self.0
    }

    pub fn next(self) -> Result<Self, IdxError> {
        Nonce::new(self.0 + 1)
    }
}

/// 20-byte L1 address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EthAddr(pub [u8; 20]);

impl EthAddr {
    pub const ZERO: EthAddr = EthAddr([0u8; 20]);
}

/// Compressed Baby-JubJub public key, hermez `(sign, ay)` wire form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BjjCompressed(pub [u8; 32]);

impl BjjCompressed {
    pub const ZERO: BjjCompressed = BjjCompressed([0u8; 32]);
}

/// A batch's sequence number; strictly monotonic across the core's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BatchNum(pub u64);

impl BatchNum {
    pub const GENESIS: BatchNum = BatchNum(0);

    pub fn next(self) -> BatchNum {
        BatchNum(self.0 + 1)
    }
}

impl std::fmt::Display for BatchNum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies an atomic group of L2 txs that must be forged together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AtomicGroupId(pub [u8; 32]);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idx_rejects_values_above_48_bits() {
        assert!(Idx::new(1u64 << 48).is_err());
        assert!(Idx::new((1u64 << 48) - 1).is_ok());
    }

    #[test]
    fn reserved_range_is_0_to_255() {
        assert!(Idx::NULL.is_reserved());
        assert!(Idx::EXIT.is_reserved());
        assert!(Idx::new(255).unwrap().is_reserved());
        assert!(!Idx::FIRST_USER.is_reserved());
    }

    #[test]
    fn nonce_rejects_values_above_40_bits() {
        assert!(Nonce::new(1u64 << 40).is_err());
        assert!(Nonce::new((1u64 << 40) - 1).is_ok());
    }
}
