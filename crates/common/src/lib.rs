//! Shared primitives used by every component of the coordinator core:
//! the circuit's numeric encodings, Poseidon/Baby-JubJub cryptography, and
//! the frozen fee table. Nothing here is coordinator-state-aware — that
//! lives in `rollup_core`.

pub mod bjj;
pub mod eddsa;
pub mod fee;
pub mod field_serde;
pub mod float40;
pub mod keccak;
pub mod poseidon;

pub use ark_bn254::Fr as Field;
