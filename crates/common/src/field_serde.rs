//! `serde` support for [`Field`], which carries none of its own — arkworks
//! field types implement `CanonicalSerialize`/`CanonicalDeserialize`
//! instead, not `serde::Serialize`. Encoded here as big-endian bytes, the
//! same encoding `StateDB` already uses for its on-disk root (see
//! `crate::statedb::encode_field` in `rollup_core`). Used via
//! `#[serde(with = "rollup_common::field_serde")]` on a bare `Field` field,
//! or `#[serde(with = "rollup_common::field_serde::vec")]` on a `Vec<Field>`.

use crate::Field;
use ark_ff::{BigInteger, PrimeField};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub fn serialize<S: Serializer>(field: &Field, serializer: S) -> Result<S::Ok, S::Error> {
    field.into_bigint().to_bytes_be().serialize(serializer)
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Field, D::Error> {
    let bytes = Vec::<u8>::deserialize(deserializer)?;
    Ok(Field::from_be_bytes_mod_order(&bytes))
}

pub mod vec {
    use super::*;
    use serde::ser::SerializeSeq;

    pub fn serialize<S: Serializer>(fields: &[Field], serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(fields.len()))?;
        for f in fields {
            seq.serialize_element(&f.into_bigint().to_bytes_be())?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Field>, D::Error> {
        let raw = Vec::<Vec<u8>>::deserialize(deserializer)?;
        Ok(raw.into_iter().map(|b| Field::from_be_bytes_mod_order(&b)).collect())
    }
}
