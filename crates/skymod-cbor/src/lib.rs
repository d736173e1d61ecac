//! Deterministic CBOR helpers, multiformats varints and content identifiers
//! used to read atproto repositories.

pub mod cid;
pub mod doc;
pub mod varint;

pub use cid::{Cid, CidError, DAG_CBOR, DAG_PB, RAW, SHA2_256};
pub use doc::{DecodeError, Document, ShapeError, guard_decode};
pub use varint::{VarintError, read_uvarint, write_uvarint};

use serde::Serialize;
use serde_cbor::value::Value as CborValue;

/// Serialize a value into deterministic DAG-CBOR bytes: map keys sorted
/// length-first then bytewise, no self-describe tag.
pub fn to_dag_cbor<T: Serialize>(value: &T) -> Result<Vec<u8>, serde_cbor::Error> {
    let mut buf = Vec::with_capacity(256);
    write_dag_cbor(value, &mut buf)?;
    Ok(buf)
}

/// Serialize a value directly into an arbitrary CBOR writer.
pub fn write_dag_cbor<T: Serialize, W>(value: &T, writer: W) -> Result<(), serde_cbor::Error>
where
    W: serde_cbor::ser::Write,
{
    // Round-tripping through `Value` sorts map keys into canonical order.
    let canonical_value: CborValue = serde_cbor::value::to_value(value)?;
    let mut serializer = serde_cbor::ser::Serializer::new(writer);
    canonical_value.serialize(&mut serializer)
}
