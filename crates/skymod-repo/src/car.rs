//! CAR v1 archives: a DAG-CBOR header followed by length-prefixed
//! `cid ‖ block` sections.

use serde::{Deserialize, Serialize};
use serde_bytes::ByteBuf;
use skymod_cbor::{Cid, CidError, VarintError, read_uvarint, write_uvarint};

use crate::{BlockStore, MemBlockStore, StoreError};

const CAR_VERSION: u64 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarHeader {
    pub roots: Vec<Cid>,
}

#[derive(Serialize, Deserialize)]
struct HeaderData {
    version: u64,
    roots: Vec<ByteBuf>,
}

/// Parse a whole archive into its header and a verified block store.
pub fn read_car(bytes: &[u8]) -> Result<(CarHeader, MemBlockStore), CarError> {
    if bytes.is_empty() {
        return Err(CarError::Empty);
    }
    let (header_len, used) =
        read_uvarint(bytes).map_err(|source| CarError::Varint { offset: 0, source })?;
    let header_end = used
        .checked_add(header_len as usize)
        .filter(|end| *end <= bytes.len())
        .ok_or(CarError::Truncated { offset: 0 })?;
    let header: HeaderData =
        serde_cbor::from_slice(&bytes[used..header_end]).map_err(CarError::Header)?;
    if header.version != CAR_VERSION {
        return Err(CarError::UnsupportedVersion(header.version));
    }
    let roots = header
        .roots
        .iter()
        .map(|root| Cid::from_link_bytes(root))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| CarError::Cid { offset: used, source })?;
    if roots.is_empty() {
        return Err(CarError::NoRoots);
    }

    let mut store = MemBlockStore::new();
    let mut pos = header_end;
    while pos < bytes.len() {
        let offset = pos;
        let (section_len, used) = read_uvarint(&bytes[pos..])
            .map_err(|source| CarError::Varint { offset, source })?;
        pos += used;
        let end = pos
            .checked_add(section_len as usize)
            .filter(|end| *end <= bytes.len())
            .ok_or(CarError::Truncated { offset })?;
        let section = &bytes[pos..end];
        let (cid, cid_len) =
            Cid::read_prefix(section).map_err(|source| CarError::Cid { offset, source })?;
        store.put_block(cid, section[cid_len..].to_vec())?;
        pos = end;
    }
    tracing::debug!(roots = roots.len(), blocks = store.len(), "read car archive");
    Ok((CarHeader { roots }, store))
}

/// Serialize blocks into a CAR v1 archive.
pub fn write_car<'a, I>(roots: &[Cid], blocks: I) -> Result<Vec<u8>, serde_cbor::Error>
where
    I: IntoIterator<Item = (&'a Cid, &'a [u8])>,
{
    let header = HeaderData {
        version: CAR_VERSION,
        roots: roots.iter().map(|cid| ByteBuf::from(cid.to_link_bytes())).collect(),
    };
    let header_bytes = skymod_cbor::to_dag_cbor(&header)?;
    let mut out = Vec::with_capacity(header_bytes.len() + 1024);
    write_uvarint(header_bytes.len() as u64, &mut out);
    out.extend_from_slice(&header_bytes);
    for (cid, block) in blocks {
        let cid_bytes = cid.to_bytes();
        write_uvarint((cid_bytes.len() + block.len()) as u64, &mut out);
        out.extend_from_slice(&cid_bytes);
        out.extend_from_slice(block);
    }
    Ok(out)
}

#[derive(Debug, thiserror::Error)]
pub enum CarError {
    #[error("archive is empty")]
    Empty,
    #[error("archive truncated in section at byte {offset}")]
    Truncated { offset: usize },
    #[error("bad length prefix at byte {offset}: {source}")]
    Varint {
        offset: usize,
        #[source]
        source: VarintError,
    },
    #[error("archive header is not valid cbor: {0}")]
    Header(#[source] serde_cbor::Error),
    #[error("unsupported archive version {0}")]
    UnsupportedVersion(u64),
    #[error("archive header lists no roots")]
    NoRoots,
    #[error("bad cid at byte {offset}: {source}")]
    Cid {
        offset: usize,
        #[source]
        source: CidError,
    },
    #[error("bad block: {0}")]
    Block(#[from] StoreError),
}
