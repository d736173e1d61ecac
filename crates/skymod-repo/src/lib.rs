//! Content-addressed repository snapshots: block store, CAR archives and the
//! Merkle Search Tree record index.

pub mod build;
pub mod car;
mod index;
mod mem_store;
pub mod mst;
mod snapshot;

pub use build::RepoBuilder;
pub use car::{CarError, CarHeader, read_car, write_car};
pub use index::{KeyOrdering, RecordIndex};
pub use mem_store::MemBlockStore;
pub use mst::Mst;
pub use snapshot::{Commit, RepoSnapshot};

use skymod_cbor::{Cid, CidError};

pub type StoreResult<T> = Result<T, StoreError>;

/// Trait implemented by content-addressed block stores.
pub trait BlockStore {
    fn get_block(&self, cid: &Cid) -> StoreResult<&[u8]>;
    fn has_block(&self, cid: &Cid) -> bool;
    /// Insert a block after checking that `bytes` hash to `cid`.
    fn put_block(&mut self, cid: Cid, bytes: Vec<u8>) -> StoreResult<()>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("block {cid} not found")]
    Missing { cid: Cid },
    #[error("block {cid} does not match its content hash")]
    HashMismatch { cid: Cid },
    #[error("block {cid} uses unsupported multihash 0x{code:x}")]
    UnsupportedHash { cid: Cid, code: u64 },
}

/// Errors raised while interpreting a repository snapshot.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("archive error: {0}")]
    Car(#[from] CarError),
    #[error("block store error: {0}")]
    Store(#[from] StoreError),
    #[error("commit block {cid} could not be decoded: {source}")]
    CommitDecode {
        cid: Cid,
        #[source]
        source: serde_cbor::Error,
    },
    #[error("unsupported commit version {0}")]
    UnsupportedCommitVersion(u64),
    #[error("tree node {cid} could not be decoded: {source}")]
    NodeDecode {
        cid: Cid,
        #[source]
        source: serde_cbor::Error,
    },
    #[error("invalid link in block {cid}: {source}")]
    InvalidLink {
        cid: Cid,
        #[source]
        source: CidError,
    },
    #[error("tree node {cid} entry prefix {prefix_len} exceeds previous key length {previous_len}")]
    InvalidPrefix {
        cid: Cid,
        prefix_len: u64,
        previous_len: usize,
    },
    #[error("tree node {cid} holds a key that is not UTF-8")]
    InvalidKey { cid: Cid },
    #[error("tree node {cid} keys out of order at '{key}'")]
    KeysOutOfOrder { cid: Cid, key: String },
    #[error("tree deeper than {0} levels")]
    TreeTooDeep(usize),
}
