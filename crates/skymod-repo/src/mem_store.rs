use std::collections::HashMap;
use std::fmt;

use skymod_cbor::Cid;

use crate::{BlockStore, StoreError, StoreResult};

/// In-memory block store holding one repository export.
#[derive(Clone, Default)]
pub struct MemBlockStore {
    blocks: HashMap<Cid, Vec<u8>>,
}

impl fmt::Debug for MemBlockStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemBlockStore")
            .field("blocks", &self.blocks.len())
            .finish()
    }
}

impl MemBlockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

impl BlockStore for MemBlockStore {
    fn get_block(&self, cid: &Cid) -> StoreResult<&[u8]> {
        self.blocks
            .get(cid)
            .map(Vec::as_slice)
            .ok_or_else(|| StoreError::Missing { cid: cid.clone() })
    }

    fn has_block(&self, cid: &Cid) -> bool {
        self.blocks.contains_key(cid)
    }

    fn put_block(&mut self, cid: Cid, bytes: Vec<u8>) -> StoreResult<()> {
        match cid.verify(&bytes) {
            Some(true) => {
                self.blocks.entry(cid).or_insert(bytes);
                Ok(())
            }
            Some(false) => Err(StoreError::HashMismatch { cid }),
            None => {
                let code = cid.hash_code();
                Err(StoreError::UnsupportedHash { cid, code })
            }
        }
    }
}
