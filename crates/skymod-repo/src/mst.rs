//! Merkle Search Tree: the ordered index of an atproto repository.
//!
//! Each node is `{l, e}` where `l` links to a subtree holding keys smaller
//! than the first entry, and each entry `{p, k, v, t}` stores its key as
//! `p` bytes shared with the previous entry's key followed by `k`, the
//! record CID in `v`, and in `t` the subtree of keys up to the next entry.

use std::ops::ControlFlow;

use serde::{Deserialize, Serialize};
use serde_bytes::ByteBuf;
use sha2::{Digest, Sha256};
use skymod_cbor::Cid;

use crate::{BlockStore, KeyOrdering, RecordIndex, RepoError};

/// Nodes nested deeper than this are rejected.
pub const MAX_TREE_DEPTH: usize = 128;

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct NodeData {
    pub(crate) l: Option<ByteBuf>,
    pub(crate) e: Vec<TreeEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct TreeEntry {
    pub(crate) p: u64,
    pub(crate) k: ByteBuf,
    pub(crate) v: ByteBuf,
    pub(crate) t: Option<ByteBuf>,
}

struct Entry {
    key: String,
    value: Cid,
    tree: Option<Cid>,
}

/// Read-only view of a tree rooted at `root` inside `store`.
pub struct Mst<'a, S: BlockStore + ?Sized> {
    store: &'a S,
    root: Cid,
}

impl<'a, S: BlockStore + ?Sized> Mst<'a, S> {
    pub fn new(store: &'a S, root: Cid) -> Self {
        Self { store, root }
    }

    pub fn root(&self) -> &Cid {
        &self.root
    }

    fn load(&self, cid: &Cid) -> Result<(Option<Cid>, Vec<Entry>), RepoError> {
        let bytes = self.store.get_block(cid)?;
        let node: NodeData = serde_cbor::from_slice(bytes).map_err(|source| RepoError::NodeDecode {
            cid: cid.clone(),
            source,
        })?;
        let link = |raw: &ByteBuf| {
            Cid::from_link_bytes(raw).map_err(|source| RepoError::InvalidLink {
                cid: cid.clone(),
                source,
            })
        };

        let left = node.l.as_ref().map(link).transpose()?;
        let mut entries: Vec<Entry> = Vec::with_capacity(node.e.len());
        let mut previous: Vec<u8> = Vec::new();
        for raw in &node.e {
            let shared = usize::try_from(raw.p)
                .ok()
                .filter(|p| *p <= previous.len())
                .ok_or_else(|| RepoError::InvalidPrefix {
                    cid: cid.clone(),
                    prefix_len: raw.p,
                    previous_len: previous.len(),
                })?;
            let mut key_bytes = previous[..shared].to_vec();
            key_bytes.extend_from_slice(&raw.k);
            let key = String::from_utf8(key_bytes.clone())
                .map_err(|_| RepoError::InvalidKey { cid: cid.clone() })?;
            if entries.last().is_some_and(|last| last.key >= key) {
                return Err(RepoError::KeysOutOfOrder {
                    cid: cid.clone(),
                    key,
                });
            }
            entries.push(Entry {
                key,
                value: link(&raw.v)?,
                tree: raw.t.as_ref().map(link).transpose()?,
            });
            previous = key_bytes;
        }
        Ok((left, entries))
    }

    fn walk_node<B, F>(
        &self,
        cid: &Cid,
        start: &str,
        depth: usize,
        visit: &mut F,
    ) -> Result<ControlFlow<B>, RepoError>
    where
        F: FnMut(&str, &Cid) -> ControlFlow<B>,
    {
        if depth > MAX_TREE_DEPTH {
            return Err(RepoError::TreeTooDeep(MAX_TREE_DEPTH));
        }
        let (left, entries) = self.load(cid)?;

        // Subtrees whose upper bound is <= start hold nothing we need.
        if let Some(left) = left {
            let below_start = entries.first().is_some_and(|first| first.key.as_str() <= start);
            if !below_start {
                if let ControlFlow::Break(b) = self.walk_node(&left, start, depth + 1, visit)? {
                    return Ok(ControlFlow::Break(b));
                }
            }
        }
        for (i, entry) in entries.iter().enumerate() {
            if entry.key.as_str() >= start {
                if let ControlFlow::Break(b) = visit(&entry.key, &entry.value) {
                    return Ok(ControlFlow::Break(b));
                }
            }
            if let Some(tree) = &entry.tree {
                let below_start = entries
                    .get(i + 1)
                    .is_some_and(|next| next.key.as_str() <= start);
                if !below_start {
                    if let ControlFlow::Break(b) = self.walk_node(tree, start, depth + 1, visit)? {
                        return Ok(ControlFlow::Break(b));
                    }
                }
            }
        }
        Ok(ControlFlow::Continue(()))
    }
}

impl<S: BlockStore + ?Sized> RecordIndex for Mst<'_, S> {
    fn ordering(&self) -> KeyOrdering {
        KeyOrdering::Sorted
    }

    fn walk_from<B, F>(&self, start: &str, mut visit: F) -> Result<ControlFlow<B>, RepoError>
    where
        F: FnMut(&str, &Cid) -> ControlFlow<B>,
    {
        self.walk_node(&self.root, start, 0, &mut visit)
    }
}

/// Tree layer of a key: leading zero bits of its sha2-256 digest, counted
/// in 2-bit steps (a fanout of 4 per level).
pub fn key_layer(key: &str) -> u32 {
    let digest = Sha256::digest(key.as_bytes());
    let mut zeros = 0;
    for byte in digest {
        if byte == 0 {
            zeros += 8;
        } else {
            zeros += byte.leading_zeros();
            break;
        }
    }
    zeros / 2
}
