//! Building repository exports in memory, for fixtures and tooling.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_bytes::ByteBuf;
use skymod_cbor::{Cid, DAG_CBOR};

use crate::car::write_car;
use crate::mst::{NodeData, TreeEntry, key_layer};

#[derive(Serialize)]
struct CommitData<'a> {
    did: &'a str,
    version: u64,
    data: ByteBuf,
    rev: &'a str,
    prev: Option<ByteBuf>,
    sig: ByteBuf,
}

/// Assembles records into a commit, a layered search tree and a CAR export.
#[derive(Debug, Clone)]
pub struct RepoBuilder {
    did: String,
    rev: String,
    records: BTreeMap<String, Vec<u8>>,
}

impl RepoBuilder {
    pub fn new(did: impl Into<String>) -> Self {
        Self {
            did: did.into(),
            rev: "3jzfcijpj2z2a".into(),
            records: BTreeMap::new(),
        }
    }

    pub fn rev(mut self, rev: impl Into<String>) -> Self {
        self.rev = rev.into();
        self
    }

    /// Add a record encoded as DAG-CBOR under `key` (`collection/rkey`).
    pub fn record<T: Serialize>(
        mut self,
        key: impl Into<String>,
        value: &T,
    ) -> Result<Self, serde_cbor::Error> {
        let bytes = skymod_cbor::to_dag_cbor(value)?;
        self.records.insert(key.into(), bytes);
        Ok(self)
    }

    /// Add a record block verbatim, even if it is not valid CBOR.
    pub fn raw_record(mut self, key: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.records.insert(key.into(), bytes);
        self
    }

    /// Encode everything into a CAR v1 export rooted at the commit.
    pub fn to_car(&self) -> Result<Vec<u8>, serde_cbor::Error> {
        let mut blocks: Vec<(Cid, Vec<u8>)> = Vec::new();
        let mut entries = Vec::with_capacity(self.records.len());
        for (key, bytes) in &self.records {
            let cid = Cid::for_block(DAG_CBOR, bytes);
            blocks.push((cid.clone(), bytes.clone()));
            entries.push((key.as_str(), cid, key_layer(key)));
        }

        let top = entries.iter().map(|(_, _, layer)| *layer).max().unwrap_or(0);
        let data = build_node(&entries, top, &mut blocks)?;

        let (commit, commit_bytes) = Cid::of_dag_cbor(&CommitData {
            did: &self.did,
            version: 3,
            data: ByteBuf::from(data.to_link_bytes()),
            rev: &self.rev,
            prev: None,
            sig: ByteBuf::from(vec![0u8; 64]),
        })?;
        blocks.push((commit.clone(), commit_bytes));

        write_car(
            &[commit],
            blocks.iter().map(|(cid, bytes)| (cid, bytes.as_slice())),
        )
    }
}

fn build_node(
    entries: &[(&str, Cid, u32)],
    layer: u32,
    blocks: &mut Vec<(Cid, Vec<u8>)>,
) -> Result<Cid, serde_cbor::Error> {
    let mut node = NodeData {
        l: None,
        e: Vec::new(),
    };
    let mut group_start = 0;
    let mut previous: &[u8] = &[];
    for (i, (key, value, entry_layer)) in entries.iter().enumerate() {
        if *entry_layer < layer {
            continue;
        }
        let subtree = build_subtree(&entries[group_start..i], layer, blocks)?;
        attach(&mut node, subtree);
        let key = key.as_bytes();
        let shared = previous
            .iter()
            .zip(key)
            .take_while(|(a, b)| a == b)
            .count();
        node.e.push(TreeEntry {
            p: shared as u64,
            k: ByteBuf::from(key[shared..].to_vec()),
            v: ByteBuf::from(value.to_link_bytes()),
            t: None,
        });
        previous = key;
        group_start = i + 1;
    }
    let subtree = build_subtree(&entries[group_start..], layer, blocks)?;
    attach(&mut node, subtree);

    let (cid, bytes) = Cid::of_dag_cbor(&node)?;
    blocks.push((cid.clone(), bytes));
    Ok(cid)
}

fn build_subtree(
    group: &[(&str, Cid, u32)],
    layer: u32,
    blocks: &mut Vec<(Cid, Vec<u8>)>,
) -> Result<Option<Cid>, serde_cbor::Error> {
    if group.is_empty() || layer == 0 {
        return Ok(None);
    }
    build_node(group, layer - 1, blocks).map(Some)
}

fn attach(node: &mut NodeData, subtree: Option<Cid>) {
    let link = subtree.map(|cid| ByteBuf::from(cid.to_link_bytes()));
    match node.e.last_mut() {
        Some(last) => last.t = link,
        None => node.l = link,
    }
}
