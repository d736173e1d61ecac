use serde::Deserialize;
use serde_bytes::ByteBuf;
use skymod_cbor::Cid;

use crate::{BlockStore, MemBlockStore, Mst, RepoError, read_car};

/// Signed commit versions we know how to read.
const SUPPORTED_COMMIT_VERSIONS: [u64; 2] = [2, 3];

#[derive(Deserialize)]
struct CommitData {
    did: String,
    version: u64,
    data: ByteBuf,
    #[serde(default)]
    rev: Option<String>,
    #[serde(default)]
    prev: Option<ByteBuf>,
}

/// The repository commit at the root of an export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub did: String,
    pub version: u64,
    /// Root of the record tree.
    pub data: Cid,
    pub rev: Option<String>,
    pub prev: Option<Cid>,
}

/// A parsed repository export, held for the duration of one scan.
#[derive(Debug)]
pub struct RepoSnapshot {
    root: Cid,
    commit: Commit,
    blocks: MemBlockStore,
}

impl RepoSnapshot {
    /// Parse a CAR export and load its commit.
    pub fn from_car(bytes: &[u8]) -> Result<Self, RepoError> {
        let (header, blocks) = read_car(bytes)?;
        // `read_car` guarantees at least one root.
        let root = header.roots[0].clone();
        let commit = load_commit(&blocks, &root)?;
        tracing::debug!(
            did = %commit.did,
            rev = commit.rev.as_deref().unwrap_or("-"),
            blocks = blocks.len(),
            "opened repository snapshot"
        );
        Ok(Self {
            root,
            commit,
            blocks,
        })
    }

    pub fn root(&self) -> &Cid {
        &self.root
    }

    pub fn commit(&self) -> &Commit {
        &self.commit
    }

    pub fn did(&self) -> &str {
        &self.commit.did
    }

    pub fn rev(&self) -> Option<&str> {
        self.commit.rev.as_deref()
    }

    pub fn blocks(&self) -> &MemBlockStore {
        &self.blocks
    }

    /// The ordered record index of this snapshot.
    pub fn records(&self) -> Mst<'_, MemBlockStore> {
        Mst::new(&self.blocks, self.commit.data.clone())
    }
}

fn load_commit(blocks: &MemBlockStore, root: &Cid) -> Result<Commit, RepoError> {
    let bytes = blocks.get_block(root)?;
    let raw: CommitData = serde_cbor::from_slice(bytes).map_err(|source| RepoError::CommitDecode {
        cid: root.clone(),
        source,
    })?;
    if !SUPPORTED_COMMIT_VERSIONS.contains(&raw.version) {
        return Err(RepoError::UnsupportedCommitVersion(raw.version));
    }
    let link = |bytes: &ByteBuf| {
        Cid::from_link_bytes(bytes).map_err(|source| RepoError::InvalidLink {
            cid: root.clone(),
            source,
        })
    };
    Ok(Commit {
        data: link(&raw.data)?,
        prev: raw.prev.as_ref().map(link).transpose()?,
        did: raw.did,
        version: raw.version,
        rev: raw.rev,
    })
}
