//! Extraction of relationship edges from repository exports.

use std::ops::ControlFlow;

use indexmap::IndexSet;
use skymod_cbor::Document;
use skymod_repo::{BlockStore, KeyOrdering, RecordIndex, RepoError, RepoSnapshot};
use tracing::{debug, info, trace, warn};

use crate::{ModerationError, RepoExporter};

/// Collection holding an account's block records.
pub const BLOCK_COLLECTION: &str = "app.bsky.graph.block";

/// Record field naming the other party of an edge.
pub const SUBJECT_FIELD: &str = "subject";

enum Stop {
    PrefixEnded,
    Failed(ModerationError),
}

/// Collects the `subject` of every record in `collection`, first appearance
/// first. On a sorted index the walk stops at the first key past the
/// collection; an unordered index is filtered key by key.
pub fn extract_edges<I, S>(
    index: &I,
    blocks: &S,
    collection: &str,
    did: &str,
) -> Result<IndexSet<String>, ModerationError>
where
    I: RecordIndex,
    S: BlockStore + ?Sized,
{
    let prefix = format!("{collection}/");
    let ordering = index.ordering();
    let mut edges = IndexSet::new();

    let flow = index
        .walk_from(&prefix, |key, cid| {
            if !key.starts_with(&prefix) {
                return match ordering {
                    KeyOrdering::Sorted => ControlFlow::Break(Stop::PrefixEnded),
                    KeyOrdering::Unordered => ControlFlow::Continue(()),
                };
            }
            let bytes = match blocks.get_block(cid) {
                Ok(bytes) => bytes,
                Err(err) => {
                    return ControlFlow::Break(Stop::Failed(ModerationError::ArchiveParseFailure {
                        did: did.to_owned(),
                        source: RepoError::Store(err),
                    }));
                }
            };
            let doc = match Document::decode_guarded(bytes) {
                Ok(doc) => doc,
                Err(source) => {
                    warn!(did, key, block = %hex::encode(bytes), error = %source, "could not decode record");
                    return ControlFlow::Break(Stop::Failed(ModerationError::RecordDecodeFailure {
                        did: did.to_owned(),
                        key: key.to_owned(),
                        source,
                    }));
                }
            };
            trace!(did, key, record = %doc.to_json(), "record");
            match doc.required_str(SUBJECT_FIELD) {
                Ok(subject) => {
                    edges.insert(subject.to_owned());
                    ControlFlow::Continue(())
                }
                Err(source) => ControlFlow::Break(Stop::Failed(ModerationError::ShapeMismatch {
                    did: did.to_owned(),
                    key: key.to_owned(),
                    source,
                })),
            }
        })
        .map_err(|source| ModerationError::ArchiveParseFailure {
            did: did.to_owned(),
            source,
        })?;

    match flow {
        ControlFlow::Break(Stop::Failed(err)) => Err(err),
        ControlFlow::Break(Stop::PrefixEnded) | ControlFlow::Continue(()) => Ok(edges),
    }
}

/// Accumulates edges from several source accounts with one shared seen-set.
///
/// A source that fails contributes nothing; edges from earlier sources are
/// kept and the caller decides whether to go on.
#[derive(Debug)]
pub struct EdgeScanner {
    collection: String,
    edges: IndexSet<String>,
}

impl EdgeScanner {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            edges: IndexSet::new(),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Export, parse and scan the repository of `did`. Returns how many
    /// previously unseen edges it added.
    pub async fn scan_source<E>(&mut self, exporter: &E, did: &str) -> Result<usize, ModerationError>
    where
        E: RepoExporter + ?Sized,
    {
        let car = exporter
            .export_repo(did)
            .await
            .map_err(|source| ModerationError::ExportFailure {
                did: did.to_owned(),
                source,
            })?;
        debug!(did, bytes = car.len(), "fetched repository export");
        let snapshot =
            RepoSnapshot::from_car(&car).map_err(|source| ModerationError::ArchiveParseFailure {
                did: did.to_owned(),
                source,
            })?;
        let found = extract_edges(&snapshot.records(), snapshot.blocks(), &self.collection, did)?;

        let before = self.edges.len();
        let total = found.len();
        self.edges.extend(found);
        let added = self.edges.len() - before;
        info!(
            did,
            collection = %self.collection,
            found = total,
            added,
            "scanned repository"
        );
        Ok(added)
    }

    pub fn edges(&self) -> &IndexSet<String> {
        &self.edges
    }

    pub fn into_edges(self) -> Vec<String> {
        self.edges.into_iter().collect()
    }
}

/// Single-source form of [`EdgeScanner`].
pub async fn scan_edges<E>(
    exporter: &E,
    did: &str,
    collection: &str,
) -> Result<Vec<String>, ModerationError>
where
    E: RepoExporter + ?Sized,
{
    let mut scanner = EdgeScanner::new(collection);
    scanner.scan_source(exporter, did).await?;
    Ok(scanner.into_edges())
}
