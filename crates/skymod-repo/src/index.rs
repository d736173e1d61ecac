use std::collections::{BTreeMap, HashMap};
use std::ops::{Bound, ControlFlow};

use skymod_cbor::Cid;

use crate::RepoError;

/// Whether an index yields its keys in lexicographic order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOrdering {
    /// Keys come out sorted, so all keys sharing a prefix are adjacent.
    Sorted,
    Unordered,
}

/// A mapping from record keys (`collection/rkey`) to record block CIDs.
pub trait RecordIndex {
    fn ordering(&self) -> KeyOrdering;

    /// Visit `(key, cid)` pairs until the visitor breaks. Sorted indexes
    /// begin at the first key `>= start`; unordered indexes ignore `start`
    /// and visit every key.
    fn walk_from<B, F>(&self, start: &str, visit: F) -> Result<ControlFlow<B>, RepoError>
    where
        F: FnMut(&str, &Cid) -> ControlFlow<B>;
}

impl RecordIndex for BTreeMap<String, Cid> {
    fn ordering(&self) -> KeyOrdering {
        KeyOrdering::Sorted
    }

    fn walk_from<B, F>(&self, start: &str, mut visit: F) -> Result<ControlFlow<B>, RepoError>
    where
        F: FnMut(&str, &Cid) -> ControlFlow<B>,
    {
        for (key, cid) in self.range::<str, _>((Bound::Included(start), Bound::Unbounded)) {
            if let ControlFlow::Break(b) = visit(key, cid) {
                return Ok(ControlFlow::Break(b));
            }
        }
        Ok(ControlFlow::Continue(()))
    }
}

impl RecordIndex for HashMap<String, Cid> {
    fn ordering(&self) -> KeyOrdering {
        KeyOrdering::Unordered
    }

    fn walk_from<B, F>(&self, _start: &str, mut visit: F) -> Result<ControlFlow<B>, RepoError>
    where
        F: FnMut(&str, &Cid) -> ControlFlow<B>,
    {
        for (key, cid) in self {
            if let ControlFlow::Break(b) = visit(key, cid) {
                return Ok(ControlFlow::Break(b));
            }
        }
        Ok(ControlFlow::Continue(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skymod_cbor::RAW;

    fn keys() -> Vec<String> {
        ["app.bsky.feed.post/1", "app.bsky.graph.block/a", "app.bsky.graph.block/b", "app.bsky.graph.follow/z"]
            .into_iter()
            .map(String::from)
            .collect()
    }

    #[test]
    fn sorted_map_starts_at_bound() {
        let index: BTreeMap<String, Cid> = keys()
            .into_iter()
            .map(|k| {
                let cid = Cid::for_block(RAW, k.as_bytes());
                (k, cid)
            })
            .collect();
        let mut seen = Vec::new();
        let flow = index
            .walk_from("app.bsky.graph.block/", |key, _| {
                seen.push(key.to_owned());
                if key.starts_with("app.bsky.graph.follow") {
                    ControlFlow::Break(key.to_owned())
                } else {
                    ControlFlow::Continue(())
                }
            })
            .expect("walk");
        assert_eq!(flow, ControlFlow::Break("app.bsky.graph.follow/z".to_owned()));
        assert_eq!(
            seen,
            ["app.bsky.graph.block/a", "app.bsky.graph.block/b", "app.bsky.graph.follow/z"]
        );
    }

    #[test]
    fn unordered_map_visits_everything() {
        let index: HashMap<String, Cid> = keys()
            .into_iter()
            .map(|k| {
                let cid = Cid::for_block(RAW, k.as_bytes());
                (k, cid)
            })
            .collect();
        assert_eq!(index.ordering(), KeyOrdering::Unordered);
        let mut count = 0;
        let flow: ControlFlow<()> = index
            .walk_from("zzz", |_, _| {
                count += 1;
                ControlFlow::Continue(())
            })
            .expect("walk");
        assert_eq!(flow, ControlFlow::Continue(()));
        assert_eq!(count, 4);
    }
}
