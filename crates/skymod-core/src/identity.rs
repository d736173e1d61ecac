//! Handle ⇄ identifier resolution.

use serde::Serialize;
use tracing::{debug, warn};

use crate::{HandleResolver, IdentityDirectory, ModerationError};

pub const HANDLE_SIGIL: char = '@';
pub const AT_URI_SCHEME: &str = "at://";

/// A stable identifier together with the handle last observed for it.
///
/// Only `did` is a safe join key; handles may be reassigned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ResolvedIdentity {
    pub handle: String,
    pub did: String,
}

/// Strips a single leading `@`.
pub fn normalize_handle(handle: &str) -> &str {
    handle.strip_prefix(HANDLE_SIGIL).unwrap_or(handle)
}

/// Resolves each handle in order, one call per handle. The first failure
/// aborts the batch.
pub async fn resolve_handles<R, S>(
    resolver: &R,
    handles: &[S],
) -> Result<Vec<ResolvedIdentity>, ModerationError>
where
    R: HandleResolver + ?Sized,
    S: AsRef<str>,
{
    let mut resolved = Vec::with_capacity(handles.len());
    for handle in handles {
        let handle = normalize_handle(handle.as_ref());
        let did = resolver.resolve_handle(handle).await.map_err(|source| {
            ModerationError::ResolutionFailure {
                subject: handle.to_owned(),
                source,
            }
        })?;
        debug!(handle, did = %did, "resolved handle");
        resolved.push(ResolvedIdentity {
            handle: handle.to_owned(),
            did,
        });
    }
    Ok(resolved)
}

/// Result of resolving identifiers to handles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentifierResolution {
    pub resolved: Vec<ResolvedIdentity>,
    /// Identifiers whose identity document lists no alternate names.
    pub skipped: Vec<String>,
}

/// Looks up the identity document of each identifier and takes its first
/// alternate name as the handle. Identifiers without any alternate name are
/// left out of `resolved` and reported in `skipped`.
pub async fn resolve_identifiers<D, S>(
    directory: &D,
    dids: &[S],
) -> Result<IdentifierResolution, ModerationError>
where
    D: IdentityDirectory + ?Sized,
    S: AsRef<str>,
{
    let mut out = IdentifierResolution::default();
    for did in dids {
        let did = did.as_ref();
        let doc = directory
            .get_document(did)
            .await
            .map_err(|source| ModerationError::ResolutionFailure {
                subject: did.to_owned(),
                source,
            })?;
        let Some(name) = doc.also_known_as.first() else {
            warn!(did, "identity document lists no handle; skipping");
            out.skipped.push(did.to_owned());
            continue;
        };
        let handle = name.strip_prefix(AT_URI_SCHEME).unwrap_or(name);
        out.resolved.push(ResolvedIdentity {
            handle: handle.to_owned(),
            did: did.to_owned(),
        });
    }
    Ok(out)
}

pub fn dids_of(identities: &[ResolvedIdentity]) -> Vec<String> {
    identities.iter().map(|id| id.did.clone()).collect()
}
