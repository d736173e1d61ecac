//! Bulk relationship management for atproto accounts: identity resolution,
//! paginated reads, block-record scanning of repository exports, and
//! idempotent mute synchronization.

pub mod error;
pub mod identity;
pub mod pagination;
pub mod scanner;
pub mod service;
pub mod sync;
pub mod userlist;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{ModerationError, ServiceError};
pub use identity::{
    IdentifierResolution, ResolvedIdentity, dids_of, normalize_handle, resolve_handles,
    resolve_identifiers,
};
pub use pagination::{DEFAULT_PAGE_SIZE, PageLimits, list_collection};
pub use scanner::{BLOCK_COLLECTION, EdgeScanner, extract_edges, scan_edges};
pub use service::{
    HandleResolver, IdentityDirectory, IdentityDocument, MuteService, Page, PageSource,
    RepoExporter,
};
pub use sync::{MuteSynchronizer, SyncOutcome, SyncPhase, SyncReport, apply_mute_targets, subtract};
pub use userlist::{UserListError, parse_user_list};
