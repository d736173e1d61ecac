//! Narrow interfaces to the remote services the engine depends on.

use async_trait::async_trait;

use crate::ServiceError;

/// Handle → identifier lookups.
#[async_trait]
pub trait HandleResolver: Send + Sync {
    async fn resolve_handle(&self, handle: &str) -> Result<String, ServiceError>;
}

/// The parts of an identity document the engine reads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityDocument {
    /// Alternate names, e.g. `at://alice.example`.
    pub also_known_as: Vec<String>,
}

/// Identifier → identity document lookups.
#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    async fn get_document(&self, did: &str) -> Result<IdentityDocument, ServiceError>;
}

/// One page of a remote list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub cursor: Option<String>,
}

/// A cursor-paginated remote collection.
#[async_trait]
pub trait PageSource: Send + Sync {
    type Item: Send;

    /// Collection name, used in logs and errors.
    fn collection(&self) -> &str;

    async fn list_page(
        &self,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<Page<Self::Item>, ServiceError>;
}

/// Full repository exports as CAR bytes.
#[async_trait]
pub trait RepoExporter: Send + Sync {
    async fn export_repo(&self, did: &str) -> Result<Vec<u8>, ServiceError>;
}

#[async_trait]
pub trait MuteService: Send + Sync {
    async fn mute(&self, did: &str) -> Result<(), ServiceError>;
}
