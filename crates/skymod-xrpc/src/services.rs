//! Engine service traits backed by the HTTP clients.

use async_trait::async_trait;
use skymod_core::{
    HandleResolver, IdentityDirectory, IdentityDocument, MuteService, Page, PageSource,
    RepoExporter, ResolvedIdentity, ServiceError,
};

use crate::{PlcClient, XrpcClient};

#[async_trait]
impl HandleResolver for XrpcClient {
    async fn resolve_handle(&self, handle: &str) -> Result<String, ServiceError> {
        Ok(XrpcClient::resolve_handle(self, handle).await?)
    }
}

#[async_trait]
impl RepoExporter for XrpcClient {
    async fn export_repo(&self, did: &str) -> Result<Vec<u8>, ServiceError> {
        Ok(self.get_repo(did).await?)
    }
}

#[async_trait]
impl MuteService for XrpcClient {
    async fn mute(&self, did: &str) -> Result<(), ServiceError> {
        Ok(self.mute_actor(did).await?)
    }
}

#[async_trait]
impl IdentityDirectory for PlcClient {
    async fn get_document(&self, did: &str) -> Result<IdentityDocument, ServiceError> {
        let doc = PlcClient::get_document(self, did).await?;
        Ok(IdentityDocument {
            also_known_as: doc.also_known_as,
        })
    }
}

/// The authenticated account's mute list as a paginated collection.
#[derive(Debug, Clone, Copy)]
pub struct MuteList<'a> {
    client: &'a XrpcClient,
}

impl<'a> MuteList<'a> {
    pub fn new(client: &'a XrpcClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageSource for MuteList<'_> {
    type Item = ResolvedIdentity;

    fn collection(&self) -> &str {
        "mutes"
    }

    async fn list_page(
        &self,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<Page<ResolvedIdentity>, ServiceError> {
        let page = self.client.get_mutes(cursor, limit).await?;
        Ok(Page {
            items: page
                .mutes
                .into_iter()
                .map(|actor| ResolvedIdentity {
                    handle: actor.handle,
                    did: actor.did,
                })
                .collect(),
            cursor: page.cursor,
        })
    }
}
