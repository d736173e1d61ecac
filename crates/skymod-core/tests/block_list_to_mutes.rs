use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;
use skymod_core::{
    BLOCK_COLLECTION, EdgeScanner, HandleResolver, IdentityDirectory, IdentityDocument,
    ModerationError, MuteService, Page, PageLimits, PageSource, RepoExporter, ResolvedIdentity,
    MuteSynchronizer, ServiceError, SyncPhase, apply_mute_targets, dids_of, resolve_handles,
    resolve_identifiers,
};
use skymod_repo::RepoBuilder;

/// A small in-memory network: handles, identity documents, repositories and
/// one account's mute list.
#[derive(Default)]
struct Network {
    handles: HashMap<String, String>,
    documents: HashMap<String, Vec<String>>,
    repos: HashMap<String, Vec<u8>>,
    mutes: Mutex<Vec<String>>,
    mute_calls: Mutex<usize>,
}

impl Network {
    fn account(&mut self, handle: &str, did: &str) {
        self.handles.insert(handle.into(), did.into());
        self.documents
            .insert(did.into(), vec![format!("at://{handle}")]);
    }

    fn blocks(&mut self, did: &str, subjects: &[&str]) {
        let mut builder = RepoBuilder::new(did);
        for (i, subject) in subjects.iter().enumerate() {
            let record = json!({
                "$type": BLOCK_COLLECTION,
                "subject": subject,
                "createdAt": "2024-03-01T00:00:00.000Z",
            });
            builder = builder
                .record(format!("{BLOCK_COLLECTION}/3kb{i:04}"), &record)
                .unwrap();
        }
        builder = builder
            .record(
                "app.bsky.graph.follow/3kf0000",
                &json!({"subject": "did:plc:followed"}),
            )
            .unwrap();
        self.repos.insert(did.into(), builder.to_car().unwrap());
    }
}

#[async_trait]
impl HandleResolver for Network {
    async fn resolve_handle(&self, handle: &str) -> Result<String, ServiceError> {
        self.handles
            .get(handle)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(handle.into()))
    }
}

#[async_trait]
impl IdentityDirectory for Network {
    async fn get_document(&self, did: &str) -> Result<IdentityDocument, ServiceError> {
        let also_known_as = self
            .documents
            .get(did)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(did.into()))?;
        Ok(IdentityDocument {
            also_known_as,
        })
    }
}

#[async_trait]
impl RepoExporter for Network {
    async fn export_repo(&self, did: &str) -> Result<Vec<u8>, ServiceError> {
        self.repos
            .get(did)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(did.into()))
    }
}

#[async_trait]
impl PageSource for Network {
    type Item = ResolvedIdentity;

    fn collection(&self) -> &str {
        "app.bsky.graph.getMutes"
    }

    // Two mutes per page; the cursor is the offset of the next page.
    async fn list_page(
        &self,
        cursor: Option<&str>,
        _limit: u32,
    ) -> Result<Page<ResolvedIdentity>, ServiceError> {
        let start = match cursor {
            Some(cursor) => cursor.parse::<usize>().map_err(ServiceError::transport)?,
            None => 0,
        };
        let mutes = self.mutes.lock().unwrap();
        let end = (start + 2).min(mutes.len());
        let items = mutes[start..end]
            .iter()
            .map(|did| ResolvedIdentity {
                handle: String::new(),
                did: did.clone(),
            })
            .collect();
        Ok(Page {
            items,
            cursor: (end < mutes.len()).then(|| end.to_string()),
        })
    }
}

#[async_trait]
impl MuteService for Network {
    async fn mute(&self, did: &str) -> Result<(), ServiceError> {
        *self.mute_calls.lock().unwrap() += 1;
        let mut mutes = self.mutes.lock().unwrap();
        if mutes.iter().any(|m| m == did) {
            return Err(ServiceError::Rejected {
                status: 400,
                message: format!("{did} already muted"),
            });
        }
        mutes.push(did.into());
        Ok(())
    }
}

fn network() -> Network {
    let mut net = Network::default();
    net.account("me.example", "did:plc:me");
    net.account("alice.example", "did:plc:alice");
    net.account("bob.example", "did:plc:bob");
    for name in ["t1", "t2", "t3", "t4", "t5"] {
        net.account(&format!("{name}.example"), &format!("did:plc:{name}"));
    }
    net.blocks(
        "did:plc:alice",
        &["did:plc:t1", "did:plc:t2", "did:plc:t3", "did:plc:t2"],
    );
    net.blocks("did:plc:bob", &["did:plc:t3", "did:plc:t4", "did:plc:t5"]);
    net.mutes
        .lock()
        .unwrap()
        .extend(["did:plc:t2".to_string(), "did:plc:x".into(), "did:plc:y".into()]);
    net
}

#[tokio::test]
async fn blocks_of_several_users_become_mutes() {
    let net = network();

    let sources = resolve_handles(&net, &["@alice.example", "bob.example"])
        .await
        .unwrap();
    let mut scanner = EdgeScanner::new(BLOCK_COLLECTION);
    for source in &sources {
        scanner.scan_source(&net, &source.did).await.unwrap();
    }
    let targets = scanner.into_edges();
    assert_eq!(
        targets,
        vec!["did:plc:t1", "did:plc:t2", "did:plc:t3", "did:plc:t4", "did:plc:t5"]
    );

    let named = resolve_identifiers(&net, &targets).await.unwrap();
    assert!(named.skipped.is_empty());
    assert_eq!(named.resolved[0].handle, "t1.example");

    let report = apply_mute_targets(&net, &net, &dids_of(&named.resolved), PageLimits::default())
        .await
        .unwrap();
    assert_eq!(report.requested, 5);
    assert_eq!(report.already_satisfied, 1);
    assert_eq!(report.newly_applied, 4);
    assert_eq!(*net.mute_calls.lock().unwrap(), 4);

    // A second run finds everything in place and calls nothing.
    let again = MuteSynchronizer::new(&net, &net)
        .with_limits(PageLimits {
            page_size: 2,
            max_pages: Some(10),
        })
        .run(&targets)
        .await;
    assert_eq!(again.phase, SyncPhase::Done);
    assert_eq!(again.report.already_satisfied, 5);
    assert_eq!(*net.mute_calls.lock().unwrap(), 4);
}

#[tokio::test]
async fn unknown_source_user_fails_resolution() {
    let net = network();
    let err = resolve_handles(&net, &["alice.example", "ghost.example"])
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ModerationError::ResolutionFailure { ref subject, .. } if subject == "ghost.example"
    ));
    assert_eq!(err.to_string(), "resolve ghost.example: not found: ghost.example");
}
