//! In-memory stand-ins for the remote services.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::{
    HandleResolver, IdentityDirectory, IdentityDocument, MuteService, Page, PageSource,
    RepoExporter, ResolvedIdentity, ServiceError,
};

#[derive(Default)]
pub struct FakeResolver {
    pub handles: HashMap<String, String>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeResolver {
    pub fn with(entries: &[(&str, &str)]) -> Self {
        Self {
            handles: entries
                .iter()
                .map(|(h, d)| (h.to_string(), d.to_string()))
                .collect(),
            calls: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl HandleResolver for FakeResolver {
    async fn resolve_handle(&self, handle: &str) -> Result<String, ServiceError> {
        self.calls.lock().unwrap().push(handle.to_owned());
        self.handles
            .get(handle)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(handle.to_owned()))
    }
}

#[derive(Default)]
pub struct FakeDirectory {
    pub documents: HashMap<String, Vec<String>>,
    pub failing: Option<String>,
}

impl FakeDirectory {
    pub fn with(entries: Vec<(&str, Vec<&str>)>) -> Self {
        Self {
            documents: entries
                .into_iter()
                .map(|(did, aka)| (did.to_string(), aka.into_iter().map(String::from).collect()))
                .collect(),
            failing: None,
        }
    }
}

#[async_trait]
impl IdentityDirectory for FakeDirectory {
    async fn get_document(&self, did: &str) -> Result<IdentityDocument, ServiceError> {
        if self.failing.as_deref() == Some(did) {
            return Err(ServiceError::transport("directory unavailable"));
        }
        self.documents
            .get(did)
            .map(|aka| IdentityDocument {
                also_known_as: aka.clone(),
            })
            .ok_or_else(|| ServiceError::NotFound(did.to_owned()))
    }
}

/// Serves scripted pages in order and records the cursors it was asked for.
pub struct FakePager<T> {
    pages: Mutex<VecDeque<Result<Page<T>, ServiceError>>>,
    pub requests: Mutex<Vec<Option<String>>>,
}

impl<T> FakePager<T> {
    pub fn new(pages: Vec<Result<Page<T>, ServiceError>>) -> Self {
        Self {
            pages: Mutex::new(pages.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl FakePager<ResolvedIdentity> {
    /// A single final page listing `dids` as already muted.
    pub fn muted(dids: &[&str]) -> Self {
        let items = dids
            .iter()
            .map(|did| ResolvedIdentity {
                handle: format!("{}.test", did.trim_start_matches("did:plc:")),
                did: did.to_string(),
            })
            .collect();
        Self::new(vec![Ok(Page {
            items,
            cursor: None,
        })])
    }
}

#[async_trait]
impl<T: Send> PageSource for FakePager<T> {
    type Item = T;

    fn collection(&self) -> &str {
        "test.collection"
    }

    async fn list_page(&self, cursor: Option<&str>, _limit: u32) -> Result<Page<T>, ServiceError> {
        self.requests.lock().unwrap().push(cursor.map(str::to_owned));
        self.pages.lock().unwrap().pop_front().unwrap_or_else(|| {
            // Never-ending server: keep handing out a cursor.
            Ok(Page {
                items: Vec::new(),
                cursor: Some("again".into()),
            })
        })
    }
}

#[derive(Default)]
pub struct FakeExporter {
    pub repos: HashMap<String, Vec<u8>>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeExporter {
    pub fn with(repos: Vec<(&str, Vec<u8>)>) -> Self {
        Self {
            repos: repos
                .into_iter()
                .map(|(did, car)| (did.to_string(), car))
                .collect(),
            calls: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl RepoExporter for FakeExporter {
    async fn export_repo(&self, did: &str) -> Result<Vec<u8>, ServiceError> {
        self.calls.lock().unwrap().push(did.to_owned());
        self.repos
            .get(did)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(did.to_owned()))
    }
}

/// Records mute calls; fails on the identifier named in `fail_on`.
#[derive(Default)]
pub struct FakeMuter {
    pub muted: Mutex<Vec<String>>,
    pub fail_on: Option<String>,
}

impl FakeMuter {
    pub fn failing_on(did: &str) -> Self {
        Self {
            muted: Mutex::new(Vec::new()),
            fail_on: Some(did.to_owned()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.muted.lock().unwrap().clone()
    }
}

#[async_trait]
impl MuteService for FakeMuter {
    async fn mute(&self, did: &str) -> Result<(), ServiceError> {
        if self.fail_on.as_deref() == Some(did) {
            return Err(ServiceError::Rejected {
                status: 400,
                message: "InvalidRequest".into(),
            });
        }
        self.muted.lock().unwrap().push(did.to_owned());
        Ok(())
    }
}
