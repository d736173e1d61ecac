use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;
use url::Url;

use crate::{ServiceConfig, Session, XrpcError, ensure_app_password, http_client};

const CAR_MIME: &str = "application/vnd.ipld.car";

/// A profile as it appears in graph listings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorView {
    pub did: String,
    pub handle: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Output of `app.bsky.graph.getMutes`.
#[derive(Debug, Clone, Deserialize)]
pub struct MutesPage {
    #[serde(default)]
    pub mutes: Vec<ActorView>,
    #[serde(default)]
    pub cursor: Option<String>,
}

#[derive(Deserialize)]
struct ResolveHandleOutput {
    did: String,
}

/// Client for the XRPC endpoints of one PDS.
#[derive(Clone)]
pub struct XrpcClient {
    http: reqwest::Client,
    base: Url,
    session: Option<Session>,
}

impl std::fmt::Debug for XrpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XrpcClient")
            .field("base", &self.base.as_str())
            .field("session", &self.session)
            .finish()
    }
}

impl XrpcClient {
    pub fn new(config: &ServiceConfig) -> Result<Self, XrpcError> {
        Self::with_http(http_client(config)?, &config.pds_url)
    }

    pub fn with_http(http: reqwest::Client, base_url: &str) -> Result<Self, XrpcError> {
        Ok(Self {
            http,
            base: base_url_of(base_url)?,
            session: None,
        })
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn set_session(&mut self, session: Session) {
        self.session = Some(session);
    }

    fn endpoint(&self, nsid: &str) -> Result<Url, XrpcError> {
        self.base
            .join(&format!("xrpc/{nsid}"))
            .map_err(|source| XrpcError::InvalidUrl {
                url: format!("{}xrpc/{nsid}", self.base),
                source,
            })
    }

    async fn send(
        &self,
        nsid: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, XrpcError> {
        let request = match &self.session {
            Some(session) => request.bearer_auth(session.access_jwt()),
            None => request,
        };
        let response = request.send().await.map_err(|source| XrpcError::Http {
            endpoint: nsid.to_owned(),
            source,
        })?;
        let status = response.status();
        debug!(nsid, status = status.as_u16(), "xrpc call");
        if !status.is_success() {
            let raw = response.text().await.unwrap_or_default();
            return Err(XrpcError::status(nsid, status.as_u16(), &raw));
        }
        Ok(response)
    }

    async fn read_json<T: DeserializeOwned>(
        nsid: &str,
        response: reqwest::Response,
    ) -> Result<T, XrpcError> {
        let bytes = response.bytes().await.map_err(|source| XrpcError::Http {
            endpoint: nsid.to_owned(),
            source,
        })?;
        serde_json::from_slice(&bytes).map_err(|source| XrpcError::Body {
            endpoint: nsid.to_owned(),
            source,
        })
    }

    /// `GET /xrpc/{nsid}` returning JSON.
    pub async fn query<T: DeserializeOwned>(
        &self,
        nsid: &str,
        params: &[(&str, &str)],
    ) -> Result<T, XrpcError> {
        let request = self
            .http
            .get(self.endpoint(nsid)?)
            .query(params)
            .header(ACCEPT, "application/json");
        let response = self.send(nsid, request).await?;
        Self::read_json(nsid, response).await
    }

    /// `GET /xrpc/{nsid}` returning raw bytes.
    pub async fn query_bytes(
        &self,
        nsid: &str,
        params: &[(&str, &str)],
        accept: &str,
    ) -> Result<Vec<u8>, XrpcError> {
        let request = self
            .http
            .get(self.endpoint(nsid)?)
            .query(params)
            .header(ACCEPT, accept);
        let response = self.send(nsid, request).await?;
        let bytes = response.bytes().await.map_err(|source| XrpcError::Http {
            endpoint: nsid.to_owned(),
            source,
        })?;
        Ok(bytes.to_vec())
    }

    /// `POST /xrpc/{nsid}` with a JSON body. Returns the raw response so the
    /// caller decides whether there is an output to read.
    async fn post<B: Serialize + ?Sized>(
        &self,
        nsid: &str,
        body: &B,
    ) -> Result<reqwest::Response, XrpcError> {
        let request = self
            .http
            .post(self.endpoint(nsid)?)
            .header(CONTENT_TYPE, "application/json")
            .json(body);
        self.send(nsid, request).await
    }

    pub async fn procedure<B, T>(&self, nsid: &str, body: &B) -> Result<T, XrpcError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.post(nsid, body).await?;
        Self::read_json(nsid, response).await
    }

    /// A procedure without output.
    pub async fn procedure_unit<B: Serialize + ?Sized>(
        &self,
        nsid: &str,
        body: &B,
    ) -> Result<(), XrpcError> {
        self.post(nsid, body).await.map(drop)
    }

    fn require_session(&self, nsid: &str) -> Result<(), XrpcError> {
        match self.session {
            Some(_) => Ok(()),
            None => Err(XrpcError::NotAuthenticated {
                endpoint: nsid.to_owned(),
            }),
        }
    }

    pub async fn resolve_handle(&self, handle: &str) -> Result<String, XrpcError> {
        let out: ResolveHandleOutput = self
            .query("com.atproto.identity.resolveHandle", &[("handle", handle)])
            .await?;
        Ok(out.did)
    }

    pub async fn get_mutes(&self, cursor: Option<&str>, limit: u32) -> Result<MutesPage, XrpcError> {
        const NSID: &str = "app.bsky.graph.getMutes";
        self.require_session(NSID)?;
        let limit = limit.clamp(1, 100).to_string();
        let mut params = vec![("limit", limit.as_str())];
        if let Some(cursor) = cursor {
            params.push(("cursor", cursor));
        }
        self.query(NSID, &params).await
    }

    pub async fn mute_actor(&self, actor: &str) -> Result<(), XrpcError> {
        const NSID: &str = "app.bsky.graph.muteActor";
        self.require_session(NSID)?;
        self.procedure_unit(NSID, &json!({ "actor": actor })).await
    }

    /// Full repository export as CAR bytes.
    pub async fn get_repo(&self, did: &str) -> Result<Vec<u8>, XrpcError> {
        self.query_bytes("com.atproto.sync.getRepo", &[("did", did)], CAR_MIME)
            .await
    }

    pub async fn create_session(
        &self,
        identifier: &str,
        password: &str,
    ) -> Result<Session, XrpcError> {
        self.procedure(
            "com.atproto.server.createSession",
            &json!({ "identifier": identifier, "password": password }),
        )
        .await
    }

    /// Create a session with an app password and attach it to this client.
    pub async fn login(&mut self, identifier: &str, app_password: &str) -> Result<(), XrpcError> {
        let session = self.create_session(identifier, app_password).await?;
        ensure_app_password(&session)?;
        debug!(did = %session.did, handle = %session.handle, "authenticated");
        self.session = Some(session);
        Ok(())
    }
}

/// Parses a service base URL, ensuring the path ends in `/` so that
/// relative joins append rather than replace the last segment.
pub(crate) fn base_url_of(raw: &str) -> Result<Url, XrpcError> {
    let mut url = Url::parse(raw).map_err(|source| XrpcError::InvalidUrl {
        url: raw.to_owned(),
        source,
    })?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
