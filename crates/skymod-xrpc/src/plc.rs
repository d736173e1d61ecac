use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::client::base_url_of;
use crate::{ServiceConfig, XrpcError, http_client};

/// A DID document as served by the PLC directory. Only the fields the
/// engine reads are kept.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlcDocument {
    pub id: String,
    #[serde(default)]
    pub also_known_as: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct PlcClient {
    http: reqwest::Client,
    base: Url,
}

impl PlcClient {
    pub fn new(config: &ServiceConfig) -> Result<Self, XrpcError> {
        Self::with_http(http_client(config)?, &config.plc_url)
    }

    pub fn with_http(http: reqwest::Client, base_url: &str) -> Result<Self, XrpcError> {
        Ok(Self {
            http,
            base: base_url_of(base_url)?,
        })
    }

    // A DID parses as an absolute URL, so it is pushed as a path segment
    // rather than joined.
    fn document_url(&self, did: &str) -> Result<Url, XrpcError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| XrpcError::InvalidUrl {
                url: self.base.to_string(),
                source: url::ParseError::RelativeUrlWithCannotBeABaseBase,
            })?
            .pop_if_empty()
            .push(did);
        Ok(url)
    }

    /// `GET {base}/{did}`.
    pub async fn get_document(&self, did: &str) -> Result<PlcDocument, XrpcError> {
        let url = self.document_url(did)?;
        let endpoint = url.to_string();
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|source| XrpcError::Http {
                endpoint: endpoint.clone(),
                source,
            })?;
        let status = response.status();
        debug!(did, status = status.as_u16(), "plc lookup");
        if status == StatusCode::NOT_FOUND {
            return Err(XrpcError::Status {
                endpoint,
                status: status.as_u16(),
                error: Some("NotFound".into()),
                detail: format!("{did} is not registered"),
            });
        }
        if !status.is_success() {
            let raw = response.text().await.unwrap_or_default();
            return Err(XrpcError::status(endpoint, status.as_u16(), &raw));
        }
        let bytes = response.bytes().await.map_err(|source| XrpcError::Http {
            endpoint: endpoint.clone(),
            source,
        })?;
        serde_json::from_slice(&bytes).map_err(|source| XrpcError::Body { endpoint, source })
    }
}
