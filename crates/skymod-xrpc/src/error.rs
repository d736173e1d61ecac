use serde::Deserialize;
use skymod_core::ServiceError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum XrpcError {
    #[error("invalid value for {name}: '{value}'")]
    InvalidSetting { name: &'static str, value: String },
    #[error("invalid service url '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("build http client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("{endpoint}: {source}")]
    Http {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{endpoint}: status {status}: {detail}")]
    Status {
        endpoint: String,
        status: u16,
        /// XRPC error name, e.g. `InvalidRequest`.
        error: Option<String>,
        detail: String,
    },
    #[error("{endpoint}: invalid response body: {source}")]
    Body {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("{endpoint} requires an authenticated session")]
    NotAuthenticated { endpoint: String },
    #[error("malformed access token: {0}")]
    MalformedToken(String),
    #[error(
        "the password is not an app password (token scope '{scope}'); create an app password in the account settings and use that instead"
    )]
    NotAppPassword { scope: String },
}

/// Error body returned by XRPC endpoints on failure.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl XrpcError {
    /// Builds a `Status` error from a non-success response body.
    pub(crate) fn status(endpoint: impl Into<String>, status: u16, body: &str) -> Self {
        let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
        let detail = match (&parsed.error, &parsed.message) {
            (Some(error), Some(message)) => format!("{error}: {message}"),
            (Some(only), None) | (None, Some(only)) => only.clone(),
            (None, None) if !body.trim().is_empty() => truncate(body.trim(), 200),
            (None, None) => "no details".to_owned(),
        };
        XrpcError::Status {
            endpoint: endpoint.into(),
            status,
            error: parsed.error,
            detail,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            XrpcError::Status { status, .. } => Some(*status),
            XrpcError::Http { source, .. } => source.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_owned(),
    }
}

impl From<XrpcError> for ServiceError {
    fn from(err: XrpcError) -> Self {
        match err {
            XrpcError::Status { status: 404, detail, .. } => ServiceError::NotFound(detail),
            XrpcError::Status {
                status,
                endpoint,
                detail,
                ..
            } => ServiceError::Rejected {
                status,
                message: format!("{endpoint}: {detail}"),
            },
            other => ServiceError::transport(other),
        }
    }
}
