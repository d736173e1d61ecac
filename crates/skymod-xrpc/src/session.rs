use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;

use crate::XrpcError;

/// Scope carried by access tokens minted from an app password.
pub const APP_PASSWORD_SCOPE: &str = "com.atproto.appPass";

/// Output of `com.atproto.server.createSession`.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub did: String,
    pub handle: String,
    access_jwt: String,
    refresh_jwt: String,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("did", &self.did)
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
struct Claims {
    #[serde(default)]
    scope: Option<String>,
}

impl Session {
    pub fn new(
        did: impl Into<String>,
        handle: impl Into<String>,
        access_jwt: impl Into<String>,
        refresh_jwt: impl Into<String>,
    ) -> Self {
        Self {
            did: did.into(),
            handle: handle.into(),
            access_jwt: access_jwt.into(),
            refresh_jwt: refresh_jwt.into(),
        }
    }

    pub fn access_jwt(&self) -> &str {
        &self.access_jwt
    }

    pub fn refresh_jwt(&self) -> &str {
        &self.refresh_jwt
    }

    /// The `scope` claim of the access token. The signature is not checked;
    /// the server already vouched for the token.
    pub fn token_scope(&self) -> Result<Option<String>, XrpcError> {
        let payload = self
            .access_jwt
            .split('.')
            .nth(1)
            .ok_or_else(|| XrpcError::MalformedToken("expected three dot-separated parts".into()))?;
        let bytes = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .map_err(|err| XrpcError::MalformedToken(err.to_string()))?;
        let claims: Claims = serde_json::from_slice(&bytes)
            .map_err(|err| XrpcError::MalformedToken(err.to_string()))?;
        Ok(claims.scope)
    }
}

/// Refuses sessions created with the main account password.
pub fn ensure_app_password(session: &Session) -> Result<(), XrpcError> {
    match session.token_scope()? {
        Some(scope) if scope == APP_PASSWORD_SCOPE => Ok(()),
        other => Err(XrpcError::NotAppPassword {
            scope: other.unwrap_or_default(),
        }),
    }
}

#[cfg(test)]
pub(crate) fn test_token(claims: &serde_json::Value) -> String {
    format!(
        "{}.{}.signature",
        URL_SAFE_NO_PAD.encode(br#"{"typ":"at+jwt","alg":"ES256K"}"#),
        URL_SAFE_NO_PAD.encode(claims.to_string())
    )
}
