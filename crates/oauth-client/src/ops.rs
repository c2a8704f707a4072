//! Remote auth operations against the authorization server
//!
//! Three endpoint interactions, each a pure request/response function over a
//! [`Credential`]:
//! 1. refresh — exchange the refresh token for new tokens
//! 2. validate — ask whether the current access token is still usable
//! 3. revoke — invalidate a token (used by external tooling, not the store)
//!
//! Classification happens here, at the boundary: callers only ever see a
//! success value or an [`Error`], never a raw transport failure or status
//! code. The store's state machine depends on that.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::OAuthConfig;
use crate::credential::Credential;
use crate::error::{Error, Result};

/// Boxed future for dyn-compatibility (`Arc<dyn AuthOps>`).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Response from the token endpoint for a refresh.
///
/// `expires_in` is a delta in seconds from the response time. The caller
/// converts this to an absolute unix millisecond timestamp when merging
/// into a credential. `refresh_token` may be omitted by servers that do
/// not rotate refresh tokens.
#[derive(Debug, Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Seconds until the access token expires (delta, not absolute)
    pub expires_in: u64,
    #[serde(default)]
    pub scope: Option<String>,
}

/// Abstraction over the three remote auth operations.
///
/// The store actor holds an `Arc<dyn AuthOps>`, so tests can substitute a
/// stub without any network. Uses `BoxFuture` return types for
/// dyn-compatibility.
pub trait AuthOps: Send + Sync {
    /// Exchange the credential's refresh token for new tokens.
    fn refresh<'a>(&'a self, credential: &'a Credential) -> BoxFuture<'a, Result<TokenResponse>>;

    /// Check whether the credential's access token is still usable.
    fn validate<'a>(&'a self, credential: &'a Credential) -> BoxFuture<'a, Result<()>>;

    /// Invalidate the credential's access token at the server.
    fn revoke<'a>(&'a self, credential: &'a Credential) -> BoxFuture<'a, Result<()>>;
}

/// Authorization server endpoint URLs.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub token_url: String,
    pub validate_url: String,
    pub revoke_url: String,
}

/// `AuthOps` implementation over HTTP via reqwest.
pub struct HttpAuthOps {
    client: reqwest::Client,
    endpoints: Endpoints,
}

impl HttpAuthOps {
    /// Build from an existing client (the client carries the timeout).
    pub fn new(client: reqwest::Client, endpoints: Endpoints) -> Self {
        Self { client, endpoints }
    }

    /// Build a client with the configured request timeout and endpoints.
    pub fn from_config(config: &OAuthConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Http(format!("building HTTP client: {e}")))?;
        Ok(Self::new(client, config.endpoints()))
    }

    async fn do_refresh(&self, credential: &Credential) -> Result<TokenResponse> {
        let refresh_token = credential
            .refresh_token
            .as_deref()
            .ok_or(Error::MissingRefreshToken)?;

        let mut form = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", credential.client_id.as_str()),
        ];
        if let Some(secret) = credential.client_secret.as_deref() {
            form.push(("client_secret", secret));
        }

        let response = self
            .client
            .post(&self.endpoints.token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| Error::Http(format!("token refresh request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<no body>"));

            // 401/403 means the refresh token is revoked or invalid
            if status.as_u16() == 401 || status.as_u16() == 403 {
                return Err(Error::InvalidCredentials(format!(
                    "refresh token rejected ({status}): {body}"
                )));
            }

            return Err(Error::TokenExchange(format!(
                "token endpoint returned {status}: {body}"
            )));
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| Error::TokenExchange(format!("invalid refresh response: {e}")))
    }

    async fn do_validate(&self, credential: &Credential) -> Result<()> {
        let access_token = credential
            .access_token
            .as_deref()
            .ok_or(Error::MissingAccessToken)?;

        let response = self
            .client
            .get(&self.endpoints.validate_url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| Error::Http(format!("validate request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            debug!(%status, "access token failed validation");
            return Err(Error::Validation(format!(
                "validate endpoint returned {status}"
            )));
        }

        Ok(())
    }

    async fn do_revoke(&self, credential: &Credential) -> Result<()> {
        let token = credential
            .access_token
            .as_deref()
            .ok_or(Error::MissingAccessToken)?;

        let response = self
            .client
            .post(&self.endpoints.revoke_url)
            .form(&[
                ("client_id", credential.client_id.as_str()),
                ("token", token),
            ])
            .send()
            .await
            .map_err(|e| Error::Http(format!("revoke request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Revocation(format!(
                "revoke endpoint returned {status}"
            )));
        }

        Ok(())
    }
}

impl AuthOps for HttpAuthOps {
    fn refresh<'a>(&'a self, credential: &'a Credential) -> BoxFuture<'a, Result<TokenResponse>> {
        Box::pin(self.do_refresh(credential))
    }

    fn validate<'a>(&'a self, credential: &'a Credential) -> BoxFuture<'a, Result<()>> {
        Box::pin(self.do_validate(credential))
    }

    fn revoke<'a>(&'a self, credential: &'a Credential) -> BoxFuture<'a, Result<()>> {
        Box::pin(self.do_revoke(credential))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn ops_for(server: &MockServer) -> HttpAuthOps {
        HttpAuthOps::new(
            reqwest::Client::new(),
            Endpoints {
                token_url: format!("{}/oauth2/token", server.uri()),
                validate_url: format!("{}/oauth2/validate", server.uri()),
                revoke_url: format!("{}/oauth2/revoke", server.uri()),
            },
        )
    }

    fn credential() -> Credential {
        Credential {
            client_id: "client-1".into(),
            client_secret: Some("shh".into()),
            access_token: Some("at_old".into()),
            refresh_token: Some("rt_old".into()),
            expires_at: Some(0),
        }
    }

    #[tokio::test]
    async fn refresh_parses_token_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=rt_old"))
            .and(body_string_contains("client_id=client-1"))
            .and(body_string_contains("client_secret=shh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "at_new",
                "refresh_token": "rt_new",
                "expires_in": 3600,
                "scope": "chat:read"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let token = ops_for(&server).refresh(&credential()).await.unwrap();
        assert_eq!(token.access_token, "at_new");
        assert_eq!(token.refresh_token.as_deref(), Some("rt_new"));
        assert_eq!(token.expires_in, 3600);
        assert_eq!(token.scope.as_deref(), Some("chat:read"));
    }

    /// Matches requests whose body does not contain the given substring.
    struct BodyLacks(&'static str);

    impl wiremock::Match for BodyLacks {
        fn matches(&self, request: &wiremock::Request) -> bool {
            !String::from_utf8_lossy(&request.body).contains(self.0)
        }
    }

    #[tokio::test]
    async fn refresh_without_secret_omits_form_field() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .and(BodyLacks("client_secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "at_new",
                "expires_in": 60
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut cred = credential();
        cred.client_secret = None;
        let token = ops_for(&server).refresh(&cred).await.unwrap();
        // Server omitted refresh_token; response leaves it None for the
        // caller's merge logic to fall back
        assert_eq!(token.refresh_token, None);
    }

    #[tokio::test]
    async fn refresh_401_is_invalid_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid_grant"))
            .mount(&server)
            .await;

        let err = ops_for(&server).refresh(&credential()).await.unwrap_err();
        assert!(matches!(err, Error::InvalidCredentials(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn refresh_500_is_token_exchange_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = ops_for(&server).refresh(&credential()).await.unwrap_err();
        assert!(matches!(err, Error::TokenExchange(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn refresh_without_refresh_token_fails_fast() {
        let server = MockServer::start().await;
        let mut cred = credential();
        cred.refresh_token = None;

        let err = ops_for(&server).refresh(&cred).await.unwrap_err();
        assert!(matches!(err, Error::MissingRefreshToken));
        // No request reaches the server (no mounted mock would match anyway)
    }

    #[tokio::test]
    async fn validate_200_is_ok() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/oauth2/validate"))
            .and(header("authorization", "Bearer at_old"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        ops_for(&server).validate(&credential()).await.unwrap();
    }

    #[tokio::test]
    async fn validate_401_is_validation_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/oauth2/validate"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = ops_for(&server).validate(&credential()).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn validate_without_access_token_fails_fast() {
        let server = MockServer::start().await;
        let mut cred = credential();
        cred.access_token = None;

        let err = ops_for(&server).validate(&cred).await.unwrap_err();
        assert!(matches!(err, Error::MissingAccessToken));
    }

    #[tokio::test]
    async fn revoke_posts_client_id_and_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/revoke"))
            .and(body_string_contains("client_id=client-1"))
            .and(body_string_contains("token=at_old"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        ops_for(&server).revoke(&credential()).await.unwrap();
    }

    #[tokio::test]
    async fn revoke_non_success_is_revocation_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/revoke"))
            .respond_with(ResponseTemplate::new(400))
            .mount(&server)
            .await;

        let err = ops_for(&server).revoke(&credential()).await.unwrap_err();
        assert!(matches!(err, Error::Revocation(_)), "got {err:?}");
    }
}
