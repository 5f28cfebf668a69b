use std::time::Duration;

use arango_http::errno::HTTP_UNAUTHORIZED;
use arango_http::{Method, Request, Response};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::{raise_for_auth, AuthFailures, BaseConnection, Connection, ConnectionParts};
use crate::authentication::{Auth, BearerToken, JwtToken, TokenHolder};
use crate::errors::{ConfigError, ExecutionError, JwtRefreshError};

/// Connection authenticating with JWT tokens obtained from credentials.
///
/// The token is fetched lazily, before the first request. When a request is
/// rejected with 401 and the token is about to expire (within the configured
/// leeway), the token is refreshed once and the request is sent once more.
#[derive(Debug)]
pub struct JwtConnection {
    base: BaseConnection,
    auth: Option<Auth>,
    tokens: TokenHolder,
    expire_leeway: Duration,
}

impl JwtConnection {
    /// At least one of `auth` and `token` is required. Without `auth`, the
    /// token cannot be refreshed.
    pub fn new(
        parts: ConnectionParts,
        auth: Option<Auth>,
        token: Option<JwtToken>,
        expire_leeway: Duration,
    ) -> Result<Self, ConfigError> {
        if auth.is_none() && token.is_none() {
            return Err(ConfigError::MissingCredentials(
                "Either token or auth must be provided",
            ));
        }
        Ok(JwtConnection {
            base: BaseConnection::new(parts)?,
            auth,
            tokens: TokenHolder::new(token),
            expire_leeway,
        })
    }

    /// The token currently in use.
    pub fn token(&self) -> Option<JwtToken> {
        self.tokens.load().map(|bearer| bearer.token().clone())
    }

    /// Replaces the token. `None` makes the next request fetch a new one.
    pub fn set_token(&self, token: Option<JwtToken>) {
        match token {
            Some(token) => self.tokens.store(token),
            None => self.tokens.clear(),
        }
    }

    /// How long before expiry a rejected token is refreshed.
    pub fn expire_leeway(&self) -> Duration {
        self.expire_leeway
    }

    /// Logs in with the connection's credentials and stores the new token.
    pub async fn refresh_token(&self) -> Result<(), JwtRefreshError> {
        let result = self.fetch_token().await;
        match &result {
            Ok(token) => {
                debug!(db = self.base.db_name(), expires_at = token.expires_at(), "JWT token refreshed");
                self.tokens.store(token.clone());
            }
            Err(e) => warn!(db = self.base.db_name(), error = %e, "JWT token refresh failed"),
        }
        result.map(|_| ())
    }

    async fn fetch_token(&self) -> Result<JwtToken, JwtRefreshError> {
        let auth = self.auth.as_ref().ok_or(JwtRefreshError::NoCredentials)?;
        let payload = self
            .base
            .serializer()
            .dumps(&json!({"username": auth.username(), "password": auth.password()}))
            .map_err(JwtRefreshError::Serialization)?;
        let request = Request::new(Method::Post, "/_open/auth").with_data(payload);

        debug!(db = self.base.db_name(), "Refreshing JWT token");
        let response = self
            .base
            .process(&request, AuthFailures::Return)
            .await
            .map_err(|e| JwtRefreshError::Request(Box::new(e)))?;
        if !response.is_success() {
            return Err(JwtRefreshError::Rejected {
                status: response.status_code,
                status_text: response.status_text,
            });
        }

        let body = self
            .base
            .deserializer()
            .loads(&response.raw_body)
            .map_err(|e| JwtRefreshError::MalformedResponse(e.to_string()))?;
        let jwt = body.get("jwt").and_then(Value::as_str).ok_or_else(|| {
            JwtRefreshError::MalformedResponse("missing \"jwt\" field".to_owned())
        })?;
        JwtToken::new(jwt).map_err(JwtRefreshError::InvalidToken)
    }

    async fn current_bearer(&self) -> Result<std::sync::Arc<BearerToken>, ExecutionError> {
        if let Some(bearer) = self.tokens.load() {
            return Ok(bearer);
        }
        self.refresh_token().await?;
        self.tokens.load().ok_or(ExecutionError::AuthHeader)
    }
}

#[async_trait]
impl Connection for JwtConnection {
    fn base(&self) -> &BaseConnection {
        &self.base
    }

    async fn send_request(&self, mut request: Request) -> Result<Response, ExecutionError> {
        let bearer = self.current_bearer().await?;
        request.set_header("authorization", bearer.header());
        self.base.compress_request(&mut request)?;

        let response = self.base.process(&request, AuthFailures::Return).await?;
        if response.status_code == HTTP_UNAUTHORIZED
            && bearer.token().needs_refresh(self.expire_leeway)
        {
            self.refresh_token().await?;
            let bearer = self.tokens.load().ok_or(ExecutionError::AuthHeader)?;
            request.set_header("authorization", bearer.header());
            return self.base.process(&request, AuthFailures::Raise).await;
        }

        raise_for_auth(&request, &response)?;
        Ok(response)
    }
}
