use arango_http::{Request, Response};
use async_trait::async_trait;

use super::{BaseConnection, Connection, ConnectionParts};
use crate::authentication::{JwtToken, TokenHolder};
use crate::errors::{ConfigError, ExecutionError};

/// Connection authenticating with a superuser JWT token.
///
/// The token is typically generated from the server's JWT secret with
/// [`JwtToken::generate`]. It is never refreshed; replace it with
/// [`JwtSuperuserConnection::set_token`] before it expires.
#[derive(Debug)]
pub struct JwtSuperuserConnection {
    base: BaseConnection,
    tokens: TokenHolder,
}

impl JwtSuperuserConnection {
    /// Fails with [`ConfigError::MissingCredentials`] without a token.
    pub fn new(parts: ConnectionParts, token: Option<JwtToken>) -> Result<Self, ConfigError> {
        let Some(token) = token else {
            return Err(ConfigError::MissingCredentials(
                "A superuser token must be provided",
            ));
        };
        Ok(JwtSuperuserConnection {
            base: BaseConnection::new(parts)?,
            tokens: TokenHolder::new(Some(token)),
        })
    }

    /// The token currently sent.
    pub fn token(&self) -> Option<JwtToken> {
        self.tokens.load().map(|bearer| bearer.token().clone())
    }

    /// Replaces the token used by subsequent requests.
    pub fn set_token(&self, token: JwtToken) {
        self.tokens.store(token);
    }
}

#[async_trait]
impl Connection for JwtSuperuserConnection {
    fn base(&self) -> &BaseConnection {
        &self.base
    }

    async fn send_request(&self, mut request: Request) -> Result<Response, ExecutionError> {
        let bearer = self.tokens.load().ok_or(ExecutionError::AuthHeader)?;
        request.set_header("authorization", bearer.header());
        self.base.compress_request(&mut request)?;
        self.base.process_request(&request).await
    }
}
