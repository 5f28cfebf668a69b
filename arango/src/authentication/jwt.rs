use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The only issuer accepted for tokens.
pub const TOKEN_ISSUER: &str = "arangodb";

/// Error returned when a JWT token cannot be created or read.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum JwtError {
    /// The `exp` claim lies in the past.
    #[error("JWT token has expired (exp = {expired_at})")]
    Expired {
        /// Expiry of the token, in seconds since the Unix epoch.
        expired_at: i64,
    },

    /// A required claim is absent.
    #[error("JWT token is missing the {0:?} claim")]
    MissingClaim(&'static str),

    /// The issuer is not the database server.
    #[error("JWT token has an invalid issuer: {0:?}")]
    InvalidIssuer(Option<String>),

    /// The token is not a decodable JWT.
    #[error("Malformed JWT token: {0}")]
    Malformed(String),

    /// Signing a new token failed.
    #[error("Failed to encode JWT token: {0}")]
    Encoding(String),
}

#[derive(Deserialize)]
struct RawClaims {
    exp: Option<i64>,
    iat: Option<i64>,
    iss: Option<String>,
}

#[derive(Serialize)]
struct SignedClaims<'a> {
    iat: i64,
    exp: i64,
    iss: &'a str,
    server_id: &'a str,
}

/// Parameters of [`JwtToken::generate`].
#[derive(Debug, Clone)]
pub struct TokenOptions {
    /// Issue time in seconds since the Unix epoch. Defaults to now.
    pub issued_at: Option<i64>,
    /// Lifetime of the token. Defaults to one hour.
    pub expires_in: Duration,
    /// Value of the `iss` claim.
    pub issuer: String,
    /// Value of the `server_id` claim.
    pub server_id: String,
}

impl Default for TokenOptions {
    fn default() -> Self {
        TokenOptions {
            issued_at: None,
            expires_in: Duration::from_secs(3600),
            issuer: TOKEN_ISSUER.to_owned(),
            server_id: "client".to_owned(),
        }
    }
}

/// A JWT token together with the claims the driver relies on.
///
/// The payload is decoded once, at construction, without verifying the
/// signature. A token is immutable: to use a different token string, build a
/// new `JwtToken`.
#[derive(Clone, PartialEq, Eq)]
pub struct JwtToken {
    token: String,
    issued_at: i64,
    expires_at: i64,
}

impl JwtToken {
    /// Decodes `token` and checks its claims.
    ///
    /// Fails with [`JwtError::MissingClaim`] if `iat` or `exp` is absent,
    /// [`JwtError::InvalidIssuer`] if the issuer is not `arangodb`, and
    /// [`JwtError::Expired`] if the token has already expired.
    pub fn new(token: impl Into<String>) -> Result<Self, JwtError> {
        Self::new_at(token.into(), now())
    }

    fn new_at(token: String, now: i64) -> Result<Self, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let claims = jsonwebtoken::decode::<RawClaims>(
            &token,
            &DecodingKey::from_secret(&[]),
            &validation,
        )
        .map_err(|e| JwtError::Malformed(e.to_string()))?
        .claims;

        let expires_at = claims.exp.ok_or(JwtError::MissingClaim("exp"))?;
        let issued_at = claims.iat.ok_or(JwtError::MissingClaim("iat"))?;
        if claims.iss.as_deref() != Some(TOKEN_ISSUER) {
            return Err(JwtError::InvalidIssuer(claims.iss));
        }
        if expires_at <= now {
            return Err(JwtError::Expired {
                expired_at: expires_at,
            });
        }

        Ok(JwtToken {
            token,
            issued_at,
            expires_at,
        })
    }

    /// Signs a new token with HMAC-SHA256 using `secret`.
    ///
    /// This is how superuser tokens are minted from the server's JWT secret.
    pub fn generate(secret: &str, options: TokenOptions) -> Result<Self, JwtError> {
        let issued_at = options.issued_at.unwrap_or_else(now);
        let claims = SignedClaims {
            iat: issued_at,
            exp: issued_at.saturating_add(duration_secs(options.expires_in)),
            iss: &options.issuer,
            server_id: &options.server_id,
        };
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .map_err(|e| JwtError::Encoding(e.to_string()))?;

        Self::new(token)
    }

    /// The encoded token.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Expiry (`exp` claim), in seconds since the Unix epoch.
    pub fn expires_at(&self) -> i64 {
        self.expires_at
    }

    /// Issue time (`iat` claim), in seconds since the Unix epoch.
    pub fn issued_at(&self) -> i64 {
        self.issued_at
    }

    /// Whether the token expires within `leeway` from now.
    pub fn needs_refresh(&self, leeway: Duration) -> bool {
        self.needs_refresh_at(now(), leeway)
    }

    fn needs_refresh_at(&self, now: i64, leeway: Duration) -> bool {
        now > self.expires_at.saturating_sub(duration_secs(leeway))
    }
}

impl fmt::Debug for JwtToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtToken")
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

fn duration_secs(duration: Duration) -> i64 {
    i64::try_from(duration.as_secs()).unwrap_or(i64::MAX)
}

/// A token paired with its precomputed `Authorization` header value.
#[derive(Debug)]
pub struct BearerToken {
    token: JwtToken,
    header: String,
}

impl BearerToken {
    /// Pairs `token` with its header value.
    pub fn new(token: JwtToken) -> Self {
        let header = format!("bearer {}", token.token());
        BearerToken { token, header }
    }

    /// The wrapped token.
    pub fn token(&self) -> &JwtToken {
        &self.token
    }

    /// Value of the `Authorization` header.
    pub fn header(&self) -> &str {
        &self.header
    }
}

/// Holds the token currently used by a connection.
///
/// Concurrent requests read the token without locking; a refresh replaces it
/// in a single atomic store.
#[derive(Debug, Default)]
pub struct TokenHolder {
    current: ArcSwapOption<BearerToken>,
}

impl TokenHolder {
    /// A holder with an initial token, or none.
    pub fn new(token: Option<JwtToken>) -> Self {
        TokenHolder {
            current: ArcSwapOption::new(token.map(|t| Arc::new(BearerToken::new(t)))),
        }
    }

    /// The current token, if any.
    pub fn load(&self) -> Option<Arc<BearerToken>> {
        self.current.load_full()
    }

    /// Replaces the current token.
    pub fn store(&self, token: JwtToken) {
        self.current.store(Some(Arc::new(BearerToken::new(token))));
    }

    /// Drops the current token; the next request fetches a new one.
    pub fn clear(&self) {
        self.current.store(None);
    }
}
