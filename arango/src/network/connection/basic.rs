use arango_http::{Request, Response};
use async_trait::async_trait;

use super::{BaseConnection, Connection, ConnectionParts};
use crate::authentication::Auth;
use crate::errors::{ConfigError, ExecutionError};

/// Connection authenticating every request with HTTP Basic credentials.
#[derive(Debug)]
pub struct BasicConnection {
    base: BaseConnection,
    auth: Option<Auth>,
    auth_header: Option<String>,
}

impl BasicConnection {
    /// Without credentials, requests are sent unauthenticated.
    pub fn new(parts: ConnectionParts, auth: Option<Auth>) -> Result<Self, ConfigError> {
        let auth_header = auth.as_ref().map(Auth::basic_header).transpose()?;
        Ok(BasicConnection {
            base: BaseConnection::new(parts)?,
            auth,
            auth_header,
        })
    }

    /// Credentials used for the Basic header, if any.
    pub fn auth(&self) -> Option<&Auth> {
        self.auth.as_ref()
    }
}

#[async_trait]
impl Connection for BasicConnection {
    fn base(&self) -> &BaseConnection {
        &self.base
    }

    async fn send_request(&self, mut request: Request) -> Result<Response, ExecutionError> {
        self.base.compress_request(&mut request)?;
        if let Some(header) = &self.auth_header {
            request.set_header("authorization", header.as_str());
        }
        self.base.process_request(&request).await
    }
}
