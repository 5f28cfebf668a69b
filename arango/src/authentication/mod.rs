//! Credentials used by connections: username/password pairs and JWT tokens.

mod jwt;

use std::fmt::{self, Display};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::errors::ConfigError;

pub use jwt::{BearerToken, JwtError, JwtToken, TokenHolder, TokenOptions, TOKEN_ISSUER};

/// Character encoding applied to credentials before they are base64-encoded
/// into a Basic `Authorization` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum TextEncoding {
    /// UTF-8.
    #[default]
    Utf8,
    /// ISO-8859-1. Only code points up to U+00FF can be represented.
    Latin1,
}

impl TextEncoding {
    fn encode(self, text: &str) -> Result<Vec<u8>, ConfigError> {
        match self {
            TextEncoding::Utf8 => Ok(text.as_bytes().to_vec()),
            TextEncoding::Latin1 => text
                .chars()
                .map(|c| u8::try_from(u32::from(c)).map_err(|_| ConfigError::UnencodableCredentials(self)))
                .collect(),
        }
    }
}

impl Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextEncoding::Utf8 => f.write_str("utf-8"),
            TextEncoding::Latin1 => f.write_str("latin-1"),
        }
    }
}

/// A username/password pair.
///
/// Used directly by basic-auth connections, and by JWT connections to obtain
/// fresh tokens from the server.
#[derive(Clone, PartialEq, Eq)]
pub struct Auth {
    username: String,
    password: String,
    encoding: TextEncoding,
}

impl Auth {
    /// Creates credentials encoded as UTF-8.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Auth {
            username: username.into(),
            password: password.into(),
            encoding: TextEncoding::Utf8,
        }
    }

    /// Changes the encoding used for the Basic header.
    pub fn with_encoding(mut self, encoding: TextEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// User name.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Password.
    pub fn password(&self) -> &str {
        &self.password
    }

    /// Encoding of the Basic header.
    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    /// The value of the `Authorization` header for HTTP Basic authentication.
    pub fn basic_header(&self) -> Result<String, ConfigError> {
        let credentials = self
            .encoding
            .encode(&format!("{}:{}", self.username, self.password))?;
        Ok(format!("Basic {}", STANDARD.encode(credentials)))
    }
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Auth")
            .field("username", &self.username)
            .field("password", &"<hidden>")
            .field("encoding", &self.encoding)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use arango_http::{Method, Request};
    use assert_matches::assert_matches;

    use super::{Auth, TextEncoding};
    use crate::errors::ConfigError;

    #[test]
    fn basic_header_utf8() {
        let auth = Auth::new("root", "passwd");
        assert_eq!(auth.basic_header().unwrap(), "Basic cm9vdDpwYXNzd2Q=");
    }

    #[test]
    fn basic_header_latin1() {
        let auth = Auth::new("jos\u{e9}", "x").with_encoding(TextEncoding::Latin1);
        // "josé:x" in ISO-8859-1 is 6a 6f 73 e9 3a 78.
        assert_eq!(auth.basic_header().unwrap(), "Basic am9z6Tp4");

        let utf8 = Auth::new("jos\u{e9}", "x");
        assert_ne!(utf8.basic_header().unwrap(), auth.basic_header().unwrap());
    }

    #[test]
    fn latin1_rejects_wide_characters() {
        let auth = Auth::new("\u{4e2d}", "x").with_encoding(TextEncoding::Latin1);
        assert_matches!(
            auth.basic_header(),
            Err(ConfigError::UnencodableCredentials(TextEncoding::Latin1))
        );
    }

    #[test]
    fn debug_hides_password() {
        let auth = Auth::new("root", "hunter2");
        let printed = format!("{auth:?}");
        assert!(printed.contains("root"));
        assert!(!printed.contains("hunter2"));
    }

    #[test]
    fn debug_of_authorized_request_hides_header() {
        let header = Auth::new("root", "hunter2").basic_header().unwrap();
        let request = Request::new(Method::Get, "/_api/version").with_header("authorization", header);
        assert!(!format!("{request:?}").contains("cm9vdDpodW50ZXIy"));
    }
}
