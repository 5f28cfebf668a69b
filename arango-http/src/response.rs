//! Incoming HTTP responses.

use std::fmt::{self, Display};

use bytes::Bytes;
use serde::Deserialize;
use serde_json::Value;

use crate::request::{Headers, Method};

/// Structured error body sent by the server alongside a non-2xx status, e.g.
/// `{"error": true, "code": 404, "errorNum": 1203, "errorMessage": "collection or view not found"}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: bool,
    #[serde(default)]
    pub code: Option<u16>,
    #[serde(rename = "errorNum", default)]
    pub error_num: Option<i64>,
    #[serde(rename = "errorMessage", default)]
    pub error_message: Option<String>,
}

/// An HTTP response, as returned by the transport.
///
/// `is_success`, `error_code` and `error_message` are unset until the connection
/// normalizes the response; they must not be relied upon before that.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// Method of the request this is a response to.
    pub method: Method,
    /// Resolved URL of the request.
    pub url: String,
    /// Response headers, keyed by lower-case name.
    pub headers: Headers,
    pub status_code: u16,
    pub status_text: String,
    pub raw_body: Bytes,
    /// Server error number (`errorNum`), if the body carried a structured error.
    pub error_code: Option<i64>,
    /// Server error message (`errorMessage`), if the body carried a structured error.
    pub error_message: Option<String>,
    /// `true` iff the status code is 2xx. Set during normalization.
    pub is_success: Option<bool>,
}

impl Response {
    pub fn new<K, V>(
        method: Method,
        url: impl Into<String>,
        headers: impl IntoIterator<Item = (K, V)>,
        status_code: u16,
        status_text: impl Into<String>,
        raw_body: impl Into<Bytes>,
    ) -> Self
    where
        K: AsRef<str>,
        V: Into<String>,
    {
        Response {
            method,
            url: url.into(),
            headers: headers
                .into_iter()
                .map(|(k, v)| (k.as_ref().to_ascii_lowercase(), v.into()))
                .collect(),
            status_code,
            status_text: status_text.into(),
            raw_body: raw_body.into(),
            error_code: None,
            error_message: None,
            is_success: None,
        }
    }

    /// Looks up a header by name, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Whether the normalized response was successful.
    /// An unnormalized response is never considered successful.
    pub fn is_success(&self) -> bool {
        self.is_success.unwrap_or(false)
    }

    /// Fills `is_success` from the status code range.
    pub fn mark_status(&mut self) {
        self.is_success = Some((200..300).contains(&self.status_code));
    }

    /// Copies `errorNum`/`errorMessage` out of a decoded error body.
    /// Bodies without `"error": true` are ignored.
    pub fn apply_error_body(&mut self, body: &Value) {
        let Ok(body) = ErrorBody::deserialize(body) else {
            return;
        };
        if body.error {
            self.error_code = body.error_num;
            self.error_message = body.error_message;
        }
    }
}

impl Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<{} {} {} {}>",
            self.method, self.url, self.status_code, self.status_text
        )
    }
}
