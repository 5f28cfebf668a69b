//! Outgoing HTTP requests.
//!
//! A [`Request`] is built fresh for every API call. Construction normalizes it:
//! header names are lower-cased (a caller header replaces a default one with the
//! same name, regardless of case) and query parameter values are stringified,
//! with booleans sent as `"0"`/`"1"`.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use bytes::Bytes;

use crate::{DRIVER_NAME, DRIVER_VERSION};

/// HTTP headers, keyed by lower-case name.
pub type Headers = BTreeMap<String, String>;

/// Normalized URL query parameters.
pub type Params = BTreeMap<String, String>;

/// HTTP method of a [`Request`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl Method {
    /// Upper-case method name, as sent on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
        }
    }
}

impl Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A query parameter value before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
}

impl ParamValue {
    /// The string sent on the wire. Booleans become `"1"` or `"0"`.
    pub fn normalize(&self) -> String {
        match self {
            ParamValue::Bool(true) => "1".to_owned(),
            ParamValue::Bool(false) => "0".to_owned(),
            ParamValue::Int(v) => v.to_string(),
            ParamValue::UInt(v) => v.to_string(),
            ParamValue::Float(v) => v.to_string(),
            ParamValue::Str(v) => v.clone(),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

macro_rules! impl_param_from_int {
    ($variant:ident, $target:ty, $($t:ty),*) => {
        $(
            impl From<$t> for ParamValue {
                fn from(value: $t) -> Self {
                    ParamValue::$variant(value as $target)
                }
            }
        )*
    };
}

impl_param_from_int!(Int, i64, i8, i16, i32, i64);
impl_param_from_int!(UInt, u64, u8, u16, u32, u64, usize);

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Float(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Str(value.to_owned())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Str(value)
    }
}

impl From<&String> for ParamValue {
    fn from(value: &String) -> Self {
        ParamValue::Str(value.clone())
    }
}

/// An HTTP request addressed to the REST API of a single database.
///
/// The endpoint is relative to the database (`/_api/collection`, not
/// `/_db/mydb/_api/collection`); the connection adds the database prefix when
/// the request is sent.
///
/// Every request starts with three headers:
/// `charset: utf-8`, `content-type: application/json` and
/// `x-arango-driver: <name>/<version>`.
///
/// The `Debug` output masks the `authorization` header.
#[derive(Clone, PartialEq)]
pub struct Request {
    method: Method,
    endpoint: String,
    headers: Headers,
    params: Params,
    data: Option<Bytes>,
}

const REDACTED: &str = "<redacted>";

struct RedactedHeaders<'a>(&'a Headers);

impl fmt::Debug for RedactedHeaders<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.0.iter().map(|(name, value)| {
                let value = if name == "authorization" {
                    REDACTED
                } else {
                    value.as_str()
                };
                (name, value)
            }))
            .finish()
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("endpoint", &self.endpoint)
            .field("headers", &RedactedHeaders(&self.headers))
            .field("params", &self.params)
            .field("data", &self.data)
            .finish()
    }
}

impl Request {
    /// Creates a request with the default headers, no parameters and no payload.
    pub fn new(method: Method, endpoint: impl Into<String>) -> Self {
        let mut headers = Headers::new();
        headers.insert("charset".to_owned(), "utf-8".to_owned());
        headers.insert("content-type".to_owned(), "application/json".to_owned());
        headers.insert(
            "x-arango-driver".to_owned(),
            format!("{DRIVER_NAME}/{DRIVER_VERSION}"),
        );

        Request {
            method,
            endpoint: endpoint.into(),
            headers,
            params: Params::new(),
            data: None,
        }
    }

    /// Adds (or replaces) a header. The name is lower-cased.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.set_header(name, value);
        self
    }

    /// Adds (or replaces) several headers at once.
    pub fn with_headers<K, V>(mut self, headers: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: Into<String>,
    {
        for (name, value) in headers {
            self.set_header(name, value);
        }
        self
    }

    /// Adds (or replaces) a query parameter.
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params.insert(name.into(), value.into().normalize());
        self
    }

    /// Adds a query parameter only if `value` is `Some`.
    pub fn with_opt_param<V: Into<ParamValue>>(
        self,
        name: impl Into<String>,
        value: Option<V>,
    ) -> Self {
        match value {
            Some(value) => self.with_param(name, value),
            None => self,
        }
    }

    /// Sets the request payload.
    pub fn with_data(mut self, data: impl Into<Bytes>) -> Self {
        self.data = Some(data.into());
        self
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Looks up a header by name, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn data(&self) -> Option<&Bytes> {
        self.data.as_ref()
    }

    /// Adds (or replaces) a header in place. The name is lower-cased.
    pub fn set_header(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        self.headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
    }

    /// Replaces the payload in place.
    pub fn set_data(&mut self, data: impl Into<Bytes>) {
        self.data = Some(data.into());
    }

    /// Returns a copy of this request whose endpoint is prefixed with `prefix`.
    pub fn with_endpoint_prefix(&self, prefix: &str) -> Request {
        let mut routed = self.clone();
        routed.endpoint = format!("{prefix}{}", self.endpoint);
        routed
    }
}

impl Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} {}>", self.method, self.endpoint)
    }
}
