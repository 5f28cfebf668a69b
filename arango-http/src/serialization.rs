//! Pluggable JSON (de)serialization of request payloads and response bodies.
//!
//! Custom implementations can be injected into the client to override how
//! payloads are encoded; the default produces compact JSON.

use std::fmt::Debug;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

/// Failed to turn a value into a request payload.
#[derive(Error, Debug, Clone)]
#[error("Failed to serialize data: {0}")]
pub struct SerializationError(pub Arc<str>);

impl From<serde_json::Error> for SerializationError {
    fn from(err: serde_json::Error) -> Self {
        SerializationError(err.to_string().into())
    }
}

/// Failed to decode a response body.
#[derive(Error, Debug, Clone)]
#[error("Failed to deserialize data: {0}")]
pub struct DeserializationError(pub Arc<str>);

impl From<serde_json::Error> for DeserializationError {
    fn from(err: serde_json::Error) -> Self {
        DeserializationError(err.to_string().into())
    }
}

/// Encodes JSON values into request payloads.
pub trait Serializer: Debug + Send + Sync {
    /// Serializes any JSON value.
    ///
    /// This is used for every payload sent by the client, so it should be cheap.
    fn dumps(&self, data: &Value) -> Result<String, SerializationError>;
}

/// Decodes response bodies into JSON values.
pub trait Deserializer: Debug + Send + Sync {
    /// Deserializes a response body.
    fn loads(&self, data: &[u8]) -> Result<Value, DeserializationError>;
}

/// Compact JSON serializer (no whitespace between tokens).
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn dumps(&self, data: &Value) -> Result<String, SerializationError> {
        Ok(serde_json::to_string(data)?)
    }
}

/// Plain JSON deserializer.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonDeserializer;

impl Deserializer for JsonDeserializer {
    fn loads(&self, data: &[u8]) -> Result<Value, DeserializationError> {
        Ok(serde_json::from_slice(data)?)
    }
}

pub type DefaultSerializer = JsonSerializer;
pub type DefaultDeserializer = JsonDeserializer;
