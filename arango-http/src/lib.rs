//! Defines HTTP-level types and traits for talking to the ArangoDB REST API.
//!
//! Mainly intended to be used by the `arango` driver, but can also be useful for
//! other applications (e.g. test servers) that need to speak the same wire format.
//! Nothing in this crate performs I/O.

pub mod errno;
pub mod request;
pub mod response;
pub mod serialization;

pub use request::{Headers, Method, ParamValue, Params, Request};
pub use response::{ErrorBody, Response};
pub use serialization::{
    DefaultDeserializer, DefaultSerializer, DeserializationError, Deserializer,
    JsonDeserializer, JsonSerializer, SerializationError, Serializer,
};

/// Product name advertised in the `x-arango-driver` header.
pub const DRIVER_NAME: &str = "arango-rs";

/// Version advertised in the `x-arango-driver` header.
pub const DRIVER_VERSION: &str = env!("CARGO_PKG_VERSION");
