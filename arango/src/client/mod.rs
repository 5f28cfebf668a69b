//! The client and its builder.

pub mod arango_client;
pub mod client_builder;

pub use arango_client::{ArangoClient, AuthMethod, DatabaseOptions};
pub use client_builder::{ClientBuilder, ClientConfig, DEFAULT_HOST};
