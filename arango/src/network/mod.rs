//! Everything between a [`Request`](arango_http::Request) and the wire:
//! the transport abstraction, its default `reqwest`-based implementation,
//! request compression, and the connections tying them to a database.

mod compression;
mod connection;
mod default_client;
mod http;

pub use compression::{AcceptEncoding, CompressionManager, DefaultCompressionManager};
pub use connection::{
    BaseConnection, BasicConnection, Connection, ConnectionParts, JwtConnection,
    JwtSuperuserConnection,
};
pub use default_client::{DefaultHttpClient, HttpClientConfig};
pub use http::{HttpClient, HttpSession, TransportError};

#[cfg(test)]
pub(crate) use compression::decompress;
