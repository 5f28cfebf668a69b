//! Async Rust driver for the [ArangoDB](https://arangodb.com) HTTP API.
//!
//! # Driver overview
//! ### Connecting
//! All driver activity starts at the [ArangoClient]\
//! `ArangoClient` is created by specifying the servers (or cluster coordinators) to talk to:
//!
//! ```rust,no_run
//! use arango::{ArangoClient, ClientBuilder};
//! use std::error::Error;
//!
//! fn main() -> Result<(), Box<dyn Error>> {
//!     let client: ArangoClient = ClientBuilder::new()
//!         .host("http://127.0.0.1:8529")
//!         .host("http://10.0.0.2:8529")
//!         .resolver_strategy("roundrobin")
//!         .build()?;
//!
//!     Ok(())
//! }
//! ```
//! Building a client opens no connections. Requests go to the host picked by
//! the [host resolver](crate::policies::host_resolver); when a host cannot be
//! reached, the request is retried on the next one, up to `max_tries` attempts.
//!
//! ### Opening a database
//! A database wrapper is obtained with [`ArangoClient::db`], choosing how the
//! connection authenticates:
//! * [Basic](AuthMethod::Basic): username and password sent with every request,
//! * [Jwt](AuthMethod::Jwt): a user token obtained from the credentials and
//!   refreshed when the server rejects it close to its expiry,
//! * [Superuser](AuthMethod::Superuser): a token signed with the server secret.
//!
//! ```rust,no_run
//! # use arango::{ArangoClient, AuthMethod, DatabaseOptions};
//! # use arango::authentication::Auth;
//! # async fn example(client: ArangoClient) -> Result<(), Box<dyn std::error::Error>> {
//! let options = DatabaseOptions::new()
//!     .auth(Auth::new("root", "passwd"))
//!     .verify(true);
//! let db = client.db("school", AuthMethod::Jwt, options).await?;
//! let students = db.collection("students");
//! let count = students.count().await?.into_value()?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Execution contexts
//! The same API is available through three database wrappers:
//! * [`StandardDatabase`] executes calls directly,
//! * [`TransactionDatabase`] runs them inside a stream transaction,
//! * [`AsyncDatabase`] has the server queue them and returns [`AsyncJob`]s.
//!
//! Every call returns an [`ApiResult`] which tells these outcomes apart.

#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod api;
pub mod authentication;
pub mod client;
pub mod errors;
pub mod execution;
pub mod network;
pub mod policies;

pub(crate) mod utils;

pub use arango_http::{errno, Method, Request, Response};

pub use api::{
    AsyncDatabase, Cursor, Database, StandardCollection, StandardDatabase, TransactionDatabase,
};
pub use client::{ArangoClient, AuthMethod, ClientBuilder, ClientConfig, DatabaseOptions};
pub use execution::{ApiResult, AsyncJob, JobStatus};
