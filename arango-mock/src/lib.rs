//! A fake ArangoDB coordinator for testing drivers.
//!
//! The server keeps databases, collections, documents, cursors, stream
//! transactions and async job results in memory, authenticates with Basic
//! credentials or JWT tokens, and lets tests inject failures and delays with
//! [`RequestRule`]s.

mod actions;
mod errors;
mod server;
mod store;

pub use actions::{Condition, Reaction, RequestRule};
pub use errors::MockServerError;
pub use server::{MockServer, MockServerBuilder, RecordedRequest, RunningMockServer};

#[cfg(test)]
pub(crate) fn setup_tracing() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::Layer;

    let testing_layer = tracing_subscriber::fmt::layer()
        .with_test_writer()
        .with_filter(tracing_subscriber::EnvFilter::from_default_env());
    let noop_layer = tracing_subscriber::fmt::layer().with_writer(std::io::sink);
    let _ = tracing_subscriber::registry()
        .with(testing_layer)
        .with(noop_layer)
        .try_init();
}
