use std::net::SocketAddr;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MockServerError {
    #[error("Listen on {0} failed with {1}")]
    Listen(SocketAddr, std::io::Error),
    #[error("Could not read the bound address: {0}")]
    LocalAddr(std::io::Error),
    #[error("Server task failed: {0}")]
    Serve(String),
}
