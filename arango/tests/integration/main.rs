mod aql;
mod authenticate;
mod documents;
mod failover;
mod jobs;
mod transactions;
pub(crate) mod utils;
