//! Host selection across a fleet of coordinators.
//!
//! A connection asks its resolver for a host index before every attempt of a
//! request. The resolver also bounds the number of attempts through
//! [`HostResolver::max_tries`].
//!
//! Resolvers are shared by all requests of a client, possibly running
//! concurrently; the current index is kept in an atomic, so it always stays
//! within `0..host_count`, even though which host two concurrent requests land
//! on is unspecified.

use std::fmt::Debug;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::errors::ConfigError;

/// Picks the host used for the next attempt of a request.
pub trait HostResolver: Debug + Send + Sync {
    /// Returns the index of the host to use for the next attempt.
    fn get_host_index(&self) -> usize;

    /// Moves on to the next host, wrapping around after the last one.
    fn change_host(&self);

    /// Number of hosts the resolver chooses from.
    fn host_count(&self) -> usize;

    /// The maximum number of attempts for a single request.
    fn max_tries(&self) -> usize;
}

#[derive(Debug)]
struct ResolverState {
    host_count: usize,
    max_tries: usize,
    index: AtomicUsize,
}

impl ResolverState {
    fn new(host_count: usize, max_tries: Option<usize>, start: usize) -> Result<Self, ConfigError> {
        if host_count == 0 {
            return Err(ConfigError::EmptyHostList);
        }
        let max_tries = max_tries.unwrap_or(host_count * 3);
        if max_tries < host_count {
            return Err(ConfigError::MaxTriesBelowHostCount {
                max_tries,
                host_count,
            });
        }
        Ok(ResolverState {
            host_count,
            max_tries,
            index: AtomicUsize::new(start),
        })
    }

    /// Advances the index and returns the new value.
    fn advance(&self) -> usize {
        let n = self.host_count;
        match self
            .index
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |i| Some((i + 1) % n))
        {
            Ok(previous) | Err(previous) => (previous + 1) % n,
        }
    }
}

/// Keeps using the same host until [`HostResolver::change_host`] is called.
///
/// This is the default strategy.
#[derive(Debug)]
pub struct SingleHostResolver {
    state: ResolverState,
}

impl SingleHostResolver {
    /// `max_tries` defaults to three attempts per host.
    pub fn new(host_count: usize, max_tries: Option<usize>) -> Result<Self, ConfigError> {
        Ok(SingleHostResolver {
            state: ResolverState::new(host_count, max_tries, 0)?,
        })
    }
}

impl HostResolver for SingleHostResolver {
    fn get_host_index(&self) -> usize {
        self.state.index.load(Ordering::Acquire)
    }

    fn change_host(&self) {
        self.state.advance();
    }

    fn host_count(&self) -> usize {
        self.state.host_count
    }

    fn max_tries(&self) -> usize {
        self.state.max_tries
    }
}

/// Moves on to the next host on every call, starting with host 0.
#[derive(Debug)]
pub struct RoundRobinHostResolver {
    state: ResolverState,
}

impl RoundRobinHostResolver {
    /// `max_tries` defaults to three attempts per host.
    pub fn new(host_count: usize, max_tries: Option<usize>) -> Result<Self, ConfigError> {
        Ok(RoundRobinHostResolver {
            // The first call advances to 0.
            state: ResolverState::new(host_count, max_tries, host_count.saturating_sub(1))?,
        })
    }
}

impl HostResolver for RoundRobinHostResolver {
    fn get_host_index(&self) -> usize {
        self.state.advance()
    }

    fn change_host(&self) {
        self.state.advance();
    }

    fn host_count(&self) -> usize {
        self.state.host_count
    }

    fn max_tries(&self) -> usize {
        self.state.max_tries
    }
}

/// Creates a resolver by strategy name: `"single"`, `"default"` (same as
/// `"single"`) or `"roundrobin"`.
pub fn get_resolver(
    strategy: &str,
    host_count: usize,
    max_tries: Option<usize>,
) -> Result<Arc<dyn HostResolver>, ConfigError> {
    match strategy {
        "single" | "default" => Ok(Arc::new(SingleHostResolver::new(host_count, max_tries)?)),
        "roundrobin" => Ok(Arc::new(RoundRobinHostResolver::new(host_count, max_tries)?)),
        other => Err(ConfigError::UnsupportedResolverStrategy(other.to_owned())),
    }
}
