//! This module holds policies, which are entities that allow configuring
//! the driver's behaviour in various aspects. Users can implement a policy on
//! their own by implementing the corresponding trait.
//!
//! This includes:
//! - [`host_resolver`]: which of the configured coordinators receives the next
//!   attempt of a request, and how many attempts a request gets.

pub mod host_resolver;
