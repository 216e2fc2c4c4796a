//! Implementations of ports (hexagonal adapters).
//!
//! - [`inbound`] - Driving side: the command-line interface
//! - [`outbound`] - Driven side: HTTP and in-memory comparison stores

pub mod inbound;
pub mod outbound;
