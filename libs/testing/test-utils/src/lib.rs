//! Test infrastructure utilities
//!
//! Container-backed broker instances for integration tests.

pub mod nats;

pub use nats::TestNats;
