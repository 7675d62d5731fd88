//! SettleBot Backend Library
//!
//! Settlement request dispatch for prediction pools and the remote event
//! resolver that answers those requests. Shared by the binaries and tests.

pub mod chain;
pub mod config;
pub mod pool;
pub mod resolver;
pub mod settlement;
