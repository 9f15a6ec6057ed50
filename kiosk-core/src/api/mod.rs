//! Client for the upload relay.

pub mod relay;

pub use relay::{Relay, RelayClient, RelayError};
