//! The token lifecycle state machine.

pub mod manager;

pub use manager::{LoginResult, TokenLifecycleManager};
