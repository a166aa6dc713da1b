//! Session domain records.

pub mod filter;
pub mod model;
pub mod token;

pub use filter::SessionFilter;
pub use model::{CreateSession, DeviceInfo, Session};
pub use token::TokenPair;
