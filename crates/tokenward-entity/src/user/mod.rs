//! Identity records.

pub mod external;
pub mod model;
pub mod registration;
pub mod role;

pub use external::{ExternalProfile, ExternalProvider};
pub use model::Identity;
pub use registration::Registration;
pub use role::Role;
