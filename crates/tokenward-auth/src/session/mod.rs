//! Session registry, device metadata, and the expired-session sweeper.

pub mod cleanup;
pub mod device;
pub mod registry;

pub use cleanup::SessionCleanup;
pub use device::{RequestMeta, extract_device_info};
pub use registry::SessionRegistry;
