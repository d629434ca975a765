//! Layered configuration for the conduit binary

mod loader;
mod types;

pub use loader::{ConfigLoader, read_credential};
pub use types::ConduitConfig;
