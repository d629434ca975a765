//! Session management

pub mod channel;
pub mod id;
pub mod lifecycle;
pub mod registry;
pub mod state;

// Re-export key types for convenience
pub use channel::{DEFAULT_CHANNEL_CAPACITY, Frame, StreamChannel};
pub use id::{IdGenerator, SequentialIdGenerator, SessionId, UuidIdGenerator};
pub use lifecycle::{SessionEvent, SessionLifecycleManager, SessionSummary};
pub use registry::SessionRegistry;
pub use state::{CloseReason, Session, SessionState};
