//! Amiga serial console integration module
//!
//! Sends shell commands over the emulator's serial-over-TCP port and works out
//! which of the bytes coming back are the command's output.

pub mod classifier;
pub mod mock;
pub mod session;
pub mod timer;
pub mod types;

// Re-export commonly used types
pub use classifier::{ClassifierState, StreamClassifier};
pub use session::{Exchange, Session};
pub use timer::IdleTimer;
pub use types::*;
