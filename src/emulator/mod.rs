//! Remote side: owns the register state and performs the side effects.
pub mod console;
pub mod file;
pub mod map;
pub mod server;
pub mod session;

pub use file::{OutputHandler, RegisterFile, SharedOutput, shared_output};
pub use map::{Access, RegisterDescriptor, RegisterMap, Semantics};
pub use server::DeviceServer;
pub use session::{DisconnectReason, Session, SessionSummary};
