pub mod devices;
pub mod emulator;
pub mod err;
pub mod protocol;
pub mod regs;
pub mod transport;

pub use devices::*;
pub use err::*;
pub use protocol::{AccessWidth, Request};
pub use regs::*;
