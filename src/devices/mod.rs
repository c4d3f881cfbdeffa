pub mod mmio;
pub mod register;
pub mod sockdev;

pub use mmio::*;
pub use sockdev::{SockDev, SockDevConfig};
