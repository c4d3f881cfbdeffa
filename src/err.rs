use thiserror::Error;

#[derive(Error, Debug)]
pub enum SockdevError {
    #[error("MMIO error: {0}")]
    MMIO(#[from] MmioError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("General error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MmioError {
    #[error("Unmapped memory access at address 0x{0:016x}")]
    UnmappedAccess(u64),

    #[error("Invalid alignment: address 0x{addr:016x} not aligned for {size}-byte access")]
    InvalidAlignment { addr: u64, size: usize },

    #[error("Invalid access size: {size} bytes (must be 1, 2 or 4)")]
    InvalidSize { size: usize },

    #[error("Device error: {0}")]
    DeviceError(String),

    #[error(
        "Overlapping MMIO region: new region [0x{new_start:016x}, 0x{new_end:016x}) overlaps with existing region [0x{existing_start:016x}, 0x{existing_end:016x})"
    )]
    OverlappingRegion {
        existing_start: u64,
        existing_end: u64,
        new_start: u64,
        new_end: u64,
    },
}

// Helper constructor for the overlapping region error
impl MmioError {
    pub fn overlapping_region(existing: (u64, u64), new: (u64, u64)) -> Self {
        Self::OverlappingRegion {
            existing_start: existing.0,
            existing_end: existing.1,
            new_start: new.0,
            new_end: new.1,
        }
    }
}

/// Malformed frame seen by the emulator. The byte stream has no resync point,
/// so any of these ends the session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Unknown request kind byte 0x{0:02x}")]
    UnknownKind(u8),

    #[error("Invalid access width {0} (must be 1, 2 or 4)")]
    InvalidWidth(u8),

    #[error("Truncated frame: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },
}

impl ProtocolError {
    pub fn truncated(expected: usize, actual: usize) -> Self {
        Self::Truncated { expected, actual }
    }
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Short write: {sent} of {expected} bytes accepted")]
    ShortWrite { expected: usize, sent: usize },

    #[error("Short read: {received} of {expected} bytes received before end of stream")]
    ShortRead { expected: usize, received: usize },

    #[error("Stream closed by peer")]
    Closed,

    #[error("Stream abandoned after an earlier fault")]
    Abandoned,

    #[error("Transport I/O failure: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    pub fn short_write(expected: usize, sent: usize) -> Self {
        Self::ShortWrite { expected, sent }
    }

    pub fn short_read(expected: usize, received: usize) -> Self {
        if received == 0 {
            Self::Closed
        } else {
            Self::ShortRead { expected, received }
        }
    }
}
