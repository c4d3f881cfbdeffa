//! Wire protocol between the consumer-side bridge and the remote register
//! emulator.
//!
//! ```text
//! read request   'R' | addr (u32 LE) | width (u8)              6 bytes
//! write request  'W' | addr (u32 LE) | width (u8) | data       6 + width bytes
//! read response  data (width bytes, LE)
//! ```
//!
//! Writes are never acknowledged.

pub mod codec;

pub use codec::*;

use crate::err::MmioError;

/// Size of the register window exposed to the consumer.
pub const WINDOW_SIZE: u64 = 0x1000;

pub const KIND_READ: u8 = b'R';
pub const KIND_WRITE: u8 = b'W';

/// Width of one register access.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AccessWidth {
    Byte = 1,
    Halfword = 2,
    Word = 4,
}

impl AccessWidth {
    pub const fn bytes(self) -> usize {
        self as usize
    }

    /// Mask covering the low `width` bytes of a value.
    pub const fn mask(self) -> u64 {
        match self {
            AccessWidth::Byte => 0xFF,
            AccessWidth::Halfword => 0xFFFF,
            AccessWidth::Word => 0xFFFF_FFFF,
        }
    }

    pub const fn truncate(self, value: u64) -> u32 {
        (value & self.mask()) as u32
    }
}

impl TryFrom<u8> for AccessWidth {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(AccessWidth::Byte),
            2 => Ok(AccessWidth::Halfword),
            4 => Ok(AccessWidth::Word),
            other => Err(other),
        }
    }
}

impl TryFrom<usize> for AccessWidth {
    type Error = MmioError;

    fn try_from(size: usize) -> Result<Self, Self::Error> {
        u8::try_from(size)
            .ok()
            .and_then(|s| AccessWidth::try_from(s).ok())
            .ok_or(MmioError::InvalidSize { size })
    }
}

impl From<AccessWidth> for usize {
    fn from(width: AccessWidth) -> Self {
        width.bytes()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessKind {
    Read,
    Write,
}

impl AccessKind {
    pub const fn tag(self) -> u8 {
        match self {
            AccessKind::Read => KIND_READ,
            AccessKind::Write => KIND_WRITE,
        }
    }
}

/// One logical register access as carried by a single request frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Request {
    Read { addr: u32, width: AccessWidth },
    Write { addr: u32, width: AccessWidth, value: u32 },
}

impl Request {
    pub fn read(addr: u32, width: AccessWidth) -> Self {
        Request::Read { addr, width }
    }

    /// Builds a write request, dropping the bytes of `value` above `width`.
    pub fn write(addr: u32, width: AccessWidth, value: u64) -> Self {
        Request::Write {
            addr,
            width,
            value: width.truncate(value),
        }
    }

    pub fn kind(&self) -> AccessKind {
        match self {
            Request::Read { .. } => AccessKind::Read,
            Request::Write { .. } => AccessKind::Write,
        }
    }

    pub fn addr(&self) -> u32 {
        match *self {
            Request::Read { addr, .. } | Request::Write { addr, .. } => addr,
        }
    }

    pub fn width(&self) -> AccessWidth {
        match *self {
            Request::Read { width, .. } | Request::Write { width, .. } => width,
        }
    }

    /// Total number of bytes this request occupies on the wire.
    pub fn frame_len(&self) -> usize {
        match self {
            Request::Read { .. } => HEADER_LEN,
            Request::Write { width, .. } => HEADER_LEN + width.bytes(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_width_conversions() {
        assert_eq!(AccessWidth::try_from(2u8), Ok(AccessWidth::Halfword));
        assert_eq!(AccessWidth::try_from(3u8), Err(3));
        assert_eq!(
            AccessWidth::try_from(8usize),
            Err(MmioError::InvalidSize { size: 8 })
        );
        assert_eq!(
            AccessWidth::try_from(0x104usize),
            Err(MmioError::InvalidSize { size: 0x104 })
        );
        assert_eq!(usize::from(AccessWidth::Word), 4);
    }

    #[test]
    fn test_write_request_truncates_value() {
        let req = Request::write(0x08, AccessWidth::Byte, 0x1234);
        assert_eq!(
            req,
            Request::Write {
                addr: 0x08,
                width: AccessWidth::Byte,
                value: 0x34
            }
        );
        assert_eq!(req.frame_len(), 7);
        assert_eq!(Request::read(0x04, AccessWidth::Word).frame_len(), 6);
    }
}
