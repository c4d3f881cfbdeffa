//! Pure frame encoding and decoding. Nothing in here touches a transport.

use super::{AccessKind, AccessWidth, KIND_READ, KIND_WRITE, Request};
use crate::err::ProtocolError;

/// Kind byte, address and width.
pub const HEADER_LEN: usize = 6;

/// Fixed part of a request frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameHeader {
    pub kind: AccessKind,
    pub addr: u32,
    pub width: AccessWidth,
}

impl FrameHeader {
    /// Bytes that follow the header on the wire.
    pub fn payload_len(&self) -> usize {
        match self.kind {
            AccessKind::Read => 0,
            AccessKind::Write => self.width.bytes(),
        }
    }

    /// Completes the header into a request using the write payload, if any.
    pub fn into_request(self, payload: &[u8]) -> Result<Request, ProtocolError> {
        match self.kind {
            AccessKind::Read => Ok(Request::read(self.addr, self.width)),
            AccessKind::Write => {
                let value = decode_response(payload, self.width)?;
                Ok(Request::write(self.addr, self.width, value.into()))
            }
        }
    }
}

pub fn encode_request(request: &Request) -> Vec<u8> {
    let mut frame = Vec::with_capacity(request.frame_len());
    frame.push(request.kind().tag());
    frame.extend_from_slice(&request.addr().to_le_bytes());
    frame.push(request.width() as u8);
    if let Request::Write { width, value, .. } = *request {
        frame.extend_from_slice(&encode_response(value, width));
    }
    frame
}

pub fn decode_header(header: &[u8; HEADER_LEN]) -> Result<FrameHeader, ProtocolError> {
    let kind = match header[0] {
        KIND_READ => AccessKind::Read,
        KIND_WRITE => AccessKind::Write,
        other => return Err(ProtocolError::UnknownKind(other)),
    };
    let addr = u32::from_le_bytes([header[1], header[2], header[3], header[4]]);
    let width = AccessWidth::try_from(header[5]).map_err(ProtocolError::InvalidWidth)?;
    Ok(FrameHeader { kind, addr, width })
}

/// Decodes the request frame at the head of `buf`. Trailing bytes belong to
/// the next frame and are left alone; use [`Request::frame_len`] to skip.
pub fn decode_request(buf: &[u8]) -> Result<Request, ProtocolError> {
    let header: &[u8; HEADER_LEN] = buf
        .get(..HEADER_LEN)
        .and_then(|h| h.try_into().ok())
        .ok_or_else(|| ProtocolError::truncated(HEADER_LEN, buf.len()))?;
    let header = decode_header(header)?;

    let end = HEADER_LEN + header.payload_len();
    let payload = buf
        .get(HEADER_LEN..end)
        .ok_or_else(|| ProtocolError::truncated(end, buf.len()))?;
    header.into_request(payload)
}

/// Encodes a register value as `width` little-endian bytes, the shape of both
/// read responses and write payloads.
pub fn encode_response(value: u32, width: AccessWidth) -> Vec<u8> {
    value.to_le_bytes()[..width.bytes()].to_vec()
}

pub fn decode_response(bytes: &[u8], width: AccessWidth) -> Result<u32, ProtocolError> {
    let n = width.bytes();
    let data = bytes
        .get(..n)
        .ok_or_else(|| ProtocolError::truncated(n, bytes.len()))?;
    let mut raw = [0u8; 4];
    raw[..n].copy_from_slice(data);
    Ok(u32::from_le_bytes(raw))
}
