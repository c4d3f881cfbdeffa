//! Exact-length send/receive over an established byte stream.
//!
//! The stream itself (TCP socket, pipe, test double) is set up elsewhere; these
//! helpers only report how far a transfer got when it could not complete.

use std::io::{ErrorKind, Read, Write};

use crate::err::TransportError;

/// Writes all of `bytes`, or reports how many were accepted before the stream
/// stopped taking data.
pub fn send_all<W: Write + ?Sized>(stream: &mut W, bytes: &[u8]) -> Result<(), TransportError> {
    let mut sent = 0;
    while sent < bytes.len() {
        match stream.write(&bytes[sent..]) {
            Ok(0) => return Err(TransportError::short_write(bytes.len(), sent)),
            Ok(n) => sent += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
    stream.flush()?;
    Ok(())
}

/// Fills `buf` completely, or reports how many bytes arrived before the peer
/// closed the stream.
pub fn recv_exact<R: Read + ?Sized>(stream: &mut R, buf: &mut [u8]) -> Result<(), TransportError> {
    let mut received = 0;
    while received < buf.len() {
        match stream.read(&mut buf[received..]) {
            Ok(0) => return Err(TransportError::short_read(buf.len(), received)),
            Ok(n) => received += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}
