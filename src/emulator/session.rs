//! Per-connection request loop of the register emulator.
//!
//! ```text
//! Idle --kind byte--> ParsingRequest --frame--> Applying --read--> Responding
//!  ^                        |                      |                   |
//!  +------------------------+---------write--------+-------------------+
//!                           |
//!                  short read / bad frame --> Disconnected
//! ```
//!
//! One frame is fully applied, and answered if it is a read, before the next
//! one is read off the stream.

use std::fmt;
use std::io::{Read, Write};

use crate::emulator::file::{RegisterFile, SharedOutput};
use crate::emulator::map::RegisterMap;
use crate::err::{ProtocolError, TransportError};
use crate::protocol::{
    AccessWidth, HEADER_LEN, KIND_READ, KIND_WRITE, Request, decode_header, encode_response,
};
use crate::transport::{recv_exact, send_all};

#[derive(Debug)]
enum State {
    Idle,
    ParsingRequest { kind: u8 },
    Applying(Request),
    Responding { value: u32, width: AccessWidth },
    Disconnected(DisconnectReason),
}

#[derive(Debug)]
pub enum DisconnectReason {
    /// The client closed the stream between frames.
    PeerClosed,
    /// The stream ended partway through a frame.
    Truncated(ProtocolError),
    Protocol(ProtocolError),
    Transport(TransportError),
}

impl DisconnectReason {
    pub fn is_clean(&self) -> bool {
        matches!(self, DisconnectReason::PeerClosed)
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisconnectReason::PeerClosed => write!(f, "peer closed the connection"),
            DisconnectReason::Truncated(e) => write!(f, "{e}"),
            DisconnectReason::Protocol(e) => write!(f, "{e}"),
            DisconnectReason::Transport(e) => write!(f, "{e}"),
        }
    }
}

#[derive(Debug)]
pub struct SessionSummary {
    /// Frames fully applied before the session ended.
    pub frames: u64,
    pub reason: DisconnectReason,
}

pub struct Session<S> {
    stream: S,
    registers: RegisterFile,
    frames: u64,
}

impl<S: Read + Write> Session<S> {
    pub fn new(stream: S, map: &RegisterMap, output: &SharedOutput) -> Self {
        Self {
            stream,
            registers: RegisterFile::new(map, output),
            frames: 0,
        }
    }

    /// Serves frames until the connection ends. The register file goes away
    /// with the session.
    pub fn run(mut self) -> SessionSummary {
        let mut state = State::Idle;
        loop {
            state = match state {
                State::Disconnected(reason) => {
                    if reason.is_clean() {
                        log::info!("session ended after {} frames: {reason}", self.frames);
                    } else {
                        log::error!("session aborted after {} frames: {reason}", self.frames);
                    }
                    return SessionSummary {
                        frames: self.frames,
                        reason,
                    };
                }
                state => self.step(state),
            };
        }
    }

    fn step(&mut self, state: State) -> State {
        match state {
            State::Idle => {
                let mut kind = [0u8; 1];
                match recv_exact(&mut self.stream, &mut kind) {
                    Ok(()) => State::ParsingRequest { kind: kind[0] },
                    Err(TransportError::Closed) => {
                        State::Disconnected(DisconnectReason::PeerClosed)
                    }
                    Err(e) => State::Disconnected(DisconnectReason::Transport(e)),
                }
            }
            State::ParsingRequest { kind } => match self.parse_request(kind) {
                Ok(request) => State::Applying(request),
                Err(reason) => State::Disconnected(reason),
            },
            State::Applying(request) => {
                self.frames += 1;
                match request {
                    Request::Read { addr, width } => {
                        let value = width.truncate(self.registers.read(addr, width));
                        log::debug!("R {addr:#06x}/{} -> {value:#x}", width.bytes());
                        State::Responding { value, width }
                    }
                    Request::Write { addr, width, value } => {
                        log::debug!("W {addr:#06x}/{} <- {value:#x}", width.bytes());
                        self.registers.write(addr, width, value.into());
                        State::Idle
                    }
                }
            }
            State::Responding { value, width } => {
                match send_all(&mut self.stream, &encode_response(value, width)) {
                    Ok(()) => State::Idle,
                    Err(e) => State::Disconnected(DisconnectReason::Transport(e)),
                }
            }
            State::Disconnected(reason) => State::Disconnected(reason),
        }
    }

    fn parse_request(&mut self, kind: u8) -> Result<Request, DisconnectReason> {
        if kind != KIND_READ && kind != KIND_WRITE {
            return Err(DisconnectReason::Protocol(ProtocolError::UnknownKind(kind)));
        }

        let mut header = [0u8; HEADER_LEN];
        header[0] = kind;
        recv_exact(&mut self.stream, &mut header[1..]).map_err(|e| truncated(e, HEADER_LEN, 1))?;
        let header = decode_header(&header).map_err(DisconnectReason::Protocol)?;

        let mut payload = [0u8; 4];
        let payload = &mut payload[..header.payload_len()];
        let frame_len = HEADER_LEN + payload.len();
        recv_exact(&mut self.stream, payload).map_err(|e| truncated(e, frame_len, HEADER_LEN))?;
        header.into_request(payload).map_err(DisconnectReason::Protocol)
    }
}

/// Maps a failed mid-frame receive to the reason the session ends. `already`
/// is how many bytes of the frame had been read before the failed call.
fn truncated(err: TransportError, expected: usize, already: usize) -> DisconnectReason {
    match err {
        TransportError::Closed => {
            DisconnectReason::Truncated(ProtocolError::truncated(expected, already))
        }
        TransportError::ShortRead { received, .. } => {
            DisconnectReason::Truncated(ProtocolError::truncated(expected, already + received))
        }
        other => DisconnectReason::Transport(other),
    }
}
