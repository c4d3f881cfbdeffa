//! Consumer-side bridge that forwards register accesses to a remote emulator.
//!
//! Every access is one exchange on the shared stream: a request frame, and for
//! reads the `width`-byte response. The whole exchange runs under one lock so
//! frames from concurrent callers never interleave and a response is always
//! consumed by the reader that asked for it.
//!
//! Transport faults never reach the caller as errors. They are logged, counted,
//! and reads fall back to 0. Only malformed arguments are returned as errors,
//! before anything is sent.
//!
//! After the first fault the stream position is unknown: a late response or a
//! half-sent frame may still be in flight. The bridge therefore stops using the
//! stream for good, shuts it down when it can, and fails every later access
//! soft without touching it.

use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::devices::MmioDevice;
use crate::err::{MmioError, SockdevError, TransportError};
use crate::protocol::{AccessWidth, Request, WINDOW_SIZE, decode_response, encode_request};
use crate::transport::{recv_exact, send_all};

#[derive(Debug, Clone, Default)]
pub struct SockDevConfig {
    /// Upper bound on the wait for a read response. `None` blocks until the
    /// emulator answers or the stream closes.
    pub read_timeout: Option<Duration>,
}

type ShutdownHook = Box<dyn Fn() + Send + Sync>;

pub struct SockDev<T> {
    transport: Mutex<T>,
    faults: AtomicU64,
    broken: AtomicBool,
    shutdown: Option<ShutdownHook>,
}

impl SockDev<TcpStream> {
    /// Connects to an emulator listening at `addr`.
    pub fn connect<A: ToSocketAddrs>(
        addr: A,
        config: &SockDevConfig,
    ) -> Result<Self, SockdevError> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        stream.set_read_timeout(config.read_timeout)?;
        log::info!("mmio-sockdev: connected to {}", stream.peer_addr()?);

        let handle = stream.try_clone()?;
        Ok(Self::new(stream).with_shutdown(move || {
            if let Err(e) = handle.shutdown(Shutdown::Both) {
                log::debug!("mmio-sockdev: shutdown after fault failed: {e}");
            }
        }))
    }
}

impl<T: Read + Write> SockDev<T> {
    /// Wraps an already established stream.
    pub fn new(transport: T) -> Self {
        Self {
            transport: Mutex::new(transport),
            faults: AtomicU64::new(0),
            broken: AtomicBool::new(false),
            shutdown: None,
        }
    }

    /// Runs `hook` once when the stream is abandoned after a fault, so the
    /// emulator sees the session end instead of waiting on a torn frame.
    pub fn with_shutdown<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.shutdown = Some(Box::new(hook));
        self
    }

    pub fn read_register(&self, offset: u64, size: usize) -> Result<u64, MmioError> {
        let (addr, width) = validate(offset, size)?;
        let request = Request::read(addr, width);

        let mut transport = self.lock();
        if self.is_broken() {
            self.record_fault("read", offset, &TransportError::Abandoned);
            return Ok(0);
        }
        match exchange_read(&mut *transport, &request) {
            Ok(value) => {
                log::debug!("mmio-sockdev: read {offset:#x}/{size} -> {value:#x}");
                Ok(value.into())
            }
            Err(e) => {
                self.record_fault("read", offset, &e);
                Ok(0)
            }
        }
    }

    pub fn write_register(&self, offset: u64, size: usize, value: u64) -> Result<(), MmioError> {
        let (addr, width) = validate(offset, size)?;
        let frame = encode_request(&Request::write(addr, width, value));

        let mut transport = self.lock();
        if self.is_broken() {
            self.record_fault("write", offset, &TransportError::Abandoned);
            return Ok(());
        }
        if let Err(e) = send_all(&mut *transport, &frame) {
            self.record_fault("write", offset, &e);
        } else {
            log::debug!("mmio-sockdev: write {offset:#x}/{size} <- {value:#x}");
        }
        Ok(())
    }

    /// Number of accesses that degraded because of a transport fault.
    pub fn fault_count(&self) -> u64 {
        self.faults.load(Ordering::Relaxed)
    }

    /// True once a fault has made the stream unusable.
    pub fn is_broken(&self) -> bool {
        self.broken.load(Ordering::Acquire)
    }

    pub fn into_inner(self) -> T {
        self.transport
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock(&self) -> MutexGuard<'_, T> {
        // A panic mid-exchange can leave a torn frame on the stream; the
        // emulator will drop the session and later accesses report faults.
        self.transport.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Called with the transport lock held, so no other access can slip in
    /// between the fault and the stream being abandoned.
    fn record_fault(&self, op: &str, offset: u64, err: &TransportError) {
        self.faults.fetch_add(1, Ordering::Relaxed);
        log::error!("mmio-sockdev: {op} at {offset:#x} failed: {err}");
        if !self.broken.swap(true, Ordering::AcqRel) {
            if let Some(shutdown) = &self.shutdown {
                shutdown();
            }
        }
    }
}

fn validate(offset: u64, size: usize) -> Result<(u32, AccessWidth), MmioError> {
    let width = AccessWidth::try_from(size)?;
    if offset.saturating_add(width.bytes() as u64) > WINDOW_SIZE {
        log::warn!("mmio-sockdev: access at {offset:#x} is outside the register window");
        return Err(MmioError::UnmappedAccess(offset));
    }
    Ok((offset as u32, width))
}

fn exchange_read<T: Read + Write>(
    transport: &mut T,
    request: &Request,
) -> Result<u32, TransportError> {
    send_all(transport, &encode_request(request))?;

    let width = request.width();
    let mut response = [0u8; 4];
    recv_exact(transport, &mut response[..width.bytes()])?;
    // recv_exact filled exactly `width` bytes, so decoding cannot come up short.
    Ok(decode_response(&response, width).unwrap_or_default())
}

impl<T: Read + Write> MmioDevice for SockDev<T> {
    fn read(&mut self, offset: u64, width: AccessWidth) -> Result<u64, MmioError> {
        self.read_register(offset, width.bytes())
    }

    fn write(&mut self, offset: u64, width: AccessWidth, value: u64) -> Result<(), MmioError> {
        self.write_register(offset, width.bytes(), value)
    }

    fn get_size(&self) -> u64 {
        WINDOW_SIZE
    }
}

/// Lets one bridge be mapped into a host address space while other threads
/// keep their own handle to it.
impl<T: Read + Write> MmioDevice for Arc<SockDev<T>> {
    fn read(&mut self, offset: u64, width: AccessWidth) -> Result<u64, MmioError> {
        self.read_register(offset, width.bytes())
    }

    fn write(&mut self, offset: u64, width: AccessWidth, value: u64) -> Result<(), MmioError> {
        self.write_register(offset, width.bytes(), value)
    }

    fn get_size(&self) -> u64 {
        WINDOW_SIZE
    }
}
