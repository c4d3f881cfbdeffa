use std::net::{SocketAddr, TcpListener, ToSocketAddrs};
use std::sync::Arc;

use crate::emulator::console::stdout_console;
use crate::emulator::file::{SharedOutput, shared_output};
use crate::emulator::map::RegisterMap;
use crate::emulator::session::{Session, SessionSummary};
use crate::err::SockdevError;

/// Accepts clients one after another and runs a [`Session`] for each. A new
/// client is only accepted once the previous one has disconnected, so at most
/// one connection is ever live.
pub struct DeviceServer {
    listener: TcpListener,
    map: Arc<RegisterMap>,
    output: SharedOutput,
}

impl DeviceServer {
    pub fn bind<A: ToSocketAddrs>(addr: A, map: RegisterMap) -> Result<Self, SockdevError> {
        let listener = TcpListener::bind(addr)?;
        Ok(Self {
            listener,
            map: Arc::new(map),
            output: shared_output(stdout_console()),
        })
    }

    /// Replaces the stdout console with a custom output handler.
    pub fn set_output_handler<F>(&mut self, handler: F)
    where
        F: FnMut(u8) + Send + 'static,
    {
        self.output = shared_output(handler);
    }

    pub fn local_addr(&self) -> Result<SocketAddr, SockdevError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn map(&self) -> &RegisterMap {
        &self.map
    }

    /// Waits for one client and serves it until it disconnects.
    pub fn serve_one(&self) -> Result<SessionSummary, SockdevError> {
        let (stream, peer) = self.listener.accept()?;
        stream.set_nodelay(true)?;
        log::info!("client connected from {peer}");

        let summary = Session::new(stream, &self.map, &self.output).run();
        log::info!("client {peer} disconnected");
        Ok(summary)
    }

    /// Serves clients until accepting fails.
    pub fn serve(&self) -> Result<(), SockdevError> {
        loop {
            self.serve_one()?;
        }
    }
}
