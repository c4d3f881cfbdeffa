//! Consumer side of the hello-world demo: maps the bridge into a host address
//! space and drives the device the way the bare-metal test firmware does.

use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use mmio_sockdev::emulator::map::{CTRL, STATUS, TXDATA};
use mmio_sockdev::{MmioManager, SockDev, SockDevConfig, StatusReg};

const MMIO_BASE: u64 = 0x1002_0000;

#[derive(Parser, Debug)]
#[command(name = "sockdev-demo", version)]
struct Args {
    /// Emulator address
    #[arg(long, default_value = "127.0.0.1:7890")]
    connect: String,

    /// Base address the device window is mapped at
    #[arg(long, default_value_t = MMIO_BASE, value_parser = parse_addr)]
    base: u64,

    /// Text to transmit through TXDATA
    #[arg(long, default_value = "Hello from MMIO sockdev\n")]
    message: String,

    /// Give up on a read response after this many milliseconds
    #[arg(long)]
    read_timeout_ms: Option<u64>,
}

fn parse_addr(s: &str) -> Result<u64, std::num::ParseIntError> {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => s.parse(),
    }
}

struct Console<'a> {
    bus: &'a mut MmioManager,
    device: Arc<SockDev<TcpStream>>,
    base: u64,
}

impl Console<'_> {
    fn enable(&mut self) -> Result<()> {
        self.bus.handle_write(self.base + u64::from(CTRL), 4, 1)?;
        Ok(())
    }

    fn wait_tx_ready(&mut self) -> Result<()> {
        loop {
            let status = self.bus.handle_read(self.base + u64::from(STATUS), 4)?;
            if StatusReg::from_raw(status as u32).tx_ready() {
                return Ok(());
            }
            if self.device.fault_count() > 0 {
                bail!("lost the emulator while polling STATUS");
            }
        }
    }

    fn send_str(&mut self, text: &str) -> Result<()> {
        for byte in text.bytes() {
            self.wait_tx_ready()?;
            self.bus
                .handle_write(self.base + u64::from(TXDATA), 1, byte.into())?;
        }
        if self.device.fault_count() > 0 {
            bail!("lost the emulator while sending");
        }
        Ok(())
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = SockDevConfig {
        read_timeout: args.read_timeout_ms.map(Duration::from_millis),
    };
    let device = SockDev::connect(args.connect.as_str(), &config)
        .with_context(|| format!("failed to reach emulator at {}", args.connect))?;
    let device = Arc::new(device);

    let mut bus = MmioManager::default();
    bus.register_device(args.base, Box::new(device.clone()))?;

    let mut console = Console {
        bus: &mut bus,
        device,
        base: args.base,
    };
    console.enable()?;
    console.send_str(&args.message)?;
    log::info!("sent {} bytes", args.message.len());
    Ok(())
}
