use anyhow::Context;
use clap::Parser;
use mmio_sockdev::SockdevError;
use mmio_sockdev::emulator::console::print_banner;
use mmio_sockdev::emulator::{DeviceServer, RegisterMap};

const DEFAULT_PORT: u16 = 7890;

/// Remote register emulator for the MMIO socket device.
#[derive(Parser, Debug)]
#[command(name = "mmio-device-server", version)]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1")]
    bind: String,

    /// TCP port to listen on
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Exit after the first client disconnects
    #[arg(long)]
    once: bool,
}

fn run() -> Result<(), SockdevError> {
    env_logger::init();
    let args = Args::parse();

    let server = DeviceServer::bind((args.bind.as_str(), args.port), RegisterMap::sockdev())
        .with_context(|| format!("failed to listen on {}:{}", args.bind, args.port))?;
    print_banner(server.local_addr()?, server.map());

    if args.once {
        let summary = server.serve_one()?;
        println!();
        log::info!("served {} frames ({})", summary.frames, summary.reason);
        return Ok(());
    }
    server.serve()
}

fn main() {
    match run() {
        Ok(()) => {}
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}
