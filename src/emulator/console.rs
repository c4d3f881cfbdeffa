use std::io::{self, Write};
use std::net::SocketAddr;

use colored::Colorize;

use crate::emulator::map::{Access, RegisterMap};

/// Printable ASCII and newline go through as-is; anything else is escaped.
pub fn is_printable(byte: u8) -> bool {
    (0x20..=0x7E).contains(&byte) || byte == b'\n'
}

pub fn render(byte: u8) -> String {
    if is_printable(byte) {
        char::from(byte).to_string()
    } else {
        format!("[0x{byte:02x}]").dimmed().to_string()
    }
}

/// Output handler that echoes transmitted characters to stdout as they arrive.
pub fn stdout_console() -> impl FnMut(u8) + Send + 'static {
    |byte| {
        let mut stdout = io::stdout().lock();
        let _ = write!(stdout, "{}", render(byte));
        let _ = stdout.flush();
    }
}

pub fn print_banner(addr: SocketAddr, map: &RegisterMap) {
    println!(
        "{}",
        format!("MMIO device server listening on {addr}").bright_cyan().bold()
    );
    println!("Register map:");
    for desc in map.iter() {
        let access = match desc.access {
            Access::ReadOnly => "R",
            Access::WriteOnly => "W",
            Access::ReadWrite => "R/W",
        };
        println!(
            "  {:#06x} {:<8} {:<3} reset={:#x}",
            desc.offset,
            desc.name.bright_yellow(),
            access,
            desc.reset_value
        );
    }
    println!("{}", "Waiting for a client...".bright_cyan());
}
