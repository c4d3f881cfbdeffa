use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::devices::register::{Register, RoRegister, RwRegister, WoRegister};
use crate::emulator::map::{RegisterMap, Semantics};
use crate::protocol::AccessWidth;

/// Receives every byte written to a transmit register.
pub type OutputHandler = Box<dyn FnMut(u8) + Send>;

/// Output channel shared by all sessions of one emulator process.
pub type SharedOutput = Arc<Mutex<OutputHandler>>;

pub fn shared_output<F>(handler: F) -> SharedOutput
where
    F: FnMut(u8) + Send + 'static,
{
    Arc::new(Mutex::new(Box::new(handler)))
}

/// Live register state of one connection, built from the register map when a
/// client connects and dropped when it goes away.
pub struct RegisterFile {
    slots: BTreeMap<u32, Box<dyn Register>>,
}

impl RegisterFile {
    pub fn new(map: &RegisterMap, output: &SharedOutput) -> Self {
        let slots = map
            .iter()
            .map(|desc| {
                let slot: Box<dyn Register> = match desc.semantics {
                    Semantics::Transmit => {
                        let output = output.clone();
                        Box::new(WoRegister::new(move |value| {
                            // A handler that panicked once still gets later bytes.
                            let mut emit = output.lock().unwrap_or_else(PoisonError::into_inner);
                            (*emit)(value as u8);
                        }))
                    }
                    Semantics::Constant => Box::new(RoRegister::new(desc.reset_value)),
                    Semantics::Storage => {
                        Box::new(RwRegister::new(desc.reset_value, u64::MAX))
                    }
                };
                (desc.offset, slot)
            })
            .collect();
        Self { slots }
    }

    pub fn read(&self, addr: u32, width: AccessWidth) -> u64 {
        match self.slots.get(&addr) {
            Some(reg) => reg.read(width),
            None => {
                log::debug!("read from undefined register {addr:#x}, returning 0");
                0
            }
        }
    }

    pub fn write(&mut self, addr: u32, width: AccessWidth, value: u64) {
        match self.slots.get_mut(&addr) {
            Some(reg) => reg.write(value, width),
            None => log::debug!("write of {value:#x} to undefined register {addr:#x} ignored"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emulator::map::{CTRL, STATUS, TXDATA};

    fn capture() -> (SharedOutput, Arc<Mutex<Vec<u8>>>) {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let buffer_clone = buffer.clone();
        let output = shared_output(move |byte| buffer_clone.lock().unwrap().push(byte));
        (output, buffer)
    }

    #[test]
    fn test_txdata_emits_low_byte() {
        let (output, buffer) = capture();
        let mut regs = RegisterFile::new(&RegisterMap::sockdev(), &output);

        regs.write(TXDATA, AccessWidth::Byte, 0x41);
        regs.write(TXDATA, AccessWidth::Word, 0x0000_0142);

        assert_eq!(*buffer.lock().unwrap(), b"AB");
        assert_eq!(regs.read(TXDATA, AccessWidth::Word), 0);
    }

    #[test]
    fn test_status_is_constant() {
        let (output, _) = capture();
        let mut regs = RegisterFile::new(&RegisterMap::sockdev(), &output);

        regs.write(CTRL, AccessWidth::Word, 0);
        regs.write(STATUS, AccessWidth::Word, 0);
        assert_eq!(regs.read(STATUS, AccessWidth::Word) & 1, 1);
        assert_eq!(regs.read(STATUS, AccessWidth::Byte), 1);
    }

    #[test]
    fn test_ctrl_persists() {
        let (output, _) = capture();
        let mut regs = RegisterFile::new(&RegisterMap::sockdev(), &output);

        assert_eq!(regs.read(CTRL, AccessWidth::Word), 1);
        regs.write(CTRL, AccessWidth::Word, 0);
        assert_eq!(regs.read(CTRL, AccessWidth::Word), 0);
        regs.write(CTRL, AccessWidth::Word, 0xDEAD_BEEF);
        assert_eq!(regs.read(CTRL, AccessWidth::Word), 0xDEAD_BEEF);

        // A new connection starts from the map's reset values again.
        let regs = RegisterFile::new(&RegisterMap::sockdev(), &output);
        assert_eq!(regs.read(CTRL, AccessWidth::Word), 1);
    }

    #[test]
    fn test_undefined_offsets_are_inert() {
        let (output, buffer) = capture();
        let mut regs = RegisterFile::new(&RegisterMap::sockdev(), &output);

        regs.write(0x10, AccessWidth::Word, 0xFFFF_FFFF);
        assert_eq!(regs.read(0x10, AccessWidth::Word), 0);
        assert_eq!(regs.read(0xFFC, AccessWidth::Byte), 0);
        assert!(buffer.lock().unwrap().is_empty());
    }

    #[test]
    fn test_txdata_survives_poisoned_output() {
        let (output, buffer) = capture();
        let mut regs = RegisterFile::new(&RegisterMap::sockdev(), &output);

        let poisoner = output.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.lock().unwrap();
            panic!("output handler failed");
        })
        .join();
        assert!(output.is_poisoned());

        regs.write(TXDATA, AccessWidth::Byte, b'A'.into());
        assert_eq!(*buffer.lock().unwrap(), b"A");
    }
}
