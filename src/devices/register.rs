use crate::protocol::AccessWidth;

/// One slot of a register file. Accesses narrower than the register touch
/// only its low `width` bytes, the way a little-endian byte lane would.
pub trait Register: Send {
    fn read(&self, width: AccessWidth) -> u64;
    fn write(&mut self, value: u64, width: AccessWidth);
}

#[derive(Debug, Clone)]
pub struct RwRegister {
    value: u64,
    mask: u64, // writable bits mask
}

impl RwRegister {
    pub fn new(initial_value: u64, writable_mask: u64) -> Self {
        Self {
            value: initial_value,
            mask: writable_mask,
        }
    }
}

impl Register for RwRegister {
    fn read(&self, width: AccessWidth) -> u64 {
        self.value & width.mask()
    }

    fn write(&mut self, value: u64, width: AccessWidth) {
        let lanes = self.mask & width.mask();
        self.value = (self.value & !lanes) | (value & lanes);
    }
}

#[derive(Debug, Clone)]
pub struct RoRegister {
    value: u64,
}

impl RoRegister {
    pub fn new(initial_value: u64) -> Self {
        Self {
            value: initial_value,
        }
    }

}

impl Register for RoRegister {
    fn read(&self, width: AccessWidth) -> u64 {
        self.value & width.mask()
    }

    fn write(&mut self, _value: u64, _width: AccessWidth) {
        // just ignore writes
    }
}

/// Write-only register with side effects
pub struct WoRegister<F>
where
    F: FnMut(u64) + Send,
{
    write_handler: F,
}

impl<F> WoRegister<F>
where
    F: FnMut(u64) + Send,
{
    pub fn new(write_handler: F) -> Self {
        Self { write_handler }
    }
}

impl<F> Register for WoRegister<F>
where
    F: FnMut(u64) + Send,
{
    fn read(&self, _width: AccessWidth) -> u64 {
        0 // Write-only registers return 0 on read
    }

    fn write(&mut self, value: u64, width: AccessWidth) {
        (self.write_handler)(value & width.mask());
    }
}
