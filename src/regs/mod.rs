//! Bit layouts of the sockdev registers that carry flags.
use bitfield::bitfield;

bitfield! {
    /// STATUS - Transmitter status (offset 0x04, read-only)
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct StatusReg(u32);

    // Bits [31:1] - Reserved, RES0

    /// Bit [0] - Transmitter ready to accept a TXDATA write
    pub tx_ready, set_tx_ready: 0;
}

impl StatusReg {
    pub const fn from_raw(value: u32) -> Self {
        Self(value)
    }

    pub const fn raw(&self) -> u32 {
        self.0
    }

    /// The value the device always reports: ready, nothing else set.
    pub fn ready() -> Self {
        let mut status = Self(0);
        status.set_tx_ready(true);
        status
    }
}

bitfield! {
    /// CTRL - Device control (offset 0x08, read/write)
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct CtrlReg(u32);

    // Bits [31:1] - Stored but without meaning to the device

    /// Bit [0] - Device enable
    pub enable, set_enable: 0;
}

impl CtrlReg {
    pub const fn from_raw(value: u32) -> Self {
        Self(value)
    }

    pub const fn raw(&self) -> u32 {
        self.0
    }

    /// Reset state: enabled.
    pub fn reset() -> Self {
        let mut ctrl = Self(0);
        ctrl.set_enable(true);
        ctrl
    }
}
