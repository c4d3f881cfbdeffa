//! Static description of the emulated register window.

use std::collections::BTreeMap;

use crate::err::MmioError;
use crate::protocol::WINDOW_SIZE;
use crate::regs::{CtrlReg, StatusReg};

pub const TXDATA: u32 = 0x00;
pub const STATUS: u32 = 0x04;
pub const CTRL: u32 = 0x08;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

/// What the emulator does with an access to a register.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Semantics {
    /// Low byte of every write goes to the output channel; nothing is stored.
    Transmit,
    /// Reads return the reset value forever; writes are ignored.
    Constant,
    /// Plain storage that keeps the last written value.
    Storage,
}

impl Semantics {
    pub const fn access(self) -> Access {
        match self {
            Semantics::Transmit => Access::WriteOnly,
            Semantics::Constant => Access::ReadOnly,
            Semantics::Storage => Access::ReadWrite,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegisterDescriptor {
    pub offset: u32,
    pub name: &'static str,
    pub access: Access,
    pub reset_value: u64,
    pub semantics: Semantics,
}

impl RegisterDescriptor {
    pub const fn new(
        offset: u32,
        name: &'static str,
        semantics: Semantics,
        reset_value: u64,
    ) -> Self {
        Self {
            offset,
            name,
            access: semantics.access(),
            reset_value,
            semantics,
        }
    }
}

/// Immutable offset -> descriptor table handed to the emulator at startup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegisterMap {
    registers: BTreeMap<u32, RegisterDescriptor>,
}

impl RegisterMap {
    pub fn new<I>(descriptors: I) -> Result<Self, MmioError>
    where
        I: IntoIterator<Item = RegisterDescriptor>,
    {
        let mut registers: BTreeMap<u32, RegisterDescriptor> = BTreeMap::new();
        for desc in descriptors {
            if u64::from(desc.offset) >= WINDOW_SIZE {
                return Err(MmioError::UnmappedAccess(desc.offset.into()));
            }
            if desc.access != desc.semantics.access() {
                return Err(MmioError::DeviceError(format!(
                    "register {} declared {:?} but its semantics need {:?}",
                    desc.name,
                    desc.access,
                    desc.semantics.access()
                )));
            }
            if let Some(existing) = registers.get(&desc.offset) {
                return Err(MmioError::DeviceError(format!(
                    "registers {} and {} share offset {:#x}",
                    existing.name, desc.name, desc.offset
                )));
            }
            registers.insert(desc.offset, desc);
        }
        Ok(Self { registers })
    }

    /// TXDATA / STATUS / CTRL.
    pub fn sockdev() -> Self {
        let registers = [
            RegisterDescriptor::new(TXDATA, "TXDATA", Semantics::Transmit, 0),
            RegisterDescriptor::new(
                STATUS,
                "STATUS",
                Semantics::Constant,
                StatusReg::ready().raw().into(),
            ),
            RegisterDescriptor::new(
                CTRL,
                "CTRL",
                Semantics::Storage,
                CtrlReg::reset().raw().into(),
            ),
        ];
        Self {
            registers: registers.into_iter().map(|d| (d.offset, d)).collect(),
        }
    }

    pub fn lookup(&self, offset: u32) -> Option<&RegisterDescriptor> {
        self.registers.get(&offset)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegisterDescriptor> {
        self.registers.values()
    }

    pub fn len(&self) -> usize {
        self.registers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registers.is_empty()
    }
}

impl Default for RegisterMap {
    fn default() -> Self {
        Self::sockdev()
    }
}
