//! Register dump for support and debugging.

use crate::mmio::RegisterSpace;
use std::fmt;
use uvd_chip::regs::DUMP_ORDER;

/// Snapshot of every engine register, in dump order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterDump {
    entries: Vec<(&'static str, u32)>,
}

impl RegisterDump {
    /// Read every register once.
    pub fn capture(regs: &dyn RegisterSpace) -> Self {
        Self {
            entries: DUMP_ORDER
                .iter()
                .map(|&(name, reg)| (name, regs.read32(reg)))
                .collect(),
        }
    }

    /// `(name, value)` pairs.
    pub fn entries(&self) -> &[(&'static str, u32)] {
        &self.entries
    }

    /// Value of the register called `name`.
    pub fn get(&self, name: &str) -> Option<u32> {
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|&(_, v)| v)
    }
}

impl fmt::Display for RegisterDump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UVD 6.0 registers")?;
        for (name, value) in &self.entries {
            write!(f, "\n  {name}=0x{value:08X}")?;
        }
        Ok(())
    }
}
