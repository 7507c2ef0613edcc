//! Indirect buffers and VCPU session messages.
//!
//! The engine fetches an indirect buffer when its size register is written
//! from the ring. The only indirect buffers this crate builds deliver a
//! session message to the firmware mailbox, which is how the IB self-test
//! exercises the full submission path.

use crate::mmio::{lower_32_bits, upper_32_bits, GpuMemory};
use uvd_chip::packet::{packet0, PACKET2};
use uvd_chip::regs;

/// Magic first dword of every session message.
pub const MSG_MAGIC: u32 = 0x0000_0de4;

/// Session message length in dwords.
pub const MSG_SIZE_DW: usize = 1024;

/// Length of a message-delivery indirect buffer in dwords.
pub const MSG_IB_SIZE_DW: u32 = 16;

/// An indirect buffer in GPU memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndirectBuffer {
    /// GPU address of the first dword
    pub gpu_addr: u64,
    /// Length in dwords
    pub length_dw: u32,
}

impl IndirectBuffer {
    /// Write `words` at `gpu_addr` and describe them.
    #[allow(clippy::cast_possible_truncation)]
    pub fn write(mem: &dyn GpuMemory, gpu_addr: u64, words: &[u32]) -> Self {
        mem.write_dwords(gpu_addr, words);
        Self {
            gpu_addr,
            length_dw: words.len() as u32,
        }
    }

    /// Build the indirect buffer that hands the message at `msg_addr` to the
    /// VCPU mailbox.
    pub fn message_delivery(mem: &dyn GpuMemory, gpu_addr: u64, msg_addr: u64) -> Self {
        let mut words = [PACKET2; MSG_IB_SIZE_DW as usize];
        words[..6].copy_from_slice(&[
            packet0(regs::UVD_GPCOM_VCPU_DATA0, 0),
            lower_32_bits(msg_addr),
            packet0(regs::UVD_GPCOM_VCPU_DATA1, 0),
            upper_32_bits(msg_addr),
            packet0(regs::UVD_GPCOM_VCPU_CMD, 0),
            regs::gpcom::MSG,
        ]);
        Self::write(mem, gpu_addr, &words)
    }
}

/// Session lifecycle messages understood by the firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMessage {
    /// Open a decode session
    Create {
        /// Session handle
        handle: u32,
    },
    /// Close a decode session
    Destroy {
        /// Session handle
        handle: u32,
    },
}

impl SessionMessage {
    /// Message type dword.
    pub const fn msg_type(self) -> u32 {
        match self {
            Self::Create { .. } => 0,
            Self::Destroy { .. } => 2,
        }
    }

    /// Session handle.
    pub const fn handle(self) -> u32 {
        match self {
            Self::Create { handle } | Self::Destroy { handle } => handle,
        }
    }

    /// Encoded message, zero padded.
    pub fn encode(self) -> Vec<u32> {
        let mut msg = vec![0u32; MSG_SIZE_DW];
        msg[0] = MSG_MAGIC;
        msg[1] = self.msg_type();
        msg[2] = self.handle();
        if let Self::Create { .. } = self {
            // 1920x1088 stream, fixed DPB size
            msg[7] = 0x780;
            msg[8] = 0x440;
            msg[10] = 0x01b3_7000;
        }
        msg
    }

    /// Write the message at `gpu_addr`.
    pub fn write(self, mem: &dyn GpuMemory, gpu_addr: u64) {
        mem.write_dwords(gpu_addr, &self.encode());
    }
}
