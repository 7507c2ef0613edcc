//! Command packets consumed by the ring buffer controller.
//!
//! The engine understands two packet types on its ring and in indirect
//! buffers:
//!
//! ```text
//! type 0   [31:30]=0  [29:16]=count-1  [15:0]=register   followed by count values
//! type 2   [31:30]=2                                      one-dword filler (NOP)
//! ```
//!
//! Every register write the driver performs through the ring is a type-0
//! packet with a single value.

/// `PACKET2` filler dword; also the ring's NOP.
pub const PACKET2: u32 = 0x8000_0000;

/// Mask of the packet type field.
pub const TYPE_MASK: u32 = 0xc000_0000;
/// Shift of the packet type field.
pub const TYPE_SHIFT: u32 = 30;
/// Mask of the register field of a type-0 header.
pub const REG_MASK: u32 = 0xffff;
/// Mask of the count field of a type-0 header (after shifting).
pub const COUNT_MASK: u32 = 0x3fff;
/// Shift of the count field of a type-0 header.
pub const COUNT_SHIFT: u32 = 16;

/// Encode a type-0 header writing `count + 1` consecutive values starting at `reg`.
#[must_use]
pub const fn packet0(reg: u32, count: u32) -> u32 {
    (reg & REG_MASK) | ((count & COUNT_MASK) << COUNT_SHIFT)
}

/// A decoded packet header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Header {
    /// Write `count` values starting at `reg`.
    RegWrite {
        /// First register index.
        reg: u32,
        /// Number of value dwords that follow.
        count: u32,
    },
    /// One-dword filler.
    Filler,
    /// A packet type this engine does not decode.
    Unknown(u32),
}

/// Decode a packet header dword.
#[must_use]
pub const fn decode(header: u32) -> Header {
    match (header & TYPE_MASK) >> TYPE_SHIFT {
        0 => Header::RegWrite {
            reg: header & REG_MASK,
            count: ((header >> COUNT_SHIFT) & COUNT_MASK) + 1,
        },
        2 => Header::Filler,
        _ => Header::Unknown(header),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regs;

    #[test]
    fn packet0_single_value() {
        assert_eq!(packet0(regs::UVD_CONTEXT_ID, 0), 0x0000_3dbd);
        assert_eq!(
            decode(packet0(regs::UVD_CONTEXT_ID, 0)),
            Header::RegWrite {
                reg: regs::UVD_CONTEXT_ID,
                count: 1
            }
        );
    }

    #[test]
    fn packet2_is_filler() {
        assert_eq!(decode(PACKET2), Header::Filler);
    }

    #[test]
    fn type3_is_unknown() {
        assert_eq!(decode(0xc000_1234), Header::Unknown(0xc000_1234));
    }
}
