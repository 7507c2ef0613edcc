//! UVD 6.0 register map.
//!
//! All values are dword indices into the GPU register aperture. Multiply by
//! four for a byte offset into a mapped BAR.
//!
//! ```text
//! 0x0394..0x0398   SRBM status / soft reset (shared with other blocks)
//! 0x3bc0..0x3bd5   semaphore, GPCOM mailbox, UDEC config
//! 0x3c5e..0x3c69   LMI 64-bit BARs (VCPU cache, IB, ring)
//! 0x3d00..0x3dbd   engine control, MPC, VCPU cache windows, RBC
//! ```

// ── System register block (SRBM) ─────────────────────────────────────────────

/// System busy status, one bit per engine.
pub const SRBM_STATUS: u32 = 0x0394;
/// System soft reset, one bit per engine.
pub const SRBM_SOFT_RESET: u32 = 0x0398;

/// SRBM bit definitions scoped to this engine.
pub mod srbm {
    /// `SRBM_STATUS`: the UVD block is busy.
    pub const UVD_BUSY: u32 = 1 << 19;
    /// `SRBM_SOFT_RESET`: hold the UVD block in reset.
    pub const SOFT_RESET_UVD: u32 = 1 << 18;
}

// ── Semaphore and VCPU mailbox ───────────────────────────────────────────────

/// Semaphore address, low 20 bits of `addr >> 3`.
pub const UVD_SEMA_ADDR_LOW: u32 = 0x3bc0;
/// Semaphore address, low 20 bits of `addr >> 23`.
pub const UVD_SEMA_ADDR_HIGH: u32 = 0x3bc1;
/// Semaphore command (wait / signal).
pub const UVD_SEMA_CMD: u32 = 0x3bc2;
/// Mailbox command to the VCPU firmware.
pub const UVD_GPCOM_VCPU_CMD: u32 = 0x3bc3;
/// Mailbox data word 0 (address low).
pub const UVD_GPCOM_VCPU_DATA0: u32 = 0x3bc4;
/// Mailbox data word 1 (address high).
pub const UVD_GPCOM_VCPU_DATA1: u32 = 0x3bc5;
/// Engine control.
pub const UVD_ENGINE_CNTL: u32 = 0x3bc6;
/// UDEC tiling configuration.
pub const UVD_UDEC_ADDR_CONFIG: u32 = 0x3bd3;
/// UDEC DB tiling configuration.
pub const UVD_UDEC_DB_ADDR_CONFIG: u32 = 0x3bd4;
/// UDEC DBW tiling configuration.
pub const UVD_UDEC_DBW_ADDR_CONFIG: u32 = 0x3bd5;

// ── LMI 64-bit BARs ──────────────────────────────────────────────────────────

/// VCPU cache window base, high 32 bits.
pub const UVD_LMI_VCPU_CACHE_64BIT_BAR_HIGH: u32 = 0x3c5e;
/// VCPU cache window base, low 32 bits.
pub const UVD_LMI_VCPU_CACHE_64BIT_BAR_LOW: u32 = 0x3c5f;
/// Indirect buffer base, high 32 bits.
pub const UVD_LMI_RBC_IB_64BIT_BAR_HIGH: u32 = 0x3c66;
/// Indirect buffer base, low 32 bits.
pub const UVD_LMI_RBC_IB_64BIT_BAR_LOW: u32 = 0x3c67;
/// Ring buffer base, high 32 bits.
pub const UVD_LMI_RBC_RB_64BIT_BAR_HIGH: u32 = 0x3c68;
/// Ring buffer base, low 32 bits.
pub const UVD_LMI_RBC_RB_64BIT_BAR_LOW: u32 = 0x3c69;

// ── Engine control ───────────────────────────────────────────────────────────

/// Semaphore control.
pub const UVD_SEMA_CNTL: u32 = 0x3d00;
/// LMI 40-bit address extension.
pub const UVD_LMI_EXT40_ADDR: u32 = 0x3d26;
/// Context save index.
pub const UVD_CTX_INDEX: u32 = 0x3d28;
/// Context save data.
pub const UVD_CTX_DATA: u32 = 0x3d29;
/// Clock gate enables.
pub const UVD_CGC_GATE: u32 = 0x3d2a;
/// Clock gate control.
pub const UVD_CGC_CTRL: u32 = 0x3d2c;
/// Power status (dynamic power gating).
pub const UVD_POWER_STATUS: u32 = 0x3d2d;
/// LMI control 2 (memory/register bus stall).
pub const UVD_LMI_CTRL2: u32 = 0x3d3d;
/// Master interrupt enable.
pub const UVD_MASTINT_EN: u32 = 0x3d40;
/// LMI address extension.
pub const UVD_LMI_ADDR_EXT: u32 = 0x3d65;
/// LMI control.
pub const UVD_LMI_CTRL: u32 = 0x3d66;
/// LMI byte swap control.
pub const UVD_LMI_SWAP_CNTL: u32 = 0x3d6d;
/// MP byte swap control.
pub const UVD_MP_SWAP_CNTL: u32 = 0x3d6f;
/// MPC mux A0.
pub const UVD_MPC_SET_MUXA0: u32 = 0x3d79;
/// MPC mux A1.
pub const UVD_MPC_SET_MUXA1: u32 = 0x3d7a;
/// MPC mux B0.
pub const UVD_MPC_SET_MUXB0: u32 = 0x3d7b;
/// MPC mux B1.
pub const UVD_MPC_SET_MUXB1: u32 = 0x3d7c;
/// MPC mux.
pub const UVD_MPC_SET_MUX: u32 = 0x3d7d;
/// MPC ALU.
pub const UVD_MPC_SET_ALU: u32 = 0x3d7e;

// ── VCPU cache windows ───────────────────────────────────────────────────────

/// Window 0 (program/cache) offset, in 8-byte units.
pub const UVD_VCPU_CACHE_OFFSET0: u32 = 0x3d82;
/// Window 0 size in bytes.
pub const UVD_VCPU_CACHE_SIZE0: u32 = 0x3d83;
/// Window 1 (stack) offset, in 8-byte units.
pub const UVD_VCPU_CACHE_OFFSET1: u32 = 0x3d84;
/// Window 1 size in bytes.
pub const UVD_VCPU_CACHE_SIZE1: u32 = 0x3d85;
/// Window 2 (heap) offset, in 8-byte units.
pub const UVD_VCPU_CACHE_OFFSET2: u32 = 0x3d86;
/// Window 2 size in bytes.
pub const UVD_VCPU_CACHE_SIZE2: u32 = 0x3d87;
/// VCPU control.
pub const UVD_VCPU_CNTL: u32 = 0x3d98;
/// Per-subblock soft reset.
pub const UVD_SOFT_RESET: u32 = 0x3da0;

// ── Ring buffer controller (RBC) ─────────────────────────────────────────────

/// Indirect buffer size in dwords; writing it kicks the IB.
pub const UVD_RBC_IB_SIZE: u32 = 0x3da2;
/// Ring read pointer (hardware owned).
pub const UVD_RBC_RB_RPTR: u32 = 0x3da4;
/// Ring write pointer (software owned).
pub const UVD_RBC_RB_WPTR: u32 = 0x3da5;
/// Write pointer delay / polling control.
pub const UVD_RBC_RB_WPTR_CNTL: u32 = 0x3da6;
/// Ring control.
pub const UVD_RBC_RB_CNTL: u32 = 0x3da9;
/// Read pointer write-back address.
pub const UVD_RBC_RB_RPTR_ADDR: u32 = 0x3daa;
/// Engine status.
pub const UVD_STATUS: u32 = 0x3daf;
/// Semaphore timeout status.
pub const UVD_SEMA_TIMEOUT_STATUS: u32 = 0x3db0;
/// Semaphore wait-incomplete timeout.
pub const UVD_SEMA_WAIT_INCOMPLETE_TIMEOUT_CNTL: u32 = 0x3db1;
/// Semaphore wait-fault timeout.
pub const UVD_SEMA_WAIT_FAULT_TIMEOUT_CNTL: u32 = 0x3db2;
/// Semaphore signal-incomplete timeout.
pub const UVD_SEMA_SIGNAL_INCOMPLETE_TIMEOUT_CNTL: u32 = 0x3db3;
/// Context id scratch register (fence sequence, ring test sentinel).
pub const UVD_CONTEXT_ID: u32 = 0x3dbd;

// ── Bit definitions ──────────────────────────────────────────────────────────

/// `UVD_SOFT_RESET` lines.
pub mod soft_reset {
    /// Ring buffer controller.
    pub const RBC: u32 = 1 << 0;
    /// LBSI.
    pub const LBSI: u32 = 1 << 1;
    /// Local memory interface.
    pub const LMI: u32 = 1 << 2;
    /// Embedded video CPU.
    pub const VCPU: u32 = 1 << 3;
    /// CSM.
    pub const CSM: u32 = 1 << 5;
    /// CXW.
    pub const CXW: u32 = 1 << 6;
    /// TAP.
    pub const TAP: u32 = 1 << 7;
    /// LMI UMC.
    pub const LMI_UMC: u32 = 1 << 13;

    /// Every subblock the start sequence holds in reset.
    pub const ALL: u32 = LMI | VCPU | LBSI | RBC | CSM | CXW | TAP | LMI_UMC;
}

/// `UVD_STATUS` bits.
pub mod status {
    /// VCPU firmware has booted and reports ready.
    pub const VCPU_REPORT: u32 = 1 << 1;
    /// Sticky bit cleared after boot.
    pub const STALE: u32 = 1 << 2;
}

/// `UVD_POWER_STATUS` bits.
pub mod power_status {
    /// Dynamic power gating mode.
    pub const DPG_MODE: u32 = 1 << 2;
}

/// `UVD_MASTINT_EN` bits.
pub mod mastint {
    /// VCPU interrupt enable.
    pub const VCPU_EN: u32 = 1 << 1;
    /// System interrupt enable.
    pub const SYS_EN: u32 = 1 << 2;
    /// Both enables as written after boot.
    pub const ENABLE: u32 = VCPU_EN | SYS_EN;
}

/// `UVD_LMI_CTRL2` bits.
pub mod lmi_ctrl2 {
    /// Stall the UMC and register bus.
    pub const STALL_ARB_UMC: u32 = 1 << 8;
}

/// `UVD_LMI_CTRL` value programmed during start.
pub mod lmi_ctrl {
    /// Write-clean timer.
    pub const WRITE_CLEAN_TIMER: u32 = 0x40;
    /// Write-clean timer enable.
    pub const WRITE_CLEAN_TIMER_EN: u32 = 1 << 8;
    /// Request mode.
    pub const REQ_MODE: u32 = 1 << 9;
    /// Data coherency enable.
    pub const DATA_COHERENCY_EN: u32 = 1 << 13;
    /// VCPU data coherency enable.
    pub const VCPU_DATA_COHERENCY_EN: u32 = 1 << 20;
    /// Disable on fault.
    pub const DISABLE_ON_FWV_FAIL: u32 = 1 << 21;

    /// Value written by the start sequence.
    pub const START_VALUE: u32 = WRITE_CLEAN_TIMER
        | WRITE_CLEAN_TIMER_EN
        | DATA_COHERENCY_EN
        | DISABLE_ON_FWV_FAIL
        | REQ_MODE
        | VCPU_DATA_COHERENCY_EN;
}

/// Byte swap patterns for `UVD_LMI_SWAP_CNTL` / `UVD_MP_SWAP_CNTL`.
pub mod swap {
    /// No swapping (little-endian hosts).
    pub const NONE: u32 = 0;
    /// Swap 8-in-32 for ring and indirect buffers (big-endian hosts).
    pub const RB_IB_8IN32: u32 = 0xa;
}

/// Fixed MPC routing values programmed during start.
pub mod mpc {
    /// `UVD_MPC_SET_MUXA0` / `UVD_MPC_SET_MUXB0`.
    pub const MUX0: u32 = 0x040c_2040;
    /// `UVD_MPC_SET_MUXA1` / `UVD_MPC_SET_MUXB1`.
    pub const MUX1: u32 = 0;
    /// `UVD_MPC_SET_ALU`.
    pub const ALU: u32 = 0;
    /// `UVD_MPC_SET_MUX`.
    pub const MUX: u32 = 0x88;
}

/// `UVD_VCPU_CNTL` bits.
pub mod vcpu_cntl {
    /// VCPU clock enable.
    pub const CLK_EN: u32 = 1 << 9;
}

/// `UVD_RBC_RB_CNTL` fields.
pub mod rb_cntl {
    /// log2 of the ring size.
    pub const RB_BUFSZ_MASK: u32 = 0x0000_001f;
    /// Shift of [`RB_BUFSZ_MASK`].
    pub const RB_BUFSZ_SHIFT: u32 = 0;
    /// Fetch block size.
    pub const RB_BLKSZ_MASK: u32 = 0x0000_1f00;
    /// Shift of [`RB_BLKSZ_MASK`].
    pub const RB_BLKSZ_SHIFT: u32 = 8;
    /// Stop fetching from the ring.
    pub const RB_NO_FETCH_MASK: u32 = 0x0001_0000;
    /// Shift of [`RB_NO_FETCH_MASK`].
    pub const RB_NO_FETCH_SHIFT: u32 = 16;
    /// Poll the write pointer from memory.
    pub const RB_WPTR_POLL_EN_MASK: u32 = 0x0010_0000;
    /// Shift of [`RB_WPTR_POLL_EN_MASK`].
    pub const RB_WPTR_POLL_EN_SHIFT: u32 = 20;
    /// Do not write the read pointer back to memory.
    pub const RB_NO_UPDATE_MASK: u32 = 0x0100_0000;
    /// Shift of [`RB_NO_UPDATE_MASK`].
    pub const RB_NO_UPDATE_SHIFT: u32 = 24;
    /// Allow software writes of the read pointer.
    pub const RB_RPTR_WR_EN_MASK: u32 = 0x1000_0000;
    /// Shift of [`RB_RPTR_WR_EN_MASK`].
    pub const RB_RPTR_WR_EN_SHIFT: u32 = 28;

    /// Encoded idle value forced by the stop sequence.
    pub const IDLE: u32 = 0x1101_0101;

    /// Replace one field of a ring-control word.
    #[must_use]
    pub const fn set_field(reg: u32, mask: u32, shift: u32, value: u32) -> u32 {
        (reg & !mask) | ((value << shift) & mask)
    }

    /// Extract one field of a ring-control word.
    #[must_use]
    pub const fn get_field(reg: u32, mask: u32, shift: u32) -> u32 {
        (reg & mask) >> shift
    }
}

/// Values written to the semaphore block by `hw_init`.
pub mod sema {
    /// Timeout for all three semaphore timeout counters.
    pub const TIMEOUT: u32 = 0x000f_ffff;
    /// Clears the timeout status bits.
    pub const TIMEOUT_STATUS_CLEAR: u32 = 0x8;
    /// Semaphore enable.
    pub const CNTL_ENABLE: u32 = 3;
    /// `UVD_SEMA_CMD` base command.
    pub const CMD_BASE: u32 = 0x80;
    /// `UVD_SEMA_CMD` wait selector.
    pub const CMD_WAIT: u32 = 1;
    /// Address fields are 20 bits wide.
    pub const ADDR_MASK: u32 = 0x000f_ffff;
}

/// `UVD_GPCOM_VCPU_CMD` commands.
pub mod gpcom {
    /// Deliver the message (or fence write-back) at DATA0/DATA1.
    pub const MSG: u32 = 0;
    /// Raise the trap interrupt.
    pub const TRAP: u32 = 2;
    /// Fence addresses carry 40 bits; DATA1 keeps the top 8.
    pub const DATA1_FENCE_MASK: u32 = 0xff;
}

/// Interrupt source id of the UVD trap.
pub const UVD_TRAP_SRC_ID: u32 = 124;

/// Every register in diagnostic-dump order, with its name.
pub const DUMP_ORDER: [(&str, u32); 47] = [
    ("UVD_SEMA_ADDR_LOW", UVD_SEMA_ADDR_LOW),
    ("UVD_SEMA_ADDR_HIGH", UVD_SEMA_ADDR_HIGH),
    ("UVD_SEMA_CMD", UVD_SEMA_CMD),
    ("UVD_GPCOM_VCPU_CMD", UVD_GPCOM_VCPU_CMD),
    ("UVD_GPCOM_VCPU_DATA0", UVD_GPCOM_VCPU_DATA0),
    ("UVD_GPCOM_VCPU_DATA1", UVD_GPCOM_VCPU_DATA1),
    ("UVD_ENGINE_CNTL", UVD_ENGINE_CNTL),
    ("UVD_UDEC_ADDR_CONFIG", UVD_UDEC_ADDR_CONFIG),
    ("UVD_UDEC_DB_ADDR_CONFIG", UVD_UDEC_DB_ADDR_CONFIG),
    ("UVD_UDEC_DBW_ADDR_CONFIG", UVD_UDEC_DBW_ADDR_CONFIG),
    ("UVD_SEMA_CNTL", UVD_SEMA_CNTL),
    ("UVD_LMI_EXT40_ADDR", UVD_LMI_EXT40_ADDR),
    ("UVD_CTX_INDEX", UVD_CTX_INDEX),
    ("UVD_CTX_DATA", UVD_CTX_DATA),
    ("UVD_CGC_GATE", UVD_CGC_GATE),
    ("UVD_CGC_CTRL", UVD_CGC_CTRL),
    ("UVD_LMI_CTRL2", UVD_LMI_CTRL2),
    ("UVD_MASTINT_EN", UVD_MASTINT_EN),
    ("UVD_LMI_ADDR_EXT", UVD_LMI_ADDR_EXT),
    ("UVD_LMI_CTRL", UVD_LMI_CTRL),
    ("UVD_LMI_SWAP_CNTL", UVD_LMI_SWAP_CNTL),
    ("UVD_MP_SWAP_CNTL", UVD_MP_SWAP_CNTL),
    ("UVD_MPC_SET_MUXA0", UVD_MPC_SET_MUXA0),
    ("UVD_MPC_SET_MUXA1", UVD_MPC_SET_MUXA1),
    ("UVD_MPC_SET_MUXB0", UVD_MPC_SET_MUXB0),
    ("UVD_MPC_SET_MUXB1", UVD_MPC_SET_MUXB1),
    ("UVD_MPC_SET_MUX", UVD_MPC_SET_MUX),
    ("UVD_MPC_SET_ALU", UVD_MPC_SET_ALU),
    ("UVD_VCPU_CACHE_OFFSET0", UVD_VCPU_CACHE_OFFSET0),
    ("UVD_VCPU_CACHE_SIZE0", UVD_VCPU_CACHE_SIZE0),
    ("UVD_VCPU_CACHE_OFFSET1", UVD_VCPU_CACHE_OFFSET1),
    ("UVD_VCPU_CACHE_SIZE1", UVD_VCPU_CACHE_SIZE1),
    ("UVD_VCPU_CACHE_OFFSET2", UVD_VCPU_CACHE_OFFSET2),
    ("UVD_VCPU_CACHE_SIZE2", UVD_VCPU_CACHE_SIZE2),
    ("UVD_VCPU_CNTL", UVD_VCPU_CNTL),
    ("UVD_SOFT_RESET", UVD_SOFT_RESET),
    ("UVD_RBC_IB_SIZE", UVD_RBC_IB_SIZE),
    ("UVD_RBC_RB_RPTR", UVD_RBC_RB_RPTR),
    ("UVD_RBC_RB_WPTR", UVD_RBC_RB_WPTR),
    ("UVD_RBC_RB_WPTR_CNTL", UVD_RBC_RB_WPTR_CNTL),
    ("UVD_RBC_RB_CNTL", UVD_RBC_RB_CNTL),
    ("UVD_STATUS", UVD_STATUS),
    ("UVD_SEMA_TIMEOUT_STATUS", UVD_SEMA_TIMEOUT_STATUS),
    ("UVD_SEMA_WAIT_INCOMPLETE_TIMEOUT_CNTL", UVD_SEMA_WAIT_INCOMPLETE_TIMEOUT_CNTL),
    ("UVD_SEMA_WAIT_FAULT_TIMEOUT_CNTL", UVD_SEMA_WAIT_FAULT_TIMEOUT_CNTL),
    ("UVD_SEMA_SIGNAL_INCOMPLETE_TIMEOUT_CNTL", UVD_SEMA_SIGNAL_INCOMPLETE_TIMEOUT_CNTL),
    ("UVD_CONTEXT_ID", UVD_CONTEXT_ID),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_indices_non_overlapping() {
        let mut seen: Vec<u32> = DUMP_ORDER.iter().map(|&(_, r)| r).collect();
        seen.extend([
            UVD_POWER_STATUS,
            UVD_RBC_RB_RPTR_ADDR,
            UVD_LMI_RBC_RB_64BIT_BAR_LOW,
            UVD_LMI_RBC_RB_64BIT_BAR_HIGH,
            UVD_LMI_RBC_IB_64BIT_BAR_LOW,
            UVD_LMI_RBC_IB_64BIT_BAR_HIGH,
            UVD_LMI_VCPU_CACHE_64BIT_BAR_LOW,
            UVD_LMI_VCPU_CACHE_64BIT_BAR_HIGH,
            SRBM_STATUS,
            SRBM_SOFT_RESET,
        ]);
        let total = seen.len();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), total);
    }

    #[test]
    fn idle_ring_control_matches_fields() {
        let mut v = 0;
        v = rb_cntl::set_field(v, rb_cntl::RB_BUFSZ_MASK, rb_cntl::RB_BUFSZ_SHIFT, 1);
        v = rb_cntl::set_field(v, rb_cntl::RB_BLKSZ_MASK, rb_cntl::RB_BLKSZ_SHIFT, 1);
        v = rb_cntl::set_field(v, rb_cntl::RB_NO_FETCH_MASK, rb_cntl::RB_NO_FETCH_SHIFT, 1);
        v = rb_cntl::set_field(v, rb_cntl::RB_NO_UPDATE_MASK, rb_cntl::RB_NO_UPDATE_SHIFT, 1);
        v = rb_cntl::set_field(v, rb_cntl::RB_RPTR_WR_EN_MASK, rb_cntl::RB_RPTR_WR_EN_SHIFT, 1);
        assert_eq!(v, rb_cntl::IDLE);
    }

    #[test]
    fn soft_reset_all_keeps_vcpu() {
        assert_ne!(soft_reset::ALL & soft_reset::VCPU, 0);
        assert_eq!(soft_reset::ALL, 0x20ef);
    }

    #[test]
    fn lmi_ctrl_start_value() {
        assert_eq!(lmi_ctrl::START_VALUE, 0x0030_2340);
    }
}
