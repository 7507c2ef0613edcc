//! UVD 6.0 ring function set.
//!
//! Everything the engine does through its ring is a sequence of type-0
//! register writes into the semaphore, mailbox and RBC blocks.

use crate::error::{Result, UvdError};
use crate::ib::IndirectBuffer;
use crate::mmio::{lower_32_bits, upper_32_bits, RegisterSpace};
use crate::ring::{FenceFlags, Ring, RingFuncs};
use crate::timing::Delay;
use std::sync::Arc;
use tracing::{error, info, warn};
use uvd_chip::packet::packet0;
use uvd_chip::regs::{self, gpcom, sema};

/// Value written directly before the ring test.
pub const RING_TEST_SEED: u32 = 0xCAFE_DEAD;

/// Value the ring test writes through the ring.
pub const RING_TEST_SENTINEL: u32 = 0xDEAD_BEEF;

/// Dwords emitted by [`UvdRingFuncs::emit_fence`].
pub const FENCE_DW: u32 = 14;

/// Dwords emitted by [`UvdRingFuncs::emit_ib`].
pub const IB_DW: u32 = 6;

/// Dwords emitted by [`UvdRingFuncs::emit_semaphore`].
pub const SEMAPHORE_DW: u32 = 6;

/// The engine's ring operations.
#[derive(Debug)]
pub struct UvdRingFuncs {
    regs: Arc<dyn RegisterSpace>,
    delay: Arc<dyn Delay>,
    usec_timeout: u32,
}

impl UvdRingFuncs {
    /// Bind to a register space; `usec_timeout` bounds the ring test.
    pub fn new(regs: Arc<dyn RegisterSpace>, delay: Arc<dyn Delay>, usec_timeout: u32) -> Self {
        Self {
            regs,
            delay,
            usec_timeout,
        }
    }
}

fn reg_write(ring: &mut Ring, reg: u32, value: u32) {
    ring.write(packet0(reg, 0));
    ring.write(value);
}

impl RingFuncs for UvdRingFuncs {
    fn get_rptr(&self, _ring: &Ring) -> u32 {
        self.regs.read32(regs::UVD_RBC_RB_RPTR)
    }

    fn get_wptr(&self, _ring: &Ring) -> u32 {
        self.regs.read32(regs::UVD_RBC_RB_WPTR)
    }

    fn set_wptr(&self, ring: &Ring) {
        self.regs.write32(regs::UVD_RBC_RB_WPTR, ring.wptr());
    }

    fn emit_ib(&self, ring: &mut Ring, ib: &IndirectBuffer) {
        reg_write(ring, regs::UVD_LMI_RBC_IB_64BIT_BAR_LOW, lower_32_bits(ib.gpu_addr));
        reg_write(ring, regs::UVD_LMI_RBC_IB_64BIT_BAR_HIGH, upper_32_bits(ib.gpu_addr));
        reg_write(ring, regs::UVD_RBC_IB_SIZE, ib.length_dw);
    }

    fn emit_fence(&self, ring: &mut Ring, addr: u64, seq: u32, flags: FenceFlags) {
        if flags.contains(FenceFlags::SIXTY_FOUR_BIT) {
            // Only the low 32 bits are stored; the request still goes out
            warn!(
                "{}",
                UvdError::UnsupportedFenceMode {
                    flags: flags.bits()
                }
            );
        }

        reg_write(ring, regs::UVD_CONTEXT_ID, seq);
        reg_write(ring, regs::UVD_GPCOM_VCPU_DATA0, lower_32_bits(addr));
        reg_write(
            ring,
            regs::UVD_GPCOM_VCPU_DATA1,
            upper_32_bits(addr) & gpcom::DATA1_FENCE_MASK,
        );
        reg_write(ring, regs::UVD_GPCOM_VCPU_CMD, gpcom::MSG);
        reg_write(ring, regs::UVD_GPCOM_VCPU_DATA0, 0);
        reg_write(ring, regs::UVD_GPCOM_VCPU_DATA1, 0);
        reg_write(ring, regs::UVD_GPCOM_VCPU_CMD, gpcom::TRAP);
    }

    #[allow(clippy::cast_possible_truncation)]
    fn emit_semaphore(&self, ring: &mut Ring, addr: u64, emit_wait: bool) -> bool {
        reg_write(
            ring,
            regs::UVD_SEMA_ADDR_LOW,
            ((addr >> 3) as u32) & sema::ADDR_MASK,
        );
        reg_write(
            ring,
            regs::UVD_SEMA_ADDR_HIGH,
            ((addr >> 23) as u32) & sema::ADDR_MASK,
        );
        let wait = if emit_wait { sema::CMD_WAIT } else { 0 };
        reg_write(ring, regs::UVD_SEMA_CMD, sema::CMD_BASE | wait);
        true
    }

    fn test_ring(&self, ring: &mut Ring) -> Result<()> {
        self.regs.write32(regs::UVD_CONTEXT_ID, RING_TEST_SEED);

        if let Err(e) = ring.alloc(3) {
            error!("ring {}: failed to lock ring for test: {e}", ring.name());
            return Err(e);
        }
        reg_write(ring, regs::UVD_CONTEXT_ID, RING_TEST_SENTINEL);
        ring.commit();

        let mut last = 0;
        for usec in 0..self.usec_timeout {
            last = self.regs.read32(regs::UVD_CONTEXT_ID);
            if last == RING_TEST_SENTINEL {
                info!("ring test on {} succeeded in {usec} usecs", ring.name());
                return Ok(());
            }
            self.delay.delay_us(1);
        }

        let err = UvdError::RingTestTimeout {
            ring: ring.name().to_string(),
            last_value: last,
            rptr: ring.rptr(),
            wptr: ring.wptr(),
            usec: self.usec_timeout,
        };
        error!("{err}");
        Err(err)
    }
}
