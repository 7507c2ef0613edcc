//! Engine lifecycle: start, stop, soft reset, idle checks.
//!
//! Start is a fixed register script with settle delays and one bounded
//! poll-with-retry (VCPU boot). It is laid out as [`START_SEQUENCE`] so each
//! step can be run and checked on its own:
//!
//! ```text
//!  1 DisableDynamicPowerGating      11 EnableVcpuClock
//!  2 SelectByteSwap                 12 UnstallMemoryBus
//!  3 ProgramMemoryController        13 BootVcpu              (10 ms)
//!  4 DisableClockGatingAndIrq       14 WaitForVcpuBoot       (10 × 100 × 10 ms)
//!  5 StallMemoryBus        (1 ms)   15 EnableMasterInterrupt
//!  6 ResetSubBlocks        (5 ms)   16 ConfigureRingControl
//!  7 ReleaseSystemReset    (5 ms)   17 ProgramRingAddresses
//!  8 ProgramLmiControl              18 ResetRingPointers
//!  9 ProgramMpcRouting              19 EnableRingFetch
//! 10 ReleaseSubBlocksExceptVcpu (5 ms)
//! ```

use crate::config::{ByteOrder, SwapConfig};
use crate::error::{Result, UvdError};
use crate::mc::FirmwareLayout;
use crate::mmio::{lower_32_bits, upper_32_bits, RegisterSpace};
use crate::ring::Ring;
use crate::timing::Delay;
use std::sync::Arc;
use tracing::{debug, error, info};
use uvd_chip::regs::{
    self, lmi_ctrl, lmi_ctrl2, mastint, mpc, power_status, rb_cntl, soft_reset, srbm, status,
    vcpu_cntl,
};

/// Outer VCPU boot attempts before giving up.
pub const BOOT_ATTEMPTS: u32 = 10;
/// Status polls per boot attempt.
pub const BOOT_POLLS: u32 = 100;
/// Delay between status polls (ms).
pub const BOOT_POLL_MS: u32 = 10;
/// Delay around the VCPU reset toggle between attempts (ms).
pub const VCPU_RESET_MS: u32 = 10;
/// Settle delay after the system-level soft reset toggle (ms).
pub const SRBM_RESET_MS: u32 = 5;

/// Lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Software resources not set up yet
    Uninitialized,
    /// Held in reset, ring disabled
    Stopped,
    /// Start sequence in progress
    Starting,
    /// VCPU booted, ring fetching
    Running,
    /// Stop sequence in progress
    Stopping,
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Uninitialized => "uninitialized",
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
        };
        f.write_str(s)
    }
}

/// Everything a start step touches.
#[derive(Debug)]
pub struct StartContext<'a> {
    /// Engine registers
    pub regs: &'a dyn RegisterSpace,
    /// Settle delays and boot polling
    pub delay: &'a dyn Delay,
    /// Firmware windows for the memory controller
    pub firmware: &'a FirmwareLayout,
    /// Ring the engine will fetch from
    pub ring: &'a mut Ring,
    /// Host byte order
    pub byte_order: ByteOrder,
    /// Swap values chosen by [`StartStep::SelectByteSwap`]
    pub swap: SwapConfig,
}

impl<'a> StartContext<'a> {
    /// Context for one start run.
    pub fn new(
        regs: &'a dyn RegisterSpace,
        delay: &'a dyn Delay,
        firmware: &'a FirmwareLayout,
        ring: &'a mut Ring,
        byte_order: ByteOrder,
    ) -> Self {
        Self {
            regs,
            delay,
            firmware,
            ring,
            byte_order,
            swap: ByteOrder::Little.swap_config(),
        }
    }
}

/// One step of the start script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartStep {
    /// Leave dynamic power gating mode
    DisableDynamicPowerGating,
    /// Pick ring/IB byte swapping for the host
    SelectByteSwap,
    /// Program the VCPU cache windows
    ProgramMemoryController,
    /// Ungate clocks and mask the VCPU interrupt
    DisableClockGatingAndInterrupts,
    /// Stall the UMC and register bus
    StallMemoryBus,
    /// Hold every sub-block in reset
    ResetSubBlocks,
    /// Release the system-level reset for this engine
    ReleaseSystemReset,
    /// LMI control flags and swap registers
    ProgramLmiControl,
    /// Fixed MPC mux/ALU routing
    ProgramMpcRouting,
    /// Release everything but the VCPU
    ReleaseSubBlocksExceptVcpu,
    /// Enable the VCPU clock
    EnableVcpuClock,
    /// Release the bus stall
    UnstallMemoryBus,
    /// Release the VCPU
    BootVcpu,
    /// Poll for the boot report, retrying with VCPU resets
    WaitForVcpuBoot,
    /// Unmask interrupts and clear the stale status bit
    EnableMasterInterrupt,
    /// Buffer size and fetch flags, fetch still disabled
    ConfigureRingControl,
    /// Write-pointer control, rptr write-back and ring base
    ProgramRingAddresses,
    /// Zero the read pointer and sync the software write pointer to it
    ResetRingPointers,
    /// Let the engine fetch from the ring
    EnableRingFetch,
}

/// The start script in execution order.
pub const START_SEQUENCE: [StartStep; 19] = [
    StartStep::DisableDynamicPowerGating,
    StartStep::SelectByteSwap,
    StartStep::ProgramMemoryController,
    StartStep::DisableClockGatingAndInterrupts,
    StartStep::StallMemoryBus,
    StartStep::ResetSubBlocks,
    StartStep::ReleaseSystemReset,
    StartStep::ProgramLmiControl,
    StartStep::ProgramMpcRouting,
    StartStep::ReleaseSubBlocksExceptVcpu,
    StartStep::EnableVcpuClock,
    StartStep::UnstallMemoryBus,
    StartStep::BootVcpu,
    StartStep::WaitForVcpuBoot,
    StartStep::EnableMasterInterrupt,
    StartStep::ConfigureRingControl,
    StartStep::ProgramRingAddresses,
    StartStep::ResetRingPointers,
    StartStep::EnableRingFetch,
];

impl StartStep {
    /// Delay after the step's register writes (ms).
    pub const fn settle_ms(self) -> u32 {
        match self {
            Self::StallMemoryBus => 1,
            Self::ResetSubBlocks | Self::ReleaseSystemReset | Self::ReleaseSubBlocksExceptVcpu => 5,
            Self::BootVcpu => 10,
            _ => 0,
        }
    }

    /// Run the step's register writes and its settle delay.
    ///
    /// # Errors
    ///
    /// Only [`StartStep::WaitForVcpuBoot`] fails, with `EngineNotResponding`.
    pub fn run(self, ctx: &mut StartContext<'_>) -> Result<()> {
        let r = ctx.regs;
        match self {
            Self::DisableDynamicPowerGating => {
                r.modify32(regs::UVD_POWER_STATUS, 0, power_status::DPG_MODE);
            }
            Self::SelectByteSwap => ctx.swap = ctx.byte_order.swap_config(),
            Self::ProgramMemoryController => ctx.firmware.program(r),
            Self::DisableClockGatingAndInterrupts => {
                r.write32(regs::UVD_CGC_GATE, 0);
                r.modify32(regs::UVD_MASTINT_EN, 0, mastint::VCPU_EN);
            }
            Self::StallMemoryBus => {
                r.modify32(
                    regs::UVD_LMI_CTRL2,
                    lmi_ctrl2::STALL_ARB_UMC,
                    lmi_ctrl2::STALL_ARB_UMC,
                );
            }
            Self::ResetSubBlocks => r.write32(regs::UVD_SOFT_RESET, soft_reset::ALL),
            Self::ReleaseSystemReset => {
                r.modify32(regs::SRBM_SOFT_RESET, 0, srbm::SOFT_RESET_UVD);
            }
            Self::ProgramLmiControl => {
                r.write32(regs::UVD_LMI_CTRL, lmi_ctrl::START_VALUE);
                r.write32(regs::UVD_LMI_SWAP_CNTL, ctx.swap.lmi);
                r.write32(regs::UVD_MP_SWAP_CNTL, ctx.swap.mp);
            }
            Self::ProgramMpcRouting => {
                r.write32(regs::UVD_MPC_SET_MUXA0, mpc::MUX0);
                r.write32(regs::UVD_MPC_SET_MUXA1, mpc::MUX1);
                r.write32(regs::UVD_MPC_SET_MUXB0, mpc::MUX0);
                r.write32(regs::UVD_MPC_SET_MUXB1, mpc::MUX1);
                r.write32(regs::UVD_MPC_SET_ALU, mpc::ALU);
                r.write32(regs::UVD_MPC_SET_MUX, mpc::MUX);
            }
            Self::ReleaseSubBlocksExceptVcpu => {
                r.write32(regs::UVD_SOFT_RESET, soft_reset::VCPU);
            }
            Self::EnableVcpuClock => r.write32(regs::UVD_VCPU_CNTL, vcpu_cntl::CLK_EN),
            Self::UnstallMemoryBus => {
                r.modify32(regs::UVD_LMI_CTRL2, 0, lmi_ctrl2::STALL_ARB_UMC);
            }
            Self::BootVcpu => r.write32(regs::UVD_SOFT_RESET, 0),
            Self::WaitForVcpuBoot => wait_for_vcpu_boot(r, ctx.delay)?,
            Self::EnableMasterInterrupt => {
                r.modify32(regs::UVD_MASTINT_EN, mastint::ENABLE, mastint::ENABLE);
                r.modify32(regs::UVD_STATUS, 0, status::STALE);
            }
            Self::ConfigureRingControl => {
                r.write32(regs::UVD_RBC_RB_CNTL, ring_control(ctx.ring.buf_sz_log2()));
            }
            Self::ProgramRingAddresses => {
                let addr = ctx.ring.gpu_addr();
                r.write32(regs::UVD_RBC_RB_WPTR_CNTL, 0);
                r.write32(regs::UVD_RBC_RB_RPTR_ADDR, upper_32_bits(addr) >> 2);
                r.write32(regs::UVD_LMI_RBC_RB_64BIT_BAR_LOW, lower_32_bits(addr));
                r.write32(regs::UVD_LMI_RBC_RB_64BIT_BAR_HIGH, upper_32_bits(addr));
            }
            Self::ResetRingPointers => {
                r.write32(regs::UVD_RBC_RB_RPTR, 0);
                let rptr = r.read32(regs::UVD_RBC_RB_RPTR);
                ctx.ring.reset_wptr(rptr);
                r.write32(regs::UVD_RBC_RB_WPTR, ctx.ring.wptr());
            }
            Self::EnableRingFetch => {
                r.modify32(regs::UVD_RBC_RB_CNTL, 0, rb_cntl::RB_NO_FETCH_MASK);
            }
        }

        let ms = self.settle_ms();
        if ms > 0 {
            ctx.delay.delay_ms(ms);
        }
        Ok(())
    }
}

/// Ring control word for a ring of `1 << buf_sz_log2` bytes, fetch disabled.
pub const fn ring_control(buf_sz_log2: u32) -> u32 {
    use rb_cntl::set_field;
    let mut v = 0;
    v = set_field(v, rb_cntl::RB_BUFSZ_MASK, rb_cntl::RB_BUFSZ_SHIFT, buf_sz_log2);
    v = set_field(v, rb_cntl::RB_BLKSZ_MASK, rb_cntl::RB_BLKSZ_SHIFT, 1);
    v = set_field(v, rb_cntl::RB_NO_FETCH_MASK, rb_cntl::RB_NO_FETCH_SHIFT, 1);
    v = set_field(v, rb_cntl::RB_WPTR_POLL_EN_MASK, rb_cntl::RB_WPTR_POLL_EN_SHIFT, 0);
    v = set_field(v, rb_cntl::RB_NO_UPDATE_MASK, rb_cntl::RB_NO_UPDATE_SHIFT, 1);
    set_field(v, rb_cntl::RB_RPTR_WR_EN_MASK, rb_cntl::RB_RPTR_WR_EN_SHIFT, 1)
}

fn wait_for_vcpu_boot(r: &dyn RegisterSpace, delay: &dyn Delay) -> Result<()> {
    for attempt in 1..=BOOT_ATTEMPTS {
        for _ in 0..BOOT_POLLS {
            if r.read32(regs::UVD_STATUS) & status::VCPU_REPORT != 0 {
                debug!("VCPU booted on attempt {attempt}");
                return Ok(());
            }
            delay.delay_ms(BOOT_POLL_MS);
        }

        error!("UVD not responding, trying to reset the VCPU!!!");
        r.modify32(regs::UVD_SOFT_RESET, soft_reset::VCPU, soft_reset::VCPU);
        delay.delay_ms(VCPU_RESET_MS);
        r.modify32(regs::UVD_SOFT_RESET, 0, soft_reset::VCPU);
        delay.delay_ms(VCPU_RESET_MS);
    }

    error!("UVD not responding, giving up!!!");
    Err(UvdError::EngineNotResponding {
        attempts: BOOT_ATTEMPTS,
    })
}

/// Engine lifecycle state machine.
#[derive(Debug)]
pub struct Engine {
    regs: Arc<dyn RegisterSpace>,
    delay: Arc<dyn Delay>,
    state: EngineState,
}

impl Engine {
    /// Engine in [`EngineState::Uninitialized`].
    pub fn new(regs: Arc<dyn RegisterSpace>, delay: Arc<dyn Delay>) -> Self {
        Self {
            regs,
            delay,
            state: EngineState::Uninitialized,
        }
    }

    /// Current state.
    pub const fn state(&self) -> EngineState {
        self.state
    }

    /// Software resources are in place; the engine can be started.
    pub fn mark_initialized(&mut self) {
        if self.state == EngineState::Uninitialized {
            self.state = EngineState::Stopped;
        }
    }

    /// Software resources released.
    pub fn mark_uninitialized(&mut self) {
        self.state = EngineState::Uninitialized;
    }

    /// Run [`START_SEQUENCE`].
    ///
    /// On failure the engine is back in [`EngineState::Stopped`] and the
    /// ring is left alone (its `ready` flag is the caller's).
    ///
    /// # Errors
    ///
    /// `InvalidState` before software init; `EngineNotResponding` if the
    /// VCPU never boots.
    pub fn start(
        &mut self,
        firmware: &FirmwareLayout,
        ring: &mut Ring,
        byte_order: ByteOrder,
    ) -> Result<()> {
        if self.state == EngineState::Uninitialized {
            return Err(UvdError::invalid_state(format!(
                "cannot start engine while {}",
                self.state
            )));
        }

        self.state = EngineState::Starting;
        let mut ctx = StartContext::new(
            self.regs.as_ref(),
            self.delay.as_ref(),
            firmware,
            ring,
            byte_order,
        );
        for step in START_SEQUENCE {
            if let Err(e) = step.run(&mut ctx) {
                self.state = EngineState::Stopped;
                return Err(e);
            }
        }

        self.state = EngineState::Running;
        info!("UVD engine started (ring {} bytes)", ring.size_bytes());
        Ok(())
    }

    /// Idle the ring controller and hold the VCPU in reset. Never fails and
    /// is safe to repeat.
    pub fn stop(&mut self) {
        if self.state != EngineState::Uninitialized {
            self.state = EngineState::Stopping;
        }

        let r = self.regs.as_ref();
        r.write32(regs::UVD_RBC_RB_CNTL, rb_cntl::IDLE);
        r.modify32(
            regs::UVD_LMI_CTRL2,
            lmi_ctrl2::STALL_ARB_UMC,
            lmi_ctrl2::STALL_ARB_UMC,
        );
        self.delay.delay_ms(1);
        r.write32(regs::UVD_SOFT_RESET, soft_reset::VCPU);
        self.delay.delay_ms(5);
        r.write32(regs::UVD_VCPU_CNTL, 0);
        r.modify32(regs::UVD_LMI_CTRL2, 0, lmi_ctrl2::STALL_ARB_UMC);

        if self.state != EngineState::Uninitialized {
            self.state = EngineState::Stopped;
        }
        debug!("UVD engine stopped");
    }

    /// Stop, pulse the system-level reset for this engine, start again.
    ///
    /// # Errors
    ///
    /// Whatever the restart returns; the engine is then `Stopped`.
    pub fn soft_reset(
        &mut self,
        firmware: &FirmwareLayout,
        ring: &mut Ring,
        byte_order: ByteOrder,
    ) -> Result<()> {
        self.stop();
        self.regs
            .modify32(regs::SRBM_SOFT_RESET, srbm::SOFT_RESET_UVD, srbm::SOFT_RESET_UVD);
        self.delay.delay_ms(SRBM_RESET_MS);
        self.start(firmware, ring, byte_order)
    }

    /// Whether the system busy register shows this engine idle.
    pub fn is_idle(&self) -> bool {
        self.regs.read32(regs::SRBM_STATUS) & srbm::UVD_BUSY == 0
    }

    /// Poll [`is_idle`](Self::is_idle) for up to `usec_timeout` microseconds.
    ///
    /// # Errors
    ///
    /// `WaitTimeout` if the engine stays busy. State is untouched.
    pub fn wait_for_idle(&self, usec_timeout: u32) -> Result<()> {
        for _ in 0..usec_timeout {
            if self.is_idle() {
                return Ok(());
            }
            self.delay.delay_us(1);
        }
        Err(UvdError::WaitTimeout { usec: usec_timeout })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::UvdRingFuncs;
    use crate::platform::FirmwareDescriptor;
    use crate::sim::{SimClock, SimulatedUvd};
    use pretty_assertions::assert_eq;

    struct Rig {
        hw: Arc<SimulatedUvd>,
        clock: Arc<SimClock>,
        ring: Ring,
        fw: FirmwareLayout,
        engine: Engine,
    }

    fn rig(hw: SimulatedUvd) -> Rig {
        let hw = Arc::new(hw);
        let clock = Arc::new(SimClock::default());
        let funcs = Arc::new(UvdRingFuncs::new(hw.clone(), clock.clone(), 1000));
        let ring = Ring::new("uvd", 0x2_0010_0000, 4096, funcs, hw.clone()).unwrap();
        let fw = FirmwareLayout::new(&FirmwareDescriptor {
            gpu_addr: 0x40_0000,
            size: 0x1_0000,
        })
        .unwrap();
        let mut engine = Engine::new(hw.clone(), clock.clone());
        engine.mark_initialized();
        Rig {
            hw,
            clock,
            ring,
            fw,
            engine,
        }
    }

    fn step(rig: &mut Rig, step: StartStep, order: ByteOrder) -> SwapConfig {
        let mut ctx = StartContext::new(
            rig.hw.as_ref(),
            rig.clock.as_ref(),
            &rig.fw,
            &mut rig.ring,
            order,
        );
        step.run(&mut ctx).unwrap();
        ctx.swap
    }

    #[test]
    fn sequence_has_nineteen_steps_ending_in_fetch() {
        assert_eq!(START_SEQUENCE.len(), 19);
        assert_eq!(START_SEQUENCE[13], StartStep::WaitForVcpuBoot);
        assert_eq!(START_SEQUENCE[18], StartStep::EnableRingFetch);
    }

    #[test]
    fn settle_delays() {
        let total: u32 = START_SEQUENCE.iter().map(|s| s.settle_ms()).sum();
        assert_eq!(total, 1 + 5 + 5 + 5 + 10);
    }

    #[test]
    fn dpg_mode_cleared_without_touching_other_bits() {
        let mut r = rig(SimulatedUvd::new());
        r.hw.write32(regs::UVD_POWER_STATUS, 0xff);
        step(&mut r, StartStep::DisableDynamicPowerGating, ByteOrder::Little);
        assert_eq!(r.hw.read32(regs::UVD_POWER_STATUS), 0xfb);
    }

    #[test]
    fn byte_swap_variants() {
        let mut r = rig(SimulatedUvd::new());
        let swap = step(&mut r, StartStep::SelectByteSwap, ByteOrder::Big);
        assert_eq!(swap, SwapConfig { lmi: 0xa, mp: 0 });

        let mut ctx = StartContext::new(
            r.hw.as_ref(),
            r.clock.as_ref(),
            &r.fw,
            &mut r.ring,
            ByteOrder::Big,
        );
        StartStep::SelectByteSwap.run(&mut ctx).unwrap();
        StartStep::ProgramLmiControl.run(&mut ctx).unwrap();
        assert_eq!(r.hw.read32(regs::UVD_LMI_CTRL), lmi_ctrl::START_VALUE);
        assert_eq!(r.hw.read32(regs::UVD_LMI_SWAP_CNTL), 0xa);
        assert_eq!(r.hw.read32(regs::UVD_MP_SWAP_CNTL), 0);
    }

    #[test]
    fn stall_and_unstall_only_touch_bit_eight() {
        let mut r = rig(SimulatedUvd::new());
        r.hw.write32(regs::UVD_LMI_CTRL2, 0x3);
        step(&mut r, StartStep::StallMemoryBus, ByteOrder::Little);
        assert_eq!(r.hw.read32(regs::UVD_LMI_CTRL2), 0x103);
        step(&mut r, StartStep::UnstallMemoryBus, ByteOrder::Little);
        assert_eq!(r.hw.read32(regs::UVD_LMI_CTRL2), 0x3);
        assert_eq!(r.clock.elapsed_us(), 1000);
    }

    #[test]
    fn mpc_routing_constants() {
        let mut r = rig(SimulatedUvd::new());
        step(&mut r, StartStep::ProgramMpcRouting, ByteOrder::Little);
        assert_eq!(r.hw.read32(regs::UVD_MPC_SET_MUXA0), 0x040c_2040);
        assert_eq!(r.hw.read32(regs::UVD_MPC_SET_MUXB0), 0x040c_2040);
        assert_eq!(r.hw.read32(regs::UVD_MPC_SET_MUXA1), 0);
        assert_eq!(r.hw.read32(regs::UVD_MPC_SET_MUX), 0x88);
    }

    #[test]
    fn ring_addresses() {
        let mut r = rig(SimulatedUvd::new());
        step(&mut r, StartStep::ConfigureRingControl, ByteOrder::Little);
        step(&mut r, StartStep::ProgramRingAddresses, ByteOrder::Little);
        let cntl = r.hw.read32(regs::UVD_RBC_RB_CNTL);
        assert_eq!(
            rb_cntl::get_field(cntl, rb_cntl::RB_BUFSZ_MASK, rb_cntl::RB_BUFSZ_SHIFT),
            12
        );
        assert_ne!(cntl & rb_cntl::RB_NO_FETCH_MASK, 0);
        assert_eq!(r.hw.read32(regs::UVD_RBC_RB_RPTR_ADDR), 0);
        assert_eq!(r.hw.read32(regs::UVD_LMI_RBC_RB_64BIT_BAR_LOW), 0x0010_0000);
        assert_eq!(r.hw.read32(regs::UVD_LMI_RBC_RB_64BIT_BAR_HIGH), 0x2);
    }

    #[test]
    fn ring_control_encodes_buffer_size() {
        assert_eq!(ring_control(12), 0x1101_010c);
        assert_eq!(ring_control(1), rb_cntl::IDLE);
    }

    #[test]
    fn start_before_init_is_rejected() {
        let mut r = rig(SimulatedUvd::new());
        r.engine.mark_uninitialized();
        let err = r
            .engine
            .start(&r.fw, &mut r.ring, ByteOrder::Little)
            .unwrap_err();
        assert!(matches!(err, UvdError::InvalidState { .. }));
    }

    #[test]
    fn start_reaches_running_with_empty_ring() {
        let mut r = rig(SimulatedUvd::new());
        r.engine.start(&r.fw, &mut r.ring, ByteOrder::Little).unwrap();
        assert_eq!(r.engine.state(), EngineState::Running);
        assert_eq!(r.ring.wptr(), r.hw.read32(regs::UVD_RBC_RB_RPTR));
        assert_eq!(r.hw.read32(regs::UVD_RBC_RB_CNTL) & rb_cntl::RB_NO_FETCH_MASK, 0);
        assert_eq!(
            r.hw.read32(regs::UVD_MASTINT_EN) & mastint::ENABLE,
            mastint::ENABLE
        );
    }

    #[test]
    fn stop_is_idempotent() {
        let mut r = rig(SimulatedUvd::new());
        r.engine.start(&r.fw, &mut r.ring, ByteOrder::Little).unwrap();
        r.engine.stop();
        let once = r.hw.snapshot();
        r.engine.stop();
        assert_eq!(once, r.hw.snapshot());
        assert_eq!(r.engine.state(), EngineState::Stopped);
        assert_eq!(r.hw.read32(regs::UVD_RBC_RB_CNTL), rb_cntl::IDLE);
    }

    #[test]
    fn wait_for_idle_is_bounded() {
        let r = rig(SimulatedUvd::new());
        r.hw.set_stuck_busy(true);
        assert!(!r.engine.is_idle());
        let err = r.engine.wait_for_idle(250).unwrap_err();
        assert!(matches!(err, UvdError::WaitTimeout { usec: 250 }));
        assert_eq!(r.clock.elapsed_us(), 250);
        assert_eq!(r.engine.state(), EngineState::Stopped);

        r.hw.set_stuck_busy(false);
        r.hw.set_busy_reads(3);
        r.engine.wait_for_idle(250).unwrap();
    }
}
