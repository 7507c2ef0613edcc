//! UVD 6.0 device context and its lifecycle hooks.

use crate::commands::{UvdRingFuncs, FENCE_DW, IB_DW};
use crate::config::UvdConfig;
use crate::dump::RegisterDump;
use crate::engine::{Engine, EngineState};
use crate::error::{Result, UvdError};
use crate::fence::{Fence, FenceDriver};
use crate::ib::{IndirectBuffer, SessionMessage, MSG_SIZE_DW};
use crate::ip_block::{ClockGatingState, IpBlock, PowerGatingState};
use crate::irq::{InterruptState, IrqSource, IrqSourceFuncs, IvEntry, UvdIrqFuncs};
use crate::mc::FirmwareLayout;
use crate::mmio::{GpuMemory, RegisterSpace};
use crate::platform::UvdPlatform;
use crate::ring::{FenceFlags, Ring, RingFuncs};
use crate::timing::Delay;
use std::sync::Arc;
use tracing::{debug, error, info};
use uvd_chip::packet::packet0;
use uvd_chip::regs::{self, sema};

/// Ring name.
pub const RING_NAME: &str = "uvd";

/// Session handle used by the IB self-test.
pub const TEST_SESSION_HANDLE: u32 = 1;

const MSG_BYTES: u64 = (MSG_SIZE_DW * 4) as u64;
const IB_BYTES: u64 = 64;
/// Scratch for the IB self-test: two messages and two delivery IBs.
const IB_POOL_BYTES: u64 = 2 * MSG_BYTES + 2 * IB_BYTES;

/// Ring space reserved per IB submission.
const IB_SUBMIT_DW: u32 = IB_DW + FENCE_DW;

/// One UVD 6.0 engine.
#[derive(Debug)]
pub struct UvdDevice {
    regs: Arc<dyn RegisterSpace>,
    mem: Arc<dyn GpuMemory>,
    delay: Arc<dyn Delay>,
    platform: Box<dyn UvdPlatform>,
    config: UvdConfig,
    engine: Engine,
    irq: IrqSource,
    ring_funcs: Option<Arc<dyn RingFuncs>>,
    irq_funcs: Option<Arc<dyn IrqSourceFuncs>>,
    firmware: Option<FirmwareLayout>,
    ring: Option<Ring>,
    fences: Option<FenceDriver>,
    ib_pool: Option<u64>,
}

impl UvdDevice {
    /// Device over the given register space, memory and platform.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if `config` does not validate.
    pub fn new(
        regs: Arc<dyn RegisterSpace>,
        mem: Arc<dyn GpuMemory>,
        delay: Arc<dyn Delay>,
        platform: Box<dyn UvdPlatform>,
        config: UvdConfig,
    ) -> Result<Self> {
        config.validate()?;
        let engine = Engine::new(Arc::clone(&regs), Arc::clone(&delay));
        Ok(Self {
            regs,
            mem,
            delay,
            platform,
            config,
            engine,
            irq: IrqSource::new(1),
            ring_funcs: None,
            irq_funcs: None,
            firmware: None,
            ring: None,
            fences: None,
            ib_pool: None,
        })
    }

    /// Active configuration.
    pub const fn config(&self) -> &UvdConfig {
        &self.config
    }

    /// Engine lifecycle state.
    pub const fn state(&self) -> EngineState {
        self.engine.state()
    }

    /// The command ring, once software init has run.
    pub const fn ring(&self) -> Option<&Ring> {
        self.ring.as_ref()
    }

    /// Mutable ring access for producers.
    pub fn ring_mut(&mut self) -> Option<&mut Ring> {
        self.ring.as_mut()
    }

    /// Fence bookkeeping, once software init has run.
    pub const fn fences(&self) -> Option<&FenceDriver> {
        self.fences.as_ref()
    }

    /// Firmware window layout, once software init has run.
    pub const fn firmware_layout(&self) -> Option<&FirmwareLayout> {
        self.firmware.as_ref()
    }

    /// Interrupt source registration.
    pub const fn irq_source(&self) -> &IrqSource {
        &self.irq
    }

    fn not_initialized(what: &str) -> UvdError {
        UvdError::invalid_state(format!("{what}: software init has not run"))
    }

    /// Request an interrupt enable state.
    ///
    /// # Errors
    ///
    /// `InvalidState` before early init.
    pub fn set_interrupt_state(&mut self, irq_type: u32, state: InterruptState) -> Result<()> {
        let funcs = self
            .irq_funcs
            .clone()
            .ok_or_else(|| UvdError::invalid_state("interrupt funcs not selected"))?;
        funcs.set_state(&mut self.irq, irq_type, state)
    }

    /// Deliver an interrupt vector entry. Entries for other sources are
    /// ignored.
    ///
    /// # Errors
    ///
    /// `InvalidState` before software init.
    pub fn handle_interrupt(&mut self, entry: &IvEntry) -> Result<Vec<Fence>> {
        if !self.irq.matches(entry) {
            debug!("IH: ignoring src_id {}", entry.src_id);
            return Ok(Vec::new());
        }
        let funcs = self
            .irq_funcs
            .clone()
            .ok_or_else(|| UvdError::invalid_state("interrupt funcs not selected"))?;
        let fences = self
            .fences
            .as_mut()
            .ok_or_else(|| Self::not_initialized("interrupt"))?;
        funcs.process(entry, fences)
    }

    /// Submit an indirect buffer, optionally followed by a fence.
    ///
    /// # Errors
    ///
    /// `InvalidState` if the ring is not ready, `RingFull` if it has no room.
    pub fn submit_ib(&mut self, ib: &IndirectBuffer, with_fence: bool) -> Result<Option<Fence>> {
        let ring = self
            .ring
            .as_mut()
            .ok_or_else(|| Self::not_initialized("submit"))?;
        let fences = self
            .fences
            .as_mut()
            .ok_or_else(|| Self::not_initialized("submit"))?;
        if !ring.is_ready() {
            return Err(UvdError::invalid_state(format!(
                "ring {} is not ready",
                ring.name()
            )));
        }

        ring.alloc(IB_SUBMIT_DW)?;
        ring.emit_ib(ib);
        let fence = with_fence.then(|| fences.emit(ring, FenceFlags::empty()));
        ring.commit();
        Ok(fence)
    }

    /// Block until `fence` signals, bounded by the configured timeout.
    ///
    /// # Errors
    ///
    /// `FenceTimeout` if it never does.
    pub fn wait_fence(&mut self, fence: &Fence) -> Result<()> {
        let fences = self
            .fences
            .as_mut()
            .ok_or_else(|| Self::not_initialized("fence wait"))?;
        fences.wait(fence, self.delay.as_ref(), self.config.usec_timeout)
    }

    fn send_session_msg(
        &mut self,
        msg: SessionMessage,
        slot: u64,
        with_fence: bool,
    ) -> Result<Option<Fence>> {
        let pool = self.ib_pool.ok_or_else(|| Self::not_initialized("IB test"))?;
        let msg_addr = pool + slot * MSG_BYTES;
        let ib_addr = pool + 2 * MSG_BYTES + slot * IB_BYTES;

        msg.write(self.mem.as_ref(), msg_addr);
        let ib = IndirectBuffer::message_delivery(self.mem.as_ref(), ib_addr, msg_addr);
        self.submit_ib(&ib, with_fence)
    }

    /// Open and close a decode session through indirect buffers and wait
    /// for the closing fence.
    ///
    /// # Errors
    ///
    /// Submission failures, or `FenceTimeout` if the destroy never completes.
    pub fn test_indirect_buffer(&mut self) -> Result<()> {
        let handle = TEST_SESSION_HANDLE;

        if let Err(e) = self.send_session_msg(SessionMessage::Create { handle }, 0, false) {
            error!("failed to get create msg: {e}");
            return Err(e);
        }
        let fence = match self.send_session_msg(SessionMessage::Destroy { handle }, 1, true) {
            Ok(Some(f)) => f,
            Ok(None) => return Err(UvdError::invalid_state("destroy message produced no fence")),
            Err(e) => {
                error!("failed to get destroy msg: {e}");
                return Err(e);
            }
        };
        if let Err(e) = self.wait_fence(&fence) {
            error!("IB test fence wait failed: {e}");
            return Err(e);
        }
        info!("ib test on ring {RING_NAME} succeeded");
        Ok(())
    }

    fn start_engine(&mut self) -> Result<()> {
        let ring = self
            .ring
            .as_mut()
            .ok_or_else(|| Self::not_initialized("start"))?;
        let firmware = self
            .firmware
            .as_ref()
            .ok_or_else(|| Self::not_initialized("start"))?;
        self.engine.start(firmware, ring, self.config.byte_order)
    }

    fn configure_semaphores(ring: &mut Ring) -> Result<()> {
        if let Err(e) = ring.alloc(10) {
            error!("failed to lock ring {}: {e}", ring.name());
            return Err(e);
        }
        let writes = [
            (regs::UVD_SEMA_WAIT_FAULT_TIMEOUT_CNTL, sema::TIMEOUT),
            (regs::UVD_SEMA_WAIT_INCOMPLETE_TIMEOUT_CNTL, sema::TIMEOUT),
            (regs::UVD_SEMA_SIGNAL_INCOMPLETE_TIMEOUT_CNTL, sema::TIMEOUT),
            (regs::UVD_SEMA_TIMEOUT_STATUS, sema::TIMEOUT_STATUS_CLEAR),
            (regs::UVD_SEMA_CNTL, sema::CNTL_ENABLE),
        ];
        for (reg, value) in writes {
            ring.write(packet0(reg, 0));
            ring.write(value);
        }
        ring.commit();
        Ok(())
    }
}

impl IpBlock for UvdDevice {
    fn name(&self) -> &'static str {
        "uvd_v6_0"
    }

    fn early_init(&mut self) -> Result<()> {
        self.ring_funcs = Some(Arc::new(UvdRingFuncs::new(
            Arc::clone(&self.regs),
            Arc::clone(&self.delay),
            self.config.usec_timeout,
        )));
        self.irq_funcs = Some(Arc::new(UvdIrqFuncs));
        Ok(())
    }

    fn sw_init(&mut self) -> Result<()> {
        let funcs = self
            .ring_funcs
            .clone()
            .ok_or_else(|| UvdError::invalid_state("sw_init before early_init"))?;

        self.platform.add_irq_id(self.config.irq_src_id)?;
        self.irq.register(self.config.irq_src_id);

        let fw = self.platform.uvd_sw_init()?;
        let layout = FirmwareLayout::new(&fw)?;
        self.platform.uvd_resume()?;

        let ring_addr = self
            .platform
            .alloc_gpu_buffer(u64::from(self.config.ring_size))?;
        let fence_addr = self.platform.alloc_gpu_buffer(8)?;
        let pool = self.platform.alloc_gpu_buffer(IB_POOL_BYTES)?;

        let ring = Ring::new(
            RING_NAME,
            ring_addr,
            self.config.ring_size,
            funcs,
            Arc::clone(&self.mem),
        )?;

        self.firmware = Some(layout);
        self.fences = Some(FenceDriver::new(fence_addr, Arc::clone(&self.mem)));
        self.ring = Some(ring);
        self.ib_pool = Some(pool);
        self.engine.mark_initialized();
        debug!(
            "sw_init: firmware {} bytes at {:#x}, ring at {ring_addr:#x}",
            fw.size, fw.gpu_addr
        );
        Ok(())
    }

    fn sw_fini(&mut self) -> Result<()> {
        self.platform.uvd_suspend()?;
        self.platform.uvd_sw_fini()?;
        self.ring = None;
        self.fences = None;
        self.firmware = None;
        self.ib_pool = None;
        self.irq.unregister();
        self.engine.mark_uninitialized();
        Ok(())
    }

    fn hw_init(&mut self) -> Result<()> {
        self.start_engine()?;

        let ring = self
            .ring
            .as_mut()
            .ok_or_else(|| Self::not_initialized("hw_init"))?;
        ring.set_ready(true);
        if let Err(e) = ring.test() {
            ring.set_ready(false);
            return Err(e);
        }

        Self::configure_semaphores(ring)?;
        info!("UVD initialized successfully.");
        Ok(())
    }

    fn hw_fini(&mut self) -> Result<()> {
        self.engine.stop();
        if let Some(ring) = self.ring.as_mut() {
            ring.set_ready(false);
        }
        Ok(())
    }

    fn suspend(&mut self) -> Result<()> {
        if !self.config.is_apu {
            self.platform.uvd_suspend()?;
        }
        self.hw_fini()
    }

    fn resume(&mut self) -> Result<()> {
        if !self.config.is_apu {
            self.platform.uvd_resume()?;
        }
        self.hw_init()
    }

    fn is_idle(&self) -> bool {
        self.engine.is_idle()
    }

    fn wait_for_idle(&self) -> Result<()> {
        self.engine.wait_for_idle(self.config.usec_timeout)
    }

    fn soft_reset(&mut self) -> Result<()> {
        let ring = self
            .ring
            .as_mut()
            .ok_or_else(|| Self::not_initialized("soft_reset"))?;
        let firmware = self
            .firmware
            .as_ref()
            .ok_or_else(|| Self::not_initialized("soft_reset"))?;

        // The engine is stopped for the duration of the reset
        let was_ready = ring.is_ready();
        ring.set_ready(false);
        self.engine
            .soft_reset(firmware, ring, self.config.byte_order)?;
        ring.set_ready(was_ready);
        Ok(())
    }

    fn print_status(&self) {
        info!("{}", RegisterDump::capture(self.regs.as_ref()));
    }

    fn set_clockgating_state(&mut self, state: ClockGatingState) -> Result<()> {
        debug!("clock gating request {state:?} ignored");
        Ok(())
    }

    fn set_powergating_state(&mut self, state: PowerGatingState) -> Result<()> {
        match state {
            PowerGatingState::Gate => {
                self.engine.stop();
                Ok(())
            }
            PowerGatingState::Ungate => {
                let started = self.start_engine();
                if started.is_err() {
                    if let Some(ring) = self.ring.as_mut() {
                        ring.set_ready(false);
                    }
                }
                started
            }
        }
    }
}
