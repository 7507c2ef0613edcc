//! Simulated UVD engine
//!
//! A register file plus sparse GPU memory that behaves enough like the
//! engine for the driver to run end-to-end without hardware:
//!
//! 1. **VCPU boot**: `UVD_STATUS` reports boot once the VCPU has been
//!    released from reset with its clock on, optionally only after a number
//!    of failed attempts (or never).
//! 2. **Ring fetch**: publishing the write pointer executes the committed
//!    packets (type-0 register writes, type-2 filler) when fetch is enabled
//!    and the VCPU is up. Writing `UVD_RBC_IB_SIZE` executes an IB.
//! 3. **Mailbox**: `GPCOM_VCPU_CMD` writes the context id to the fence
//!    address (from the ring) or consumes a session message (from an IB);
//!    the trap command queues an interrupt vector entry.
//!
//! Knobs for failure paths: commits that never apply, a stuck busy bit,
//! boot failures.

mod clock;
mod platform;

pub use clock::SimClock;
pub use platform::{CallLog, PlatformOp, SimPlatform};

use crate::config::UvdConfig;
use crate::device::UvdDevice;
use crate::error::Result;
use crate::fence::Fence;
use crate::ib::MSG_MAGIC;
use crate::irq::IvEntry;
use crate::mmio::{GpuMemory, RegisterSpace};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{trace, warn};
use uvd_chip::packet::{decode, Header};
use uvd_chip::regs::{self, gpcom, rb_cntl, soft_reset, srbm, status, vcpu_cntl};

#[derive(Debug)]
struct SimState {
    regs: HashMap<u32, u32>,
    mem: BTreeMap<u64, u32>,
    /// Releases that fail to boot; `None` never boots
    boot_failures: Option<u32>,
    vcpu_releases: u32,
    commits_apply: bool,
    stuck_busy: bool,
    busy_reads: u32,
    sessions: BTreeSet<u32>,
    traps: Vec<IvEntry>,
    in_ib: bool,
    fetching: bool,
}

impl SimState {
    fn reg(&self, reg: u32) -> u32 {
        self.regs.get(&reg).copied().unwrap_or(0)
    }

    fn dword(&self, addr: u64) -> u32 {
        self.mem.get(&addr).copied().unwrap_or(0)
    }

    fn bar(&self, low: u32, high: u32) -> u64 {
        u64::from(self.reg(high)) << 32 | u64::from(self.reg(low))
    }

    fn vcpu_booted(&self) -> bool {
        let released = self.reg(regs::UVD_SOFT_RESET) & soft_reset::VCPU == 0;
        let clocked = self.reg(regs::UVD_VCPU_CNTL) & vcpu_cntl::CLK_EN != 0;
        released
            && clocked
            && self
                .boot_failures
                .is_some_and(|failures| self.vcpu_releases > failures)
    }

    fn read(&mut self, reg: u32) -> u32 {
        match reg {
            regs::UVD_STATUS => {
                let report = if self.vcpu_booted() {
                    status::VCPU_REPORT
                } else {
                    0
                };
                self.reg(reg) & !status::VCPU_REPORT | report
            }
            regs::SRBM_STATUS => {
                let busy = if self.stuck_busy {
                    true
                } else if self.busy_reads > 0 {
                    self.busy_reads -= 1;
                    true
                } else {
                    false
                };
                let v = self.reg(reg) & !srbm::UVD_BUSY;
                if busy {
                    v | srbm::UVD_BUSY
                } else {
                    v
                }
            }
            _ => self.reg(reg),
        }
    }

    fn write(&mut self, reg: u32, value: u32) {
        let old = self.reg(reg);
        match reg {
            regs::UVD_STATUS => {
                self.regs.insert(reg, value & !status::VCPU_REPORT);
            }
            regs::UVD_SOFT_RESET => {
                if old & soft_reset::VCPU != 0 && value & soft_reset::VCPU == 0 {
                    self.vcpu_releases += 1;
                }
                self.regs.insert(reg, value);
            }
            regs::UVD_RBC_RB_WPTR | regs::UVD_RBC_RB_CNTL => {
                self.regs.insert(reg, value);
                self.consume_ring();
            }
            regs::UVD_RBC_IB_SIZE => {
                self.regs.insert(reg, value);
                self.execute_ib(value);
            }
            regs::UVD_GPCOM_VCPU_CMD => {
                self.regs.insert(reg, value);
                self.mailbox(value);
            }
            _ => {
                self.regs.insert(reg, value);
            }
        }
    }

    fn fetch_enabled(&self) -> bool {
        self.reg(regs::UVD_RBC_RB_CNTL) & rb_cntl::RB_NO_FETCH_MASK == 0
    }

    fn consume_ring(&mut self) {
        if self.fetching || !self.commits_apply || !self.fetch_enabled() || !self.vcpu_booted() {
            return;
        }
        let cntl = self.reg(regs::UVD_RBC_RB_CNTL);
        let bufsz = rb_cntl::get_field(cntl, rb_cntl::RB_BUFSZ_MASK, rb_cntl::RB_BUFSZ_SHIFT);
        let size_dw = (1u32 << bufsz) / 4;
        if size_dw == 0 {
            return;
        }
        let mask = size_dw - 1;
        let base = self.bar(
            regs::UVD_LMI_RBC_RB_64BIT_BAR_LOW,
            regs::UVD_LMI_RBC_RB_64BIT_BAR_HIGH,
        );
        let wptr = self.reg(regs::UVD_RBC_RB_WPTR) & mask;
        let mut rptr = self.reg(regs::UVD_RBC_RB_RPTR) & mask;

        self.fetching = true;
        let at = |ptr: u32| base + u64::from(ptr) * 4;
        while rptr != wptr {
            let header = self.dword(at(rptr));
            rptr = (rptr + 1) & mask;
            match decode(header) {
                Header::RegWrite { reg, count } => {
                    for k in 0..count {
                        let value = self.dword(at(rptr));
                        rptr = (rptr + 1) & mask;
                        self.write(reg + k, value);
                    }
                }
                Header::Filler => {}
                Header::Unknown(h) => warn!("sim: unknown ring packet {h:#010x}"),
            }
        }
        self.regs.insert(regs::UVD_RBC_RB_RPTR, rptr);
        self.fetching = false;
    }

    fn execute_ib(&mut self, length_dw: u32) {
        let base = self.bar(
            regs::UVD_LMI_RBC_IB_64BIT_BAR_LOW,
            regs::UVD_LMI_RBC_IB_64BIT_BAR_HIGH,
        );
        trace!("sim: IB at {base:#x}, {length_dw} dwords");
        self.in_ib = true;
        let mut i = 0;
        while i < length_dw {
            let header = self.dword(base + u64::from(i) * 4);
            i += 1;
            match decode(header) {
                Header::RegWrite { reg, count } => {
                    for k in 0..count {
                        let value = self.dword(base + u64::from(i) * 4);
                        i += 1;
                        self.write(reg + k, value);
                    }
                }
                Header::Filler => {}
                Header::Unknown(h) => warn!("sim: unknown IB packet {h:#010x}"),
            }
        }
        self.in_ib = false;
    }

    fn mailbox(&mut self, cmd: u32) {
        match cmd {
            gpcom::MSG => {
                let addr = self.bar(regs::UVD_GPCOM_VCPU_DATA0, regs::UVD_GPCOM_VCPU_DATA1);
                if self.in_ib {
                    self.session_message(addr);
                } else {
                    let seq = self.reg(regs::UVD_CONTEXT_ID);
                    trace!("sim: fence {seq} -> {addr:#x}");
                    self.mem.insert(addr, seq);
                }
            }
            gpcom::TRAP => self.traps.push(IvEntry {
                src_id: regs::UVD_TRAP_SRC_ID,
                src_data: 0,
            }),
            other => warn!("sim: unknown mailbox command {other}"),
        }
    }

    fn session_message(&mut self, addr: u64) {
        if self.dword(addr) != MSG_MAGIC {
            warn!("sim: bad session message at {addr:#x}");
            return;
        }
        let handle = self.dword(addr + 8);
        match self.dword(addr + 4) {
            0 => {
                self.sessions.insert(handle);
            }
            2 => {
                self.sessions.remove(&handle);
            }
            t => warn!("sim: unsupported session message type {t}"),
        }
    }
}

/// Simulated engine registers and GPU memory.
#[derive(Debug)]
pub struct SimulatedUvd {
    state: Mutex<SimState>,
}

impl Default for SimulatedUvd {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedUvd {
    /// Engine that boots on the first VCPU release.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SimState {
                regs: HashMap::new(),
                mem: BTreeMap::new(),
                boot_failures: Some(0),
                vcpu_releases: 0,
                commits_apply: true,
                stuck_busy: false,
                busy_reads: 0,
                sessions: BTreeSet::new(),
                traps: Vec::new(),
                in_ib: false,
                fetching: false,
            }),
        }
    }

    /// Engine whose first `failures` VCPU releases do not boot.
    pub fn with_boot_failures(failures: u32) -> Self {
        let sim = Self::new();
        sim.lock().boot_failures = Some(failures);
        sim
    }

    /// Engine whose VCPU never boots.
    pub fn never_booting() -> Self {
        let sim = Self::new();
        sim.lock().boot_failures = None;
        sim
    }

    /// Change the boot model; counts releases made from now on.
    pub fn set_boot_failures(&self, failures: Option<u32>) {
        let mut s = self.lock();
        s.boot_failures = failures.map(|f| f + s.vcpu_releases);
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// When false, published write pointers are ignored.
    pub fn set_commits_apply(&self, apply: bool) {
        self.lock().commits_apply = apply;
    }

    /// Hold the busy bit set.
    pub fn set_stuck_busy(&self, busy: bool) {
        self.lock().stuck_busy = busy;
    }

    /// Report busy for the next `reads` status reads.
    pub fn set_busy_reads(&self, reads: u32) {
        self.lock().busy_reads = reads;
    }

    /// Times the VCPU has left reset.
    pub fn vcpu_releases(&self) -> u32 {
        self.lock().vcpu_releases
    }

    /// Whether `UVD_STATUS` currently reports boot.
    pub fn is_vcpu_booted(&self) -> bool {
        self.lock().vcpu_booted()
    }

    /// Open session handles.
    pub fn sessions(&self) -> Vec<u32> {
        self.lock().sessions.iter().copied().collect()
    }

    /// Drain queued trap interrupts.
    pub fn take_interrupts(&self) -> Vec<IvEntry> {
        std::mem::take(&mut self.lock().traps)
    }

    /// Every register written so far, as stored.
    pub fn snapshot(&self) -> BTreeMap<u32, u32> {
        self.lock().regs.iter().map(|(&r, &v)| (r, v)).collect()
    }
}

impl RegisterSpace for SimulatedUvd {
    fn read32(&self, reg: u32) -> u32 {
        self.lock().read(reg)
    }

    fn write32(&self, reg: u32, value: u32) {
        self.lock().write(reg, value);
    }
}

impl GpuMemory for SimulatedUvd {
    fn read_dword(&self, gpu_addr: u64) -> u32 {
        self.lock().dword(gpu_addr)
    }

    fn write_dword(&self, gpu_addr: u64, value: u32) {
        self.lock().mem.insert(gpu_addr, value);
    }
}

/// A [`UvdDevice`] wired to a simulated engine, clock and platform.
#[derive(Debug)]
pub struct SimHarness {
    /// The device under test
    pub device: UvdDevice,
    /// Engine registers and memory
    pub hw: Arc<SimulatedUvd>,
    /// Virtual clock behind every delay
    pub clock: Arc<SimClock>,
    /// Platform calls made by the device
    pub calls: CallLog,
}

impl SimHarness {
    /// Harness over an engine that boots immediately.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if `config` does not validate.
    pub fn new(config: UvdConfig) -> Result<Self> {
        Self::with_parts(SimulatedUvd::new(), SimPlatform::new(), config)
    }

    /// Harness over the given engine and platform.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if `config` does not validate.
    pub fn with_parts(hw: SimulatedUvd, platform: SimPlatform, config: UvdConfig) -> Result<Self> {
        let hw = Arc::new(hw);
        let clock = Arc::new(SimClock::default());
        let calls = platform.calls();
        let device = UvdDevice::new(
            hw.clone(),
            hw.clone(),
            clock.clone(),
            Box::new(platform),
            config,
        )?;
        Ok(Self {
            device,
            hw,
            clock,
            calls,
        })
    }

    /// Hand every queued trap to the device's interrupt bridge.
    ///
    /// # Errors
    ///
    /// Propagates interrupt handling failures.
    pub fn deliver_interrupts(&mut self) -> Result<Vec<Fence>> {
        let mut signaled = Vec::new();
        for entry in self.hw.take_interrupts() {
            signaled.extend(self.device.handle_interrupt(&entry)?);
        }
        Ok(signaled)
    }
}
