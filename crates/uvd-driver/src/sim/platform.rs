//! Simulated driver services with call recording and failure injection.

use crate::error::{Result, UvdError};
use crate::mc::FirmwareLayout;
use crate::platform::{FirmwareDescriptor, FirmwareImage, UvdPlatform};
use std::sync::{Arc, Mutex, PoisonError};
use uvd_chip::memory::{gpu_page_align, GPU_PAGE_SIZE};

/// Size of the placeholder firmware image.
pub const DEFAULT_FIRMWARE_SIZE: usize = 0x2_d0a4;

/// First GPU address handed out. Above 4 GiB so address high halves are
/// exercised.
pub const ALLOC_BASE: u64 = 0x1_0000_0000;

/// Platform entry points, for recording and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformOp {
    /// `add_irq_id`
    AddIrqId,
    /// `uvd_sw_init`
    SwInit,
    /// `uvd_sw_fini`
    SwFini,
    /// `uvd_suspend`
    Suspend,
    /// `uvd_resume`
    Resume,
    /// `alloc_gpu_buffer`
    Alloc,
}

/// Shared record of platform calls.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<PlatformOp>>>);

impl CallLog {
    fn push(&self, op: PlatformOp) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(op);
    }

    /// Calls so far, in order.
    pub fn ops(&self) -> Vec<PlatformOp> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Number of calls to `op`.
    pub fn count(&self, op: PlatformOp) -> usize {
        self.ops().iter().filter(|&&o| o == op).count()
    }

    /// Forget recorded calls.
    pub fn clear(&self) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

/// Bump allocator and placeholder firmware.
#[derive(Debug)]
pub struct SimPlatform {
    firmware: FirmwareImage,
    next_addr: u64,
    calls: CallLog,
    fail_on: Option<PlatformOp>,
}

impl Default for SimPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl SimPlatform {
    /// Platform with a zero-filled firmware image.
    pub fn new() -> Self {
        Self::with_firmware(FirmwareImage::new(vec![0u8; DEFAULT_FIRMWARE_SIZE]))
    }

    /// Platform serving `firmware`.
    pub fn with_firmware(firmware: FirmwareImage) -> Self {
        Self {
            firmware,
            next_addr: ALLOC_BASE,
            calls: CallLog::default(),
            fail_on: None,
        }
    }

    /// Make every call to `op` fail.
    #[must_use]
    pub fn failing_on(mut self, op: PlatformOp) -> Self {
        self.fail_on = Some(op);
        self
    }

    /// Handle on the call record.
    pub fn calls(&self) -> CallLog {
        self.calls.clone()
    }

    fn enter(&self, op: PlatformOp) -> Result<()> {
        self.calls.push(op);
        if self.fail_on == Some(op) {
            return Err(UvdError::resource_init(format!("injected {op:?} failure")));
        }
        Ok(())
    }

    fn bump(&mut self, bytes: u64) -> u64 {
        let addr = self.next_addr;
        self.next_addr += gpu_page_align(bytes.max(1)).max(GPU_PAGE_SIZE);
        addr
    }
}

impl UvdPlatform for SimPlatform {
    fn add_irq_id(&mut self, _src_id: u32) -> Result<()> {
        self.enter(PlatformOp::AddIrqId)
    }

    fn uvd_sw_init(&mut self) -> Result<FirmwareDescriptor> {
        self.enter(PlatformOp::SwInit)?;
        let probe = self.firmware.descriptor_at(0);
        let base = self.bump(FirmwareLayout::new(&probe)?.total_size());
        Ok(self.firmware.descriptor_at(base))
    }

    fn uvd_sw_fini(&mut self) -> Result<()> {
        self.enter(PlatformOp::SwFini)
    }

    fn uvd_suspend(&mut self) -> Result<()> {
        self.enter(PlatformOp::Suspend)
    }

    fn uvd_resume(&mut self) -> Result<()> {
        self.enter(PlatformOp::Resume)
    }

    fn alloc_gpu_buffer(&mut self, bytes: u64) -> Result<u64> {
        self.enter(PlatformOp::Alloc)?;
        Ok(self.bump(bytes))
    }
}
