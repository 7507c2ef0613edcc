//! Command ring
//!
//! A power-of-two circular buffer of command dwords in GPU memory. Software
//! owns the write pointer, the engine owns the read pointer. Producers
//! reserve space with [`Ring::alloc`], write their dwords, and publish them
//! with [`Ring::commit`]. Callers serialize producers; a `&mut Ring` is the
//! ring lock.
//!
//! Engine-specific behaviour (pointer registers, command encoding, the ring
//! self-test) lives behind [`RingFuncs`].

use crate::error::{Result, UvdError};
use crate::ib::IndirectBuffer;
use crate::mmio::GpuMemory;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::{debug, error};
use uvd_chip::packet::PACKET2;

/// Commit granularity: the write pointer is published on 16-dword boundaries.
pub const ALIGN_MASK: u32 = 0xf;

/// Fence emission flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FenceFlags(u32);

impl FenceFlags {
    /// Store a 64-bit sequence value instead of 32 bits.
    pub const SIXTY_FOUR_BIT: Self = Self(1 << 0);
    /// Raise an interrupt when the fence signals.
    pub const INT: Self = Self(1 << 1);

    /// No flags.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Raw flag bits.
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Whether every bit of `other` is set.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for FenceFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Engine-specific ring operations, chosen when the device is constructed.
pub trait RingFuncs: Debug + Send + Sync {
    /// Hardware read pointer, in dwords.
    fn get_rptr(&self, ring: &Ring) -> u32;

    /// Hardware copy of the write pointer, in dwords.
    fn get_wptr(&self, ring: &Ring) -> u32;

    /// Publish the software write pointer. No bounds checking.
    fn set_wptr(&self, ring: &Ring);

    /// Encode an indirect buffer dispatch.
    fn emit_ib(&self, ring: &mut Ring, ib: &IndirectBuffer);

    /// Encode "store `seq` at `addr`, then raise the trap".
    fn emit_fence(&self, ring: &mut Ring, addr: u64, seq: u32, flags: FenceFlags);

    /// Encode a hardware semaphore wait or signal. Returns whether the
    /// engine supports the operation.
    fn emit_semaphore(&self, ring: &mut Ring, addr: u64, emit_wait: bool) -> bool;

    /// Round-trip a sentinel through the ring.
    ///
    /// # Errors
    ///
    /// `RingTestTimeout` if the engine never executes the write.
    fn test_ring(&self, ring: &mut Ring) -> Result<()>;
}

/// A command ring in GPU memory.
#[derive(Debug)]
pub struct Ring {
    name: String,
    gpu_addr: u64,
    size_bytes: u32,
    ptr_mask: u32,
    wptr: u32,
    wptr_old: u32,
    count_dw: u32,
    ready: bool,
    nop: u32,
    funcs: Arc<dyn RingFuncs>,
    mem: Arc<dyn GpuMemory>,
}

impl Ring {
    /// Create a ring of `size_bytes` at `gpu_addr`.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` unless the size is a power of two holding at least
    /// two commit blocks.
    pub fn new(
        name: impl Into<String>,
        gpu_addr: u64,
        size_bytes: u32,
        funcs: Arc<dyn RingFuncs>,
        mem: Arc<dyn GpuMemory>,
    ) -> Result<Self> {
        let name = name.into();
        if !size_bytes.is_power_of_two() || size_bytes / 4 <= ALIGN_MASK + 1 {
            return Err(UvdError::invalid_config(format!(
                "ring {name}: size {size_bytes} must be a power of two above {} bytes",
                (ALIGN_MASK + 1) * 4
            )));
        }
        debug!("ring {name}: {size_bytes} bytes at {gpu_addr:#x}");
        Ok(Self {
            name,
            gpu_addr,
            size_bytes,
            ptr_mask: size_bytes / 4 - 1,
            wptr: 0,
            wptr_old: 0,
            count_dw: 0,
            ready: false,
            nop: PACKET2,
            funcs,
            mem,
        })
    }

    /// Ring name used in diagnostics.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// GPU base address.
    pub const fn gpu_addr(&self) -> u64 {
        self.gpu_addr
    }

    /// Capacity in bytes.
    pub const fn size_bytes(&self) -> u32 {
        self.size_bytes
    }

    /// Capacity in dwords.
    pub const fn size_dw(&self) -> u32 {
        self.ptr_mask + 1
    }

    /// `log2(size_bytes)`, the ring-control buffer size field.
    pub const fn buf_sz_log2(&self) -> u32 {
        self.size_bytes.trailing_zeros()
    }

    /// Software write pointer, in dwords.
    pub const fn wptr(&self) -> u32 {
        self.wptr
    }

    /// Whether producers may submit.
    pub const fn is_ready(&self) -> bool {
        self.ready
    }

    /// Open or close the ring to producers.
    pub fn set_ready(&mut self, ready: bool) {
        self.ready = ready;
    }

    /// Function set driving this ring.
    pub fn funcs(&self) -> &Arc<dyn RingFuncs> {
        &self.funcs
    }

    /// Hardware read pointer.
    pub fn rptr(&self) -> u32 {
        self.funcs.get_rptr(self)
    }

    /// Reset the software pointer to `ptr`, typically the hardware read
    /// pointer after the ring has been reprogrammed.
    pub fn reset_wptr(&mut self, ptr: u32) {
        self.wptr = ptr & self.ptr_mask;
        self.wptr_old = self.wptr;
        self.count_dw = 0;
    }

    /// Dwords that can be reserved without reaching unconsumed entries.
    pub fn free_dw(&self) -> u32 {
        let rptr = self.rptr() & self.ptr_mask;
        match rptr.wrapping_add(self.size_dw()).wrapping_sub(self.wptr) & self.ptr_mask {
            0 => self.size_dw(),
            free => free,
        }
    }

    /// Reserve `ndw` dwords, rounded up to the commit granularity.
    ///
    /// One slot always stays empty so a full ring is distinguishable from
    /// an empty one.
    ///
    /// # Errors
    ///
    /// `RingFull` if the rounded request does not fit.
    pub fn alloc(&mut self, ndw: u32) -> Result<()> {
        let ndw = (ndw + ALIGN_MASK) & !ALIGN_MASK;
        let free = self.free_dw();
        if ndw >= free {
            error!("ring {}: requested {ndw} dwords, {free} free", self.name);
            return Err(UvdError::RingFull {
                ring: self.name.clone(),
                requested: ndw,
                free,
            });
        }
        self.count_dw = ndw;
        self.wptr_old = self.wptr;
        Ok(())
    }

    /// Append one dword. Words past the last [`alloc`](Self::alloc)
    /// reservation are dropped.
    pub fn write(&mut self, value: u32) {
        if self.count_dw == 0 {
            error!("ring {}: writing more dwords than reserved", self.name);
            return;
        }
        self.push(value);
    }

    fn push(&mut self, value: u32) {
        let addr = self.gpu_addr + u64::from(self.wptr) * 4;
        self.mem.write_dword(addr, value);
        self.wptr = (self.wptr + 1) & self.ptr_mask;
        self.count_dw = self.count_dw.saturating_sub(1);
    }

    /// Pad to the commit granularity with NOPs and publish the write pointer.
    pub fn commit(&mut self) {
        while self.wptr & ALIGN_MASK != 0 {
            self.push(self.nop);
        }
        self.count_dw = 0;
        self.funcs.set_wptr(self);
    }

    /// Drop everything written since the last [`alloc`](Self::alloc).
    pub fn undo(&mut self) {
        self.wptr = self.wptr_old;
        self.count_dw = 0;
    }

    /// Encode an indirect buffer dispatch.
    pub fn emit_ib(&mut self, ib: &IndirectBuffer) {
        let funcs = Arc::clone(&self.funcs);
        funcs.emit_ib(self, ib);
    }

    /// Encode a fence.
    pub fn emit_fence(&mut self, addr: u64, seq: u32, flags: FenceFlags) {
        let funcs = Arc::clone(&self.funcs);
        funcs.emit_fence(self, addr, seq, flags);
    }

    /// Encode a hardware semaphore.
    pub fn emit_semaphore(&mut self, addr: u64, emit_wait: bool) -> bool {
        let funcs = Arc::clone(&self.funcs);
        funcs.emit_semaphore(self, addr, emit_wait)
    }

    /// Run the engine's ring self-test.
    ///
    /// # Errors
    ///
    /// Propagates the self-test failure.
    pub fn test(&mut self) -> Result<()> {
        let funcs = Arc::clone(&self.funcs);
        funcs.test_ring(self)
    }
}
