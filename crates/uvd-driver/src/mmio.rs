//! Register and GPU memory access
//!
//! Everything the engine core touches goes through two seams:
//!
//! - [`RegisterSpace`]: 32-bit register reads/writes by dword index, plus a
//!   masked read-modify-write.
//! - [`GpuMemory`]: dword access to GPU-visible memory (ring words, fence
//!   write-back slots, indirect buffers).
//!
//! [`MappedRegion`] implements [`RegisterSpace`] over a PCI resource file
//! mapped with rustix. The simulated engine in [`crate::sim`] implements both.

// MMIO registers are naturally aligned by hardware, so pointer casts are safe
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_ptr_alignment)]

use crate::error::{Result, UvdError};
use rustix::mm::{mmap, munmap, MapFlags, ProtFlags};
use std::fmt::Debug;
use std::fs::{File, OpenOptions};
use std::os::unix::io::AsFd;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;

/// Register read/write surface addressed by dword index.
///
/// Accesses are unsynchronized; callers serialize them (one device-management
/// thread, producers holding the ring lock).
pub trait RegisterSpace: Debug + Send + Sync {
    /// Read a 32-bit register.
    fn read32(&self, reg: u32) -> u32;

    /// Write a 32-bit register.
    fn write32(&self, reg: u32, value: u32);

    /// Replace the bits selected by `field_mask` with the same bits of
    /// `value`, keeping everything else.
    fn modify32(&self, reg: u32, value: u32, field_mask: u32) {
        let old = self.read32(reg);
        self.write32(reg, (old & !field_mask) | (value & field_mask));
    }
}

/// GPU-visible memory, dword granular.
pub trait GpuMemory: Debug + Send + Sync {
    /// Read the dword at `gpu_addr`.
    fn read_dword(&self, gpu_addr: u64) -> u32;

    /// Write the dword at `gpu_addr`.
    fn write_dword(&self, gpu_addr: u64, value: u32);

    /// Write consecutive dwords starting at `gpu_addr`.
    fn write_dwords(&self, gpu_addr: u64, values: &[u32]) {
        for (addr, &v) in (gpu_addr..).step_by(4).zip(values) {
            self.write_dword(addr, v);
        }
    }
}

/// Low 32 bits of a 64-bit address.
#[must_use]
pub const fn lower_32_bits(v: u64) -> u32 {
    v as u32
}

/// High 32 bits of a 64-bit address.
#[must_use]
pub const fn upper_32_bits(v: u64) -> u32 {
    (v >> 32) as u32
}

/// Mapped register BAR
///
/// Registers are accessed with volatile 32-bit loads and stores at
/// `index * 4`.
pub struct MappedRegion {
    ptr: NonNull<u8>,
    size: usize,
    _file: File,
    path: PathBuf,
}

impl Debug for MappedRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappedRegion")
            .field("ptr", &format_args!("{:p}", self.ptr))
            .field("size", &self.size)
            .field("path", &self.path)
            .finish()
    }
}

impl MappedRegion {
    /// Map a PCI resource file (e.g. `/sys/bus/pci/devices/0000:01:00.0/resource5`)
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The resource file cannot be opened or stat'ed
    /// - The resource is empty (device not enabled)
    /// - Memory mapping fails
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        tracing::debug!("Mapping register BAR: {}", path.display());

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| UvdError::mmio(format!("Cannot open {}: {e}", path.display())))?;

        let size = file.metadata()?.len() as usize;
        if size == 0 {
            return Err(UvdError::mmio(format!(
                "{} has size 0 (device not enabled?)",
                path.display()
            )));
        }

        // SAFETY: mmap necessary for MMIO - maps the BAR into the process.
        // Invariants: (1) fd valid, just opened; (2) size non-zero; (3) file kept
        // alive in the struct for the mapping's lifetime; (4) unmapped in Drop.
        let addr = unsafe {
            mmap(
                std::ptr::null_mut(),
                size,
                ProtFlags::READ | ProtFlags::WRITE,
                MapFlags::SHARED,
                file.as_fd(),
                0,
            )
            .map_err(|e| UvdError::mmio(format!("mmap of {} failed: {e}", path.display())))?
        };

        let ptr = NonNull::new(addr.cast::<u8>())
            .ok_or_else(|| UvdError::mmio("mmap returned a null mapping"))?;

        tracing::info!("Mapped {} at {ptr:p}, size={size:#x}", path.display());

        Ok(Self {
            ptr,
            size,
            _file: file,
            path: path.to_path_buf(),
        })
    }

    /// Mapping size in bytes
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Resource file backing the mapping
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn offset_of(&self, reg: u32) -> usize {
        let offset = reg as usize * 4;
        assert!(
            offset + 4 <= self.size,
            "Register {reg:#x} out of bounds (BAR size {:#x})",
            self.size
        );
        offset
    }
}

impl RegisterSpace for MappedRegion {
    /// # Panics
    ///
    /// Panics if the register lies outside the mapping.
    fn read32(&self, reg: u32) -> u32 {
        let offset = self.offset_of(reg);
        // SAFETY: read_volatile necessary for MMIO - hardware can change value.
        // Invariants: (1) ptr from mmap, valid for self.size; (2) offset+4 <= size;
        // (3) dword aligned.
        let value = unsafe { self.ptr.as_ptr().add(offset).cast::<u32>().read_volatile() };
        tracing::trace!("RREG32 {reg:#06x} = {value:#010x}");
        value
    }

    /// # Panics
    ///
    /// Panics if the register lies outside the mapping.
    fn write32(&self, reg: u32, value: u32) {
        let offset = self.offset_of(reg);
        tracing::trace!("WREG32 {reg:#06x} <- {value:#010x}");
        // SAFETY: write_volatile necessary for MMIO - triggers hardware side effects.
        // Invariants: (1) ptr from mmap; (2) offset+4 <= size; (3) dword aligned.
        unsafe {
            self.ptr
                .as_ptr()
                .add(offset)
                .cast::<u32>()
                .write_volatile(value);
        }
    }
}

impl Drop for MappedRegion {
    fn drop(&mut self) {
        // SAFETY: ptr/size are exactly what mmap returned in open(); Drop runs once.
        unsafe {
            if let Err(e) = munmap(self.ptr.as_ptr().cast(), self.size) {
                tracing::error!("munmap failed during drop: {e}");
            }
        }
        tracing::debug!("Unmapped {}", self.path.display());
    }
}

// SAFETY: Send - MappedRegion owns the mapping exclusively; moving it between
// threads doesn't invalidate the mapping.
unsafe impl Send for MappedRegion {}

// SAFETY: Sync - every access is a single bounds-checked volatile load or store;
// ordering between accesses is the caller's serialization contract.
unsafe impl Sync for MappedRegion {}
