//! Memory controller programming for the VCPU cache windows.
//!
//! Must run while the VCPU is held in reset; the start sequence calls it
//! before releasing any reset line.

#![allow(clippy::cast_possible_truncation)]

use crate::error::{Result, UvdError};
use crate::mmio::{lower_32_bits, upper_32_bits, RegisterSpace};
use crate::platform::FirmwareDescriptor;
use tracing::debug;
use uvd_chip::memory::{cache_window_size, FIRMWARE_OFFSET, HEAP_SIZE, OFFSET_SHIFT, STACK_SIZE};
use uvd_chip::regs;

/// One VCPU cache window, relative to the firmware base.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    /// Byte offset from the firmware base address
    pub offset: u64,
    /// Window size in bytes
    pub size: u32,
}

impl Region {
    /// Offset as programmed into the offset register.
    pub const fn encoded_offset(&self) -> u32 {
        (self.offset >> OFFSET_SHIFT) as u32
    }

    /// First byte past the window.
    pub const fn end(&self) -> u64 {
        self.offset + self.size as u64
    }
}

/// The three windows for one firmware image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirmwareLayout {
    /// Firmware buffer base address
    pub base: u64,
    /// Window 0: firmware program and cache
    pub cache: Region,
    /// Window 1: VCPU stack
    pub stack: Region,
    /// Window 2: VCPU heap
    pub heap: Region,
}

impl FirmwareLayout {
    /// Lay the windows out back to back after the firmware header.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if the cache window does not fit its 32-bit size
    /// register.
    pub fn new(fw: &FirmwareDescriptor) -> Result<Self> {
        let cache_size = u32::try_from(fw.size)
            .ok()
            .and_then(|size| u32::try_from(cache_window_size(u64::from(size))).ok())
            .ok_or_else(|| {
                UvdError::invalid_config(format!(
                    "firmware of {:#x} bytes exceeds the VCPU cache window",
                    fw.size
                ))
            })?;
        let cache = Region {
            offset: FIRMWARE_OFFSET,
            size: cache_size,
        };
        let stack = Region {
            offset: cache.end(),
            size: STACK_SIZE,
        };
        let heap = Region {
            offset: stack.end(),
            size: HEAP_SIZE,
        };
        Ok(Self {
            base: fw.gpu_addr,
            cache,
            stack,
            heap,
        })
    }

    /// Windows in register order.
    pub const fn regions(&self) -> [Region; 3] {
        [self.cache, self.stack, self.heap]
    }

    /// Total bytes the VCPU buffer must cover from its base.
    pub const fn total_size(&self) -> u64 {
        self.heap.end()
    }

    /// Write the base address and the three windows.
    pub fn program(&self, regs: &dyn RegisterSpace) {
        debug!(
            "MC: base={:#x} cache={:#x}+{:#x} stack={:#x}+{:#x} heap={:#x}+{:#x}",
            self.base,
            self.cache.offset,
            self.cache.size,
            self.stack.offset,
            self.stack.size,
            self.heap.offset,
            self.heap.size
        );

        regs.write32(regs::UVD_LMI_VCPU_CACHE_64BIT_BAR_LOW, lower_32_bits(self.base));
        regs.write32(regs::UVD_LMI_VCPU_CACHE_64BIT_BAR_HIGH, upper_32_bits(self.base));

        let windows = [
            (regs::UVD_VCPU_CACHE_OFFSET0, regs::UVD_VCPU_CACHE_SIZE0),
            (regs::UVD_VCPU_CACHE_OFFSET1, regs::UVD_VCPU_CACHE_SIZE1),
            (regs::UVD_VCPU_CACHE_OFFSET2, regs::UVD_VCPU_CACHE_SIZE2),
        ];
        for ((offset_reg, size_reg), region) in windows.into_iter().zip(self.regions()) {
            regs.write32(offset_reg, region.encoded_offset());
            regs.write32(size_reg, region.size);
        }
    }
}

impl std::fmt::Display for FirmwareLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "firmware base {:#014x}", self.base)?;
        for (name, r) in ["cache", "stack", "heap"].iter().zip(self.regions()) {
            writeln!(
                f,
                "  {name:<5} offset {:#010x} (reg {:#08x})  size {:#09x}",
                r.offset,
                r.encoded_offset(),
                r.size
            )?;
        }
        write!(f, "  total {:#x} bytes", self.total_size())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimulatedUvd;
    use proptest::prelude::*;
    use uvd_chip::memory::{gpu_page_align, GPU_PAGE_SIZE};

    fn layout(size: u64) -> FirmwareLayout {
        FirmwareLayout::new(&FirmwareDescriptor {
            gpu_addr: 0x1_2345_0000,
            size,
        })
        .unwrap()
    }

    #[test]
    fn stack_follows_aligned_firmware() {
        for (s, expected) in [
            (0, GPU_PAGE_SIZE),
            (GPU_PAGE_SIZE - 1, 2 * GPU_PAGE_SIZE),
            (GPU_PAGE_SIZE, 2 * GPU_PAGE_SIZE),
        ] {
            let l = layout(s);
            assert_eq!(l.cache.offset, FIRMWARE_OFFSET);
            assert_eq!(l.stack.offset - l.cache.offset, expected, "fw size {s}");
            assert_eq!(l.heap.offset - l.stack.offset, u64::from(STACK_SIZE));
        }
    }

    #[test]
    fn program_writes_all_windows() {
        let sim = SimulatedUvd::new();
        let l = layout(GPU_PAGE_SIZE);
        l.program(&sim);

        assert_eq!(sim.read32(regs::UVD_LMI_VCPU_CACHE_64BIT_BAR_LOW), 0x2345_0000);
        assert_eq!(sim.read32(regs::UVD_LMI_VCPU_CACHE_64BIT_BAR_HIGH), 0x1);
        assert_eq!(sim.read32(regs::UVD_VCPU_CACHE_OFFSET0), 256 >> 3);
        assert_eq!(sim.read32(regs::UVD_VCPU_CACHE_SIZE0), 2 * 4096);
        assert_eq!(sim.read32(regs::UVD_VCPU_CACHE_OFFSET1), (256 + 8192) >> 3);
        assert_eq!(sim.read32(regs::UVD_VCPU_CACHE_SIZE1), STACK_SIZE);
        assert_eq!(
            sim.read32(regs::UVD_VCPU_CACHE_OFFSET2),
            ((256 + 8192 + u64::from(STACK_SIZE)) >> 3) as u32
        );
        assert_eq!(sim.read32(regs::UVD_VCPU_CACHE_SIZE2), HEAP_SIZE);
    }

    #[test]
    fn oversized_firmware_is_rejected() {
        let largest = u64::from(u32::MAX) - u64::from(u32::MAX) % GPU_PAGE_SIZE - 4;
        assert_eq!(u64::from(layout(largest).cache.size), largest + 4);

        for size in [largest + 1, 4 << 30, u64::MAX] {
            let err = FirmwareLayout::new(&FirmwareDescriptor { gpu_addr: 0, size }).unwrap_err();
            assert!(matches!(err, UvdError::InvalidConfig { .. }), "fw size {size:#x}");
        }
    }

    proptest! {
        #[test]
        fn windows_are_contiguous(size in 0u64..(64 << 20)) {
            let l = layout(size);
            prop_assert_eq!(l.stack.offset - l.cache.offset, gpu_page_align(size + 4));
            prop_assert_eq!(l.heap.offset, l.stack.offset + u64::from(STACK_SIZE));
            prop_assert_eq!(u64::from(l.cache.size) % GPU_PAGE_SIZE, 0);
        }
    }
}
