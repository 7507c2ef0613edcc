//! Firmware window layout.
//!
//! The VCPU executes out of a single GPU buffer. The memory controller is
//! told where three windows of that buffer live:
//!
//! ```text
//! base ─┬─ FIRMWARE_OFFSET (256 B firmware header, not mapped)
//!       ├─ window 0  program/cache   align(fw_size + 4, GPU_PAGE_SIZE)
//!       ├─ window 1  stack           STACK_SIZE
//!       └─ window 2  heap            HEAP_SIZE
//! ```
//!
//! Offsets are programmed in 8-byte units (`offset >> 3`), sizes in bytes.

/// GPU page size in bytes.
pub const GPU_PAGE_SIZE: u64 = 4096;

/// Offset of window 0 from the firmware buffer base.
pub const FIRMWARE_OFFSET: u64 = 256;

/// VCPU stack window size.
pub const STACK_SIZE: u32 = 1024 * 1024;

/// VCPU heap window size.
pub const HEAP_SIZE: u32 = 1024 * 1024;

/// Extra bytes reserved after the firmware image in window 0.
pub const FIRMWARE_PAD: u64 = 4;

/// Window offsets are programmed shifted right by this amount.
pub const OFFSET_SHIFT: u32 = 3;

/// Round `value` up to the next multiple of [`GPU_PAGE_SIZE`].
#[must_use]
pub const fn gpu_page_align(value: u64) -> u64 {
    (value + GPU_PAGE_SIZE - 1) & !(GPU_PAGE_SIZE - 1)
}

/// Size of window 0 for a firmware image of `fw_size` bytes.
#[must_use]
pub const fn cache_window_size(fw_size: u64) -> u64 {
    gpu_page_align(fw_size + FIRMWARE_PAD)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn page_align_boundaries() {
        assert_eq!(gpu_page_align(0), 0);
        assert_eq!(gpu_page_align(1), GPU_PAGE_SIZE);
        assert_eq!(gpu_page_align(GPU_PAGE_SIZE), GPU_PAGE_SIZE);
        assert_eq!(gpu_page_align(GPU_PAGE_SIZE + 1), 2 * GPU_PAGE_SIZE);
    }

    #[test]
    fn cache_window_includes_pad() {
        assert_eq!(cache_window_size(0), GPU_PAGE_SIZE);
        assert_eq!(cache_window_size(GPU_PAGE_SIZE - 4), GPU_PAGE_SIZE);
        assert_eq!(cache_window_size(GPU_PAGE_SIZE - 1), 2 * GPU_PAGE_SIZE);
        assert_eq!(cache_window_size(GPU_PAGE_SIZE), 2 * GPU_PAGE_SIZE);
    }

    proptest! {
        #[test]
        fn page_align_is_minimal_multiple(v in 0u64..(1 << 40)) {
            let a = gpu_page_align(v);
            prop_assert_eq!(a % GPU_PAGE_SIZE, 0);
            prop_assert!(a >= v);
            prop_assert!(a - v < GPU_PAGE_SIZE);
        }
    }
}
