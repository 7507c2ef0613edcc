//! Services the surrounding GPU driver provides to this engine.
//!
//! Interrupt registration, firmware loading and GPU buffer allocation belong
//! to the device-management framework. The engine only needs the results:
//! a registered source id, a firmware descriptor and GPU addresses.

use crate::error::Result;
use bytes::Bytes;
use std::fmt::Debug;

/// Location and size of the loaded firmware image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirmwareDescriptor {
    /// GPU-visible base address of the firmware buffer
    pub gpu_addr: u64,
    /// Firmware image size in bytes
    pub size: u64,
}

/// Firmware payload as read by the loader.
///
/// The contents are opaque here; only the size feeds the memory layout.
#[derive(Debug, Clone, Default)]
pub struct FirmwareImage {
    data: Bytes,
}

impl FirmwareImage {
    /// Wrap a loaded image.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    /// Image bytes.
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Image size in bytes.
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// Descriptor for this image placed at `gpu_addr`.
    pub fn descriptor_at(&self, gpu_addr: u64) -> FirmwareDescriptor {
        FirmwareDescriptor {
            gpu_addr,
            size: self.size(),
        }
    }
}

/// Generic driver services consumed by the lifecycle adapter
///
/// Every error is passed back to the caller unchanged.
pub trait UvdPlatform: Debug + Send {
    /// Register interrupt source `src_id` with the interrupt controller.
    fn add_irq_id(&mut self, src_id: u32) -> Result<()>;

    /// Load firmware and allocate the VCPU buffer.
    fn uvd_sw_init(&mut self) -> Result<FirmwareDescriptor>;

    /// Release what [`uvd_sw_init`](Self::uvd_sw_init) allocated.
    fn uvd_sw_fini(&mut self) -> Result<()>;

    /// Save VCPU buffer contents ahead of a power loss.
    fn uvd_suspend(&mut self) -> Result<()>;

    /// Restore VCPU buffer contents after power returns.
    fn uvd_resume(&mut self) -> Result<()>;

    /// Allocate `bytes` of GPU-visible memory and return its address.
    fn alloc_gpu_buffer(&mut self, bytes: u64) -> Result<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_from_image() {
        let image = FirmwareImage::new(vec![0u8; 1234]);
        assert_eq!(
            image.descriptor_at(0x10_0000),
            FirmwareDescriptor {
                gpu_addr: 0x10_0000,
                size: 1234
            }
        );
        assert_eq!(image.data().len(), 1234);
    }
}
