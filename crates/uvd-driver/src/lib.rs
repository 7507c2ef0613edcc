//! Pure Rust driver core for the UVD 6.0 video decode engine.
//!
//! Bring-up, tear-down and reset of the engine, its command ring, fences,
//! and the trap interrupt, behind the same lifecycle contract every GPU
//! block implements. Interrupt plumbing, firmware loading and buffer
//! allocation come from the surrounding driver through [`UvdPlatform`].
//!
//! # Layers
//!
//! ```text
//! IpBlock (UvdDevice)        early_init / sw_init / hw_init / suspend / ...
//!   ├─ Engine                start script, stop, soft reset, idle
//!   │    └─ FirmwareLayout   VCPU cache windows
//!   ├─ Ring + UvdRingFuncs   alloc / write / commit, command encoding
//!   ├─ FenceDriver           sequence numbers, write-back slot
//!   └─ UvdIrqFuncs           trap → fence processing
//! RegisterSpace / GpuMemory / Delay
//!   ├─ MappedRegion          real BAR via mmap
//!   └─ sim::SimulatedUvd     register-level engine model
//! ```
//!
//! # Quick start
//!
//! ```
//! use uvd_driver::sim::SimHarness;
//! use uvd_driver::{IpBlock, UvdConfig};
//!
//! # fn main() -> uvd_driver::Result<()> {
//! let mut sim = SimHarness::new(UvdConfig::default())?;
//! let dev = &mut sim.device;
//! dev.early_init()?;
//! dev.sw_init()?;
//! dev.hw_init()?;
//! dev.test_indirect_buffer()?;
//! dev.hw_fini()?;
//! dev.sw_fini()?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]

pub mod commands;
pub mod config;
mod device;
pub mod dump;
pub mod engine;
mod error;
pub mod fence;
pub mod ib;
mod ip_block;
pub mod irq;
pub mod mc;
pub mod mmio;
pub mod platform;
pub mod ring;
pub mod sim;
pub mod timing;

/// Register map and packet encoding (re-exported from uvd-chip).
pub mod chip {
    pub use uvd_chip::{memory, packet, regs};
}

pub use config::{ByteOrder, UvdConfig};
pub use device::UvdDevice;
pub use dump::RegisterDump;
pub use engine::{Engine, EngineState, StartStep, START_SEQUENCE};
pub use error::{Result, UvdError};
pub use fence::{Fence, FenceDriver};
pub use ib::{IndirectBuffer, SessionMessage};
pub use ip_block::{ClockGatingState, IpBlock, PowerGatingState};
pub use irq::{InterruptState, IrqSource, IrqSourceFuncs, IvEntry};
pub use mc::FirmwareLayout;
pub use mmio::{GpuMemory, MappedRegion, RegisterSpace};
pub use platform::{FirmwareDescriptor, FirmwareImage, UvdPlatform};
pub use ring::{FenceFlags, Ring, RingFuncs};
pub use timing::{Delay, StdDelay};
