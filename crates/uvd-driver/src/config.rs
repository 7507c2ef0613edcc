//! Device-wide configuration
//!
//! Values come from the device-management framework in a real deployment.
//! [`UvdConfig::from_env`] lets the CLI and tests override the defaults
//! without code changes.

use crate::error::{Result, UvdError};
use tracing::debug;
use uvd_chip::regs::{swap, UVD_TRAP_SRC_ID};

/// Default poll budget for ring tests, fence waits and idle waits (µs).
pub const DEFAULT_USEC_TIMEOUT: u32 = 100_000;

/// Default ring capacity in bytes.
pub const DEFAULT_RING_SIZE: u32 = 4096;

/// Host byte order the engine's ring and buffers must match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// Little-endian host, no swapping
    Little,
    /// Big-endian host, 8-in-32 swap on ring and IB fetches
    Big,
}

impl ByteOrder {
    /// Byte order of the build target.
    pub const fn native() -> Self {
        if cfg!(target_endian = "big") {
            Self::Big
        } else {
            Self::Little
        }
    }

    /// Swap register values for this byte order.
    pub const fn swap_config(self) -> SwapConfig {
        match self {
            Self::Little => SwapConfig {
                lmi: swap::NONE,
                mp: swap::NONE,
            },
            Self::Big => SwapConfig {
                lmi: swap::RB_IB_8IN32,
                mp: swap::NONE,
            },
        }
    }
}

impl Default for ByteOrder {
    fn default() -> Self {
        Self::native()
    }
}

/// Values for `UVD_LMI_SWAP_CNTL` and `UVD_MP_SWAP_CNTL`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapConfig {
    /// `UVD_LMI_SWAP_CNTL`
    pub lmi: u32,
    /// `UVD_MP_SWAP_CNTL`
    pub mp: u32,
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UvdConfig {
    /// Poll budget in microseconds
    pub usec_timeout: u32,

    /// Integrated GPU: the firmware buffer survives suspend, so the
    /// platform suspend/resume step is skipped
    pub is_apu: bool,

    /// Byte-swap configuration programmed during start
    pub byte_order: ByteOrder,

    /// Ring capacity in bytes (power of two)
    pub ring_size: u32,

    /// Interrupt source id of the trap
    pub irq_src_id: u32,
}

impl Default for UvdConfig {
    fn default() -> Self {
        Self {
            usec_timeout: DEFAULT_USEC_TIMEOUT,
            is_apu: false,
            byte_order: ByteOrder::native(),
            ring_size: DEFAULT_RING_SIZE,
            irq_src_id: UVD_TRAP_SRC_ID,
        }
    }
}

impl UvdConfig {
    /// Defaults overridden by `UVD_USEC_TIMEOUT`, `UVD_IS_APU` and
    /// `UVD_BIG_ENDIAN`
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if a variable is set but does not parse.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("UVD_USEC_TIMEOUT") {
            config.usec_timeout = v
                .trim()
                .parse()
                .map_err(|e| UvdError::invalid_config(format!("UVD_USEC_TIMEOUT={v}: {e}")))?;
            debug!("usec_timeout from environment: {}", config.usec_timeout);
        }
        if let Ok(v) = std::env::var("UVD_IS_APU") {
            config.is_apu = parse_flag("UVD_IS_APU", &v)?;
        }
        if let Ok(v) = std::env::var("UVD_BIG_ENDIAN") {
            if parse_flag("UVD_BIG_ENDIAN", &v)? {
                config.byte_order = ByteOrder::Big;
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Set the poll budget.
    pub const fn with_usec_timeout(mut self, usec: u32) -> Self {
        self.usec_timeout = usec;
        self
    }

    /// Mark the device as an integrated GPU.
    pub const fn with_apu(mut self, is_apu: bool) -> Self {
        self.is_apu = is_apu;
        self
    }

    /// Override the byte order.
    pub const fn with_byte_order(mut self, order: ByteOrder) -> Self {
        self.byte_order = order;
        self
    }

    /// Override the ring capacity.
    pub const fn with_ring_size(mut self, bytes: u32) -> Self {
        self.ring_size = bytes;
        self
    }

    /// Check the configuration.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the ring size is not a power of two of at
    /// least two commit blocks, or the timeout is zero.
    pub fn validate(&self) -> Result<()> {
        if !self.ring_size.is_power_of_two() {
            return Err(UvdError::invalid_config(format!(
                "ring size {} is not a power of two",
                self.ring_size
            )));
        }
        // Two 16-dword commit blocks
        if self.ring_size < 128 {
            return Err(UvdError::invalid_config(format!(
                "ring size {} below 128 bytes",
                self.ring_size
            )));
        }
        if self.usec_timeout == 0 {
            return Err(UvdError::invalid_config("usec_timeout must be non-zero"));
        }
        Ok(())
    }
}

fn parse_flag(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(UvdError::invalid_config(format!(
            "{name}={other}: expected a boolean"
        ))),
    }
}
