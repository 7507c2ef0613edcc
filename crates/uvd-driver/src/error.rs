//! Error types for UVD driver operations

use thiserror::Error;

/// Result type alias for UVD operations
pub type Result<T> = std::result::Result<T, UvdError>;

/// Errors that can occur while bringing up or driving the engine
#[derive(Debug, Error)]
pub enum UvdError {
    /// External resource setup failed (IRQ registration, firmware, buffers)
    #[error("Resource initialization failed: {reason}")]
    ResourceInit {
        /// Reason reported by the platform
        reason: String,
    },

    /// The VCPU never reported boot, even after every reset retry
    #[error("UVD not responding after {attempts} boot attempts")]
    EngineNotResponding {
        /// Outer boot attempts made
        attempts: u32,
    },

    /// Ring self-test sentinel never appeared in the scratch register
    #[error(
        "Ring {ring} test failed after {usec} usecs (last value {last_value:#010x}, rptr {rptr}, wptr {wptr})"
    )]
    RingTestTimeout {
        /// Ring name
        ring: String,
        /// Last value read back from the scratch register
        last_value: u32,
        /// Hardware read pointer when the test gave up
        rptr: u32,
        /// Software write pointer published for the test
        wptr: u32,
        /// Poll budget in microseconds
        usec: u32,
    },

    /// Engine stayed busy for the whole poll budget
    #[error("Wait for idle timed out after {usec} usecs")]
    WaitTimeout {
        /// Poll budget in microseconds
        usec: u32,
    },

    /// 64-bit fence values requested on an engine that only stores 32 bits
    #[error("Unsupported fence mode (flags {flags:#x}): 64-bit fence values are not supported")]
    UnsupportedFenceMode {
        /// Flags passed by the caller
        flags: u32,
    },

    /// Not enough free ring space for the requested dwords
    #[error("Ring {ring} full: requested {requested} dwords, {free} free")]
    RingFull {
        /// Ring name
        ring: String,
        /// Dwords requested (after alignment)
        requested: u32,
        /// Dwords available
        free: u32,
    },

    /// A fence did not signal within the poll budget
    #[error("Fence {seq} wait timed out after {usec} usecs")]
    FenceTimeout {
        /// Sequence number waited on
        seq: u32,
        /// Poll budget in microseconds
        usec: u32,
    },

    /// Operation not valid in the current lifecycle state
    #[error("Device in invalid state: {state}")]
    InvalidState {
        /// Current state description
        state: String,
    },

    /// Configuration rejected
    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        /// Reason for rejection
        reason: String,
    },

    /// Register BAR could not be mapped
    #[error("MMIO error: {reason}")]
    Mmio {
        /// Reason for failure
        reason: String,
    },

    /// I/O error while opening a resource
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O error
        #[from]
        source: std::io::Error,
    },
}

impl UvdError {
    /// Create a resource initialization error
    pub fn resource_init(reason: impl Into<String>) -> Self {
        Self::ResourceInit {
            reason: reason.into(),
        }
    }

    /// Create an invalid state error
    pub fn invalid_state(state: impl Into<String>) -> Self {
        Self::InvalidState {
            state: state.into(),
        }
    }

    /// Create an invalid configuration error
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Create an MMIO error
    pub fn mmio(reason: impl Into<String>) -> Self {
        Self::Mmio {
            reason: reason.into(),
        }
    }

    /// Whether the error leaves the engine non-functional until a reset
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::EngineNotResponding { .. } | Self::RingTestTimeout { .. }
        )
    }
}
