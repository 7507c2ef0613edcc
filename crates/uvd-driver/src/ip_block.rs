//! Uniform lifecycle contract between a hardware block and the
//! device-management framework.
//!
//! The framework walks every block through the same calls in the same
//! order:
//!
//! ```text
//! early_init → sw_init → hw_init ─┬─ suspend → resume ─┐
//!                                 │ ◄──────────────────┘
//!                                 └─ hw_fini → sw_fini
//! ```

use crate::error::Result;

/// Requested clock gating state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockGatingState {
    /// Gate idle clocks
    Gate,
    /// Keep clocks running
    Ungate,
}

/// Requested power gating state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerGatingState {
    /// Power the block down
    Gate,
    /// Power the block up
    Ungate,
}

/// Lifecycle hooks of one hardware block.
pub trait IpBlock {
    /// Block name for logs.
    fn name(&self) -> &'static str;

    /// Select function sets; no hardware access.
    fn early_init(&mut self) -> Result<()>;

    /// Register interrupts and allocate software resources.
    fn sw_init(&mut self) -> Result<()>;

    /// Release what [`sw_init`](Self::sw_init) allocated.
    fn sw_fini(&mut self) -> Result<()>;

    /// Bring the hardware up and self-test it.
    fn hw_init(&mut self) -> Result<()>;

    /// Shut the hardware down.
    fn hw_fini(&mut self) -> Result<()>;

    /// Prepare for power loss.
    fn suspend(&mut self) -> Result<()>;

    /// Recover after power returns.
    fn resume(&mut self) -> Result<()>;

    /// Whether the block is idle. No side effects.
    fn is_idle(&self) -> bool;

    /// Wait, bounded, for the block to go idle.
    fn wait_for_idle(&self) -> Result<()>;

    /// Reset the block without a full teardown.
    fn soft_reset(&mut self) -> Result<()>;

    /// Log the block's registers.
    fn print_status(&self);

    /// Apply a clock gating request.
    fn set_clockgating_state(&mut self, state: ClockGatingState) -> Result<()>;

    /// Apply a power gating request.
    fn set_powergating_state(&mut self, state: PowerGatingState) -> Result<()>;
}
