//! Interrupt bridge: trap interrupt to fence processing.

use crate::error::Result;
use crate::fence::{Fence, FenceDriver};
use std::fmt::Debug;
use tracing::debug;

/// One interrupt vector entry as decoded by the interrupt handler ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IvEntry {
    /// Source id (124 for the UVD trap)
    pub src_id: u32,
    /// Source-specific payload
    pub src_data: u32,
}

/// Requested enable state of one interrupt type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InterruptState {
    /// Delivery masked
    #[default]
    Disabled,
    /// Delivery enabled
    Enabled,
}

/// Engine-specific interrupt handling.
pub trait IrqSourceFuncs: Debug + Send + Sync {
    /// Enable or disable delivery of `irq_type`.
    fn set_state(&self, source: &mut IrqSource, irq_type: u32, state: InterruptState) -> Result<()>;

    /// Handle a delivered entry; returns the fences it signaled.
    fn process(&self, entry: &IvEntry, fences: &mut FenceDriver) -> Result<Vec<Fence>>;
}

/// A registered interrupt source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrqSource {
    src_id: Option<u32>,
    states: Vec<InterruptState>,
}

impl IrqSource {
    /// Source with `num_types` interrupt types, all disabled, not yet
    /// registered.
    pub fn new(num_types: usize) -> Self {
        Self {
            src_id: None,
            states: vec![InterruptState::Disabled; num_types],
        }
    }

    /// Record the id the interrupt controller routes to this source.
    pub fn register(&mut self, src_id: u32) {
        self.src_id = Some(src_id);
    }

    /// Forget the registration.
    pub fn unregister(&mut self) {
        self.src_id = None;
    }

    /// Registered source id.
    pub const fn src_id(&self) -> Option<u32> {
        self.src_id
    }

    /// Number of interrupt types.
    pub fn num_types(&self) -> usize {
        self.states.len()
    }

    /// Last requested state of `irq_type`.
    pub fn state(&self, irq_type: u32) -> Option<InterruptState> {
        self.states.get(irq_type as usize).copied()
    }

    /// Whether this source owns `entry`.
    pub fn matches(&self, entry: &IvEntry) -> bool {
        self.src_id == Some(entry.src_id)
    }
}

/// Trap handling for the UVD ring.
#[derive(Debug, Default)]
pub struct UvdIrqFuncs;

impl IrqSourceFuncs for UvdIrqFuncs {
    /// Records the request only. The engine's trap has no mask register
    /// wired up here, so delivery is never actually gated.
    fn set_state(&self, source: &mut IrqSource, irq_type: u32, state: InterruptState) -> Result<()> {
        if let Some(slot) = source.states.get_mut(irq_type as usize) {
            *slot = state;
        }
        Ok(())
    }

    fn process(&self, entry: &IvEntry, fences: &mut FenceDriver) -> Result<Vec<Fence>> {
        debug!("IH: UVD TRAP (src_data {:#x})", entry.src_data);
        Ok(fences.process())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_type_source() {
        let mut src = IrqSource::new(1);
        assert_eq!(src.num_types(), 1);
        assert_eq!(src.src_id(), None);

        src.register(124);
        assert!(src.matches(&IvEntry {
            src_id: 124,
            src_data: 0
        }));
        assert!(!src.matches(&IvEntry {
            src_id: 125,
            src_data: 0
        }));
    }

    #[test]
    fn set_state_is_recorded_and_always_succeeds() {
        let mut src = IrqSource::new(1);
        UvdIrqFuncs
            .set_state(&mut src, 0, InterruptState::Enabled)
            .unwrap();
        assert_eq!(src.state(0), Some(InterruptState::Enabled));
        // Out-of-range types are accepted and ignored
        UvdIrqFuncs
            .set_state(&mut src, 3, InterruptState::Enabled)
            .unwrap();
        assert_eq!(src.state(3), None);
    }
}
