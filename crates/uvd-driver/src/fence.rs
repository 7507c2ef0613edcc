//! Fence bookkeeping
//!
//! Each fence gets the next 32-bit sequence number. The engine writes the
//! sequence into a write-back slot in GPU memory and raises the trap
//! interrupt; processing reads the slot and signals every pending fence at
//! or below it.

use crate::error::{Result, UvdError};
use crate::mmio::GpuMemory;
use crate::ring::{FenceFlags, Ring};
use crate::timing::Delay;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

/// Completion marker handed to a submitter.
#[derive(Debug, Clone)]
pub struct Fence {
    seq: u32,
    signaled: Arc<AtomicBool>,
}

impl Fence {
    /// Sequence number stored by the engine on completion.
    pub const fn seq(&self) -> u32 {
        self.seq
    }

    /// Whether the engine has passed this fence.
    pub fn is_signaled(&self) -> bool {
        self.signaled.load(Ordering::Acquire)
    }

    fn signal(&self) {
        self.signaled.store(true, Ordering::Release);
    }
}

/// `a` is at or past `b`, tolerating 32-bit wrap.
#[allow(clippy::cast_possible_wrap)]
pub const fn seq_passed(a: u32, b: u32) -> bool {
    (a.wrapping_sub(b) as i32) >= 0
}

/// Per-ring fence state.
#[derive(Debug)]
pub struct FenceDriver {
    gpu_addr: u64,
    sync_seq: u32,
    last_seq: u32,
    pending: Vec<Fence>,
    mem: Arc<dyn GpuMemory>,
}

impl FenceDriver {
    /// Track fences written back to the dword at `gpu_addr`.
    pub fn new(gpu_addr: u64, mem: Arc<dyn GpuMemory>) -> Self {
        mem.write_dword(gpu_addr, 0);
        Self {
            gpu_addr,
            sync_seq: 0,
            last_seq: 0,
            pending: Vec::new(),
            mem,
        }
    }

    /// Write-back slot address.
    pub const fn gpu_addr(&self) -> u64 {
        self.gpu_addr
    }

    /// Last sequence number handed out.
    pub const fn sync_seq(&self) -> u32 {
        self.sync_seq
    }

    /// Last sequence number observed in the slot.
    pub const fn last_seq(&self) -> u32 {
        self.last_seq
    }

    /// Fences emitted but not yet signaled.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Assign the next sequence number and encode the fence into `ring`.
    ///
    /// The caller has reserved ring space and commits afterwards.
    pub fn emit(&mut self, ring: &mut Ring, flags: FenceFlags) -> Fence {
        self.sync_seq = self.sync_seq.wrapping_add(1);
        let fence = Fence {
            seq: self.sync_seq,
            signaled: Arc::new(AtomicBool::new(false)),
        };
        ring.emit_fence(self.gpu_addr, fence.seq, flags);
        trace!("ring {}: emitted fence {}", ring.name(), fence.seq);
        self.pending.push(fence.clone());
        fence
    }

    /// Signal every pending fence the engine has passed.
    ///
    /// Returns the fences signaled by this call.
    pub fn process(&mut self) -> Vec<Fence> {
        let seq = self.mem.read_dword(self.gpu_addr);
        self.last_seq = seq;

        let (done, pending): (Vec<_>, Vec<_>) = self
            .pending
            .drain(..)
            .partition(|f| seq_passed(seq, f.seq));
        self.pending = pending;

        for f in &done {
            f.signal();
        }
        if !done.is_empty() {
            debug!("fence: seq {seq} signaled {} fence(s)", done.len());
        }
        done
    }

    /// Poll until `fence` signals, at most `usec_timeout` microseconds.
    ///
    /// # Errors
    ///
    /// `FenceTimeout` if the engine never passes the fence.
    pub fn wait(&mut self, fence: &Fence, delay: &dyn Delay, usec_timeout: u32) -> Result<()> {
        for _ in 0..usec_timeout {
            if fence.is_signaled() {
                return Ok(());
            }
            self.process();
            if fence.is_signaled() {
                return Ok(());
            }
            delay.delay_us(1);
        }
        Err(UvdError::FenceTimeout {
            seq: fence.seq,
            usec: usec_timeout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{UvdRingFuncs, FENCE_DW};
    use crate::sim::{SimClock, SimulatedUvd};

    const SLOT: u64 = 0x9000;

    fn setup() -> (FenceDriver, Ring, Arc<SimulatedUvd>) {
        let hw = Arc::new(SimulatedUvd::new());
        let funcs = Arc::new(UvdRingFuncs::new(hw.clone(), Arc::new(SimClock::default()), 10));
        let ring = Ring::new("uvd", 0x10_0000, 4096, funcs, hw.clone()).unwrap();
        (FenceDriver::new(SLOT, hw.clone()), ring, hw)
    }

    #[test]
    fn sequence_numbers_increase() {
        let (mut fences, mut ring, _) = setup();
        ring.alloc(2 * FENCE_DW).unwrap();
        let a = fences.emit(&mut ring, FenceFlags::empty());
        let b = fences.emit(&mut ring, FenceFlags::empty());
        assert_eq!((a.seq(), b.seq()), (1, 2));
        assert_eq!(fences.pending(), 2);
    }

    #[test]
    fn process_signals_up_to_slot_value() {
        let (mut fences, mut ring, hw) = setup();
        ring.alloc(3 * FENCE_DW).unwrap();
        let f: Vec<_> = (0..3)
            .map(|_| fences.emit(&mut ring, FenceFlags::empty()))
            .collect();

        hw.write_dword(SLOT, 2);
        let done = fences.process();
        assert_eq!(done.iter().map(Fence::seq).collect::<Vec<_>>(), vec![1, 2]);
        assert!(f[0].is_signaled() && f[1].is_signaled());
        assert!(!f[2].is_signaled());
        assert_eq!(fences.last_seq(), 2);

        assert!(fences.process().is_empty());
    }

    #[test]
    fn wait_times_out_on_virtual_clock() {
        let (mut fences, mut ring, _) = setup();
        ring.alloc(FENCE_DW).unwrap();
        let f = fences.emit(&mut ring, FenceFlags::empty());
        let clock = SimClock::default();
        let err = fences.wait(&f, &clock, 500).unwrap_err();
        assert!(matches!(err, UvdError::FenceTimeout { seq: 1, usec: 500 }));
        assert_eq!(clock.elapsed_us(), 500);
    }

    #[test]
    fn wrapping_comparison() {
        assert!(seq_passed(5, 5));
        assert!(seq_passed(6, 5));
        assert!(!seq_passed(4, 5));
        assert!(seq_passed(1, u32::MAX));
        assert!(!seq_passed(u32::MAX, 1));
    }
}
