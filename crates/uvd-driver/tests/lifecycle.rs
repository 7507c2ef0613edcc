//! Lifecycle tests against the simulated engine
//!
//! Every test drives `UvdDevice` through the `IpBlock` contract the way the
//! device-management framework would, with all delays on a virtual clock.

use pretty_assertions::assert_eq;
use uvd_driver::chip::regs::{self, mastint, rb_cntl, soft_reset, srbm};
use uvd_driver::sim::{PlatformOp, SimHarness, SimPlatform, SimulatedUvd};
use uvd_driver::{
    ByteOrder, ClockGatingState, EngineState, IpBlock, PowerGatingState, RegisterSpace,
    UvdConfig, UvdError,
};

fn harness(hw: SimulatedUvd) -> SimHarness {
    SimHarness::with_parts(hw, SimPlatform::new(), UvdConfig::default()).unwrap()
}

fn bring_up(sim: &mut SimHarness) {
    sim.device.early_init().unwrap();
    sim.device.sw_init().unwrap();
    sim.device.hw_init().unwrap();
}

#[test]
fn full_lifecycle() {
    let mut sim = harness(SimulatedUvd::new());
    assert_eq!(sim.device.state(), EngineState::Uninitialized);

    bring_up(&mut sim);
    assert_eq!(sim.device.state(), EngineState::Running);
    assert!(sim.device.ring().unwrap().is_ready());
    assert_eq!(sim.device.irq_source().src_id(), Some(124));

    sim.device.test_indirect_buffer().unwrap();
    assert!(sim.hw.sessions().is_empty());

    sim.device.hw_fini().unwrap();
    assert_eq!(sim.device.state(), EngineState::Stopped);
    assert!(!sim.device.ring().unwrap().is_ready());

    sim.device.sw_fini().unwrap();
    assert_eq!(sim.device.state(), EngineState::Uninitialized);
    assert!(sim.device.ring().is_none());
    assert_eq!(sim.device.irq_source().src_id(), None);
}

#[test]
fn sw_init_requires_early_init() {
    let mut sim = harness(SimulatedUvd::new());
    let err = sim.device.sw_init().unwrap_err();
    assert!(matches!(err, UvdError::InvalidState { .. }));
}

#[test]
fn hw_init_programs_semaphore_timeouts() {
    let mut sim = harness(SimulatedUvd::new());
    bring_up(&mut sim);

    for reg in [
        regs::UVD_SEMA_WAIT_FAULT_TIMEOUT_CNTL,
        regs::UVD_SEMA_WAIT_INCOMPLETE_TIMEOUT_CNTL,
        regs::UVD_SEMA_SIGNAL_INCOMPLETE_TIMEOUT_CNTL,
    ] {
        assert_eq!(sim.hw.read32(reg), 0x000f_ffff);
    }
    assert_eq!(sim.hw.read32(regs::UVD_SEMA_TIMEOUT_STATUS), 0x8);
    assert_eq!(sim.hw.read32(regs::UVD_SEMA_CNTL), 3);
}

#[test]
fn start_leaves_ring_empty() {
    let mut sim = harness(SimulatedUvd::new());
    bring_up(&mut sim);
    sim.device.hw_fini().unwrap();
    sim.device.hw_init().unwrap();

    let ring = sim.device.ring().unwrap();
    assert_eq!(ring.wptr(), sim.hw.read32(regs::UVD_RBC_RB_RPTR));
    assert_eq!(ring.wptr(), sim.hw.read32(regs::UVD_RBC_RB_WPTR));
}

#[test]
fn boot_succeeds_on_tenth_attempt() {
    let mut sim = harness(SimulatedUvd::with_boot_failures(9));
    bring_up(&mut sim);
    assert_eq!(sim.device.state(), EngineState::Running);
    assert_eq!(sim.hw.vcpu_releases(), 10);
}

#[test]
fn boot_gives_up_after_ten_attempts() {
    let mut sim = harness(SimulatedUvd::with_boot_failures(10));
    sim.device.early_init().unwrap();
    sim.device.sw_init().unwrap();

    let err = sim.device.hw_init().unwrap_err();
    assert!(matches!(err, UvdError::EngineNotResponding { attempts: 10 }));
    assert!(err.is_fatal());
    assert_eq!(sim.device.state(), EngineState::Stopped);
    assert!(!sim.device.ring().unwrap().is_ready());

    // 10 attempts × (100 polls × 10 ms + 2 × 10 ms reset toggle), plus the
    // settle delays before the poll
    let per_attempt = 100 * 10_000 + 2 * 10_000;
    let settle = (1 + 5 + 5 + 5 + 10) * 1000;
    assert_eq!(sim.clock.elapsed_us(), 10 * per_attempt + settle);
}

#[test]
fn never_booting_engine_fails_without_hanging() {
    let mut sim = harness(SimulatedUvd::never_booting());
    sim.device.early_init().unwrap();
    sim.device.sw_init().unwrap();
    assert!(matches!(
        sim.device.hw_init(),
        Err(UvdError::EngineNotResponding { .. })
    ));
}

#[test]
fn stop_twice_matches_stop_once() {
    let mut sim = harness(SimulatedUvd::new());
    bring_up(&mut sim);

    sim.device.hw_fini().unwrap();
    let once = sim.hw.snapshot();
    sim.device.hw_fini().unwrap();
    assert_eq!(once, sim.hw.snapshot());
    assert_eq!(sim.hw.read32(regs::UVD_RBC_RB_CNTL), rb_cntl::IDLE);
    assert_eq!(sim.hw.read32(regs::UVD_SOFT_RESET), soft_reset::VCPU);
    assert_eq!(sim.hw.read32(regs::UVD_VCPU_CNTL), 0);
}

#[test]
fn soft_reset_restarts_engine() {
    let mut sim = harness(SimulatedUvd::new());
    bring_up(&mut sim);
    let releases = sim.hw.vcpu_releases();

    sim.device.soft_reset().unwrap();
    assert_eq!(sim.device.state(), EngineState::Running);
    assert_eq!(sim.hw.vcpu_releases(), releases + 1);
    assert_eq!(sim.hw.read32(regs::SRBM_SOFT_RESET) & srbm::SOFT_RESET_UVD, 0);
    sim.device.test_indirect_buffer().unwrap();
}

#[test]
fn soft_reset_fails_iff_start_fails() {
    let mut sim = harness(SimulatedUvd::new());
    bring_up(&mut sim);

    sim.hw.set_boot_failures(None);
    let err = sim.device.soft_reset().unwrap_err();
    assert!(matches!(err, UvdError::EngineNotResponding { .. }));
    assert_eq!(sim.device.state(), EngineState::Stopped);
    assert!(!sim.device.ring().unwrap().is_ready());
    assert!(matches!(
        sim.device.test_indirect_buffer(),
        Err(UvdError::InvalidState { .. })
    ));

    // A plain start from the stopped state fails the same way
    let err = sim
        .device
        .set_powergating_state(PowerGatingState::Ungate)
        .unwrap_err();
    assert!(matches!(err, UvdError::EngineNotResponding { .. }));
    assert_ne!(sim.device.state(), EngineState::Starting);
    assert!(!sim.device.ring().unwrap().is_ready());

    // Recovery needs a full hw_init to bring the ring back
    sim.hw.set_boot_failures(Some(0));
    sim.device.soft_reset().unwrap();
    assert_eq!(sim.device.state(), EngineState::Running);
    assert!(!sim.device.ring().unwrap().is_ready());
    sim.device.hw_init().unwrap();
    sim.device.test_indirect_buffer().unwrap();
}

#[test]
fn ring_test_failure_leaves_ring_not_ready() {
    let mut sim = harness(SimulatedUvd::new());
    sim.device.early_init().unwrap();
    sim.device.sw_init().unwrap();
    sim.hw.set_commits_apply(false);

    let before = sim.clock.elapsed_us();
    let (last_value, usec) = match sim.device.hw_init() {
        Err(UvdError::RingTestTimeout {
            last_value, usec, ..
        }) => (last_value, usec),
        other => panic!("expected RingTestTimeout, got {other:?}"),
    };
    assert_eq!(last_value, 0xCAFE_DEAD);
    assert_eq!(usec, 100_000);
    assert!(!sim.device.ring().unwrap().is_ready());

    // Start settle and boot delays plus exactly the poll budget
    let start_cost = (1 + 5 + 5 + 5 + 10) * 1000;
    assert_eq!(sim.clock.elapsed_us() - before, start_cost + 100_000);
}

#[test]
fn suspend_resume_discrete_gpu() {
    let mut sim = harness(SimulatedUvd::new());
    bring_up(&mut sim);
    sim.calls.clear();

    sim.device.suspend().unwrap();
    assert_eq!(sim.device.state(), EngineState::Stopped);
    sim.device.resume().unwrap();
    assert_eq!(sim.device.state(), EngineState::Running);
    assert_eq!(sim.calls.ops(), vec![PlatformOp::Suspend, PlatformOp::Resume]);
}

#[test]
fn failed_platform_suspend_leaves_engine_running() {
    let mut sim = SimHarness::with_parts(
        SimulatedUvd::new(),
        SimPlatform::new().failing_on(PlatformOp::Suspend),
        UvdConfig::default(),
    )
    .unwrap();
    bring_up(&mut sim);

    let err = sim.device.suspend().unwrap_err();
    assert!(matches!(err, UvdError::ResourceInit { .. }));
    assert_eq!(sim.device.state(), EngineState::Running);
    assert!(sim.device.ring().unwrap().is_ready());
    sim.device.test_indirect_buffer().unwrap();
}

#[test]
fn suspend_resume_skips_platform_on_apu() {
    let mut sim = SimHarness::with_parts(
        SimulatedUvd::new(),
        SimPlatform::new(),
        UvdConfig::default().with_apu(true),
    )
    .unwrap();
    bring_up(&mut sim);
    sim.calls.clear();

    sim.device.suspend().unwrap();
    sim.device.resume().unwrap();
    assert!(sim.calls.ops().is_empty());
    assert!(sim.device.ring().unwrap().is_ready());
}

#[test]
fn platform_failures_propagate() {
    for op in [PlatformOp::AddIrqId, PlatformOp::SwInit, PlatformOp::Alloc] {
        let mut sim = SimHarness::with_parts(
            SimulatedUvd::new(),
            SimPlatform::new().failing_on(op),
            UvdConfig::default(),
        )
        .unwrap();
        sim.device.early_init().unwrap();
        let err = sim.device.sw_init().unwrap_err();
        assert!(matches!(err, UvdError::ResourceInit { .. }), "{op:?}");
        assert_eq!(sim.device.state(), EngineState::Uninitialized);
    }

    let mut sim = SimHarness::with_parts(
        SimulatedUvd::new(),
        SimPlatform::new().failing_on(PlatformOp::SwFini),
        UvdConfig::default(),
    )
    .unwrap();
    bring_up(&mut sim);
    assert!(matches!(
        sim.device.sw_fini(),
        Err(UvdError::ResourceInit { .. })
    ));
}

#[test]
fn idle_checks() {
    let mut sim = harness(SimulatedUvd::new());
    bring_up(&mut sim);
    assert!(sim.device.is_idle());
    sim.device.wait_for_idle().unwrap();

    sim.hw.set_stuck_busy(true);
    assert!(!sim.device.is_idle());
    let err = sim.device.wait_for_idle().unwrap_err();
    assert!(matches!(err, UvdError::WaitTimeout { usec: 100_000 }));
    assert_eq!(sim.device.state(), EngineState::Running);
}

#[test]
fn power_gating_maps_to_stop_and_start() {
    let mut sim = harness(SimulatedUvd::new());
    bring_up(&mut sim);

    sim.device
        .set_powergating_state(PowerGatingState::Gate)
        .unwrap();
    assert_eq!(sim.device.state(), EngineState::Stopped);
    sim.device
        .set_powergating_state(PowerGatingState::Ungate)
        .unwrap();
    assert_eq!(sim.device.state(), EngineState::Running);

    let before = sim.hw.snapshot();
    sim.device
        .set_clockgating_state(ClockGatingState::Gate)
        .unwrap();
    assert_eq!(before, sim.hw.snapshot());
}

#[test]
fn big_endian_variant_programs_swap_and_runs() {
    let mut sim = SimHarness::with_parts(
        SimulatedUvd::new(),
        SimPlatform::new(),
        UvdConfig::default().with_byte_order(ByteOrder::Big),
    )
    .unwrap();
    bring_up(&mut sim);
    assert_eq!(sim.hw.read32(regs::UVD_LMI_SWAP_CNTL), 0xa);
    assert_eq!(sim.hw.read32(regs::UVD_MP_SWAP_CNTL), 0);
    sim.device.test_indirect_buffer().unwrap();
}

#[test]
fn little_endian_variant_programs_identity_swap() {
    let mut sim = SimHarness::with_parts(
        SimulatedUvd::new(),
        SimPlatform::new(),
        UvdConfig::default().with_byte_order(ByteOrder::Little),
    )
    .unwrap();
    bring_up(&mut sim);
    assert_eq!(sim.hw.read32(regs::UVD_LMI_SWAP_CNTL), 0);
    assert_eq!(sim.hw.read32(regs::UVD_MP_SWAP_CNTL), 0);
    assert_eq!(
        sim.hw.read32(regs::UVD_MASTINT_EN) & mastint::ENABLE,
        mastint::ENABLE
    );
}

#[test]
fn firmware_windows_programmed_from_platform_descriptor() {
    let mut sim = harness(SimulatedUvd::new());
    bring_up(&mut sim);
    let layout = *sim.device.firmware_layout().unwrap();

    assert_eq!(
        sim.hw.read32(regs::UVD_VCPU_CACHE_OFFSET1),
        layout.stack.encoded_offset()
    );
    assert_eq!(sim.hw.read32(regs::UVD_VCPU_CACHE_SIZE2), 1024 * 1024);
    assert_eq!(sim.hw.read32(regs::UVD_LMI_VCPU_CACHE_64BIT_BAR_HIGH), 1);
    sim.device.print_status();
}
