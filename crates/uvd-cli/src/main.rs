//! `uvd`: command-line interface for the UVD 6.0 driver core.
//!
//! ```text
//! USAGE:
//!   uvd simulate [options]         Bring the simulated engine up and down
//!   uvd dump <resource-path>       Print registers of a mapped register BAR
//!   uvd layout <firmware-size>     Print the VCPU cache windows for a firmware
//! ```

use anyhow::{bail, Context, Result};
use bytes::Bytes;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;
use uvd_chip::regs::DUMP_ORDER;
use uvd_driver::sim::{SimHarness, SimPlatform, SimulatedUvd};
use uvd_driver::{
    ByteOrder, FirmwareDescriptor, FirmwareImage, FirmwareLayout, IpBlock, MappedRegion,
    RegisterDump, UvdConfig,
};

#[derive(Parser)]
#[command(name = "uvd", about = "UVD 6.0 video decode engine tools", version)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Run early_init → sw_init → hw_init → IB test → hw_fini → sw_fini
    /// against the simulated engine.
    Simulate {
        /// VCPU boot attempts that fail before the engine reports boot.
        #[arg(long, default_value_t = 0)]
        boot_failures: u32,
        /// The VCPU never boots.
        #[arg(long)]
        never_boot: bool,
        /// Poll budget in microseconds (overrides UVD_USEC_TIMEOUT).
        #[arg(long)]
        usec_timeout: Option<u32>,
        /// Program the big-endian swap configuration.
        #[arg(long)]
        big_endian: bool,
        /// Integrated GPU: skip platform suspend/resume.
        #[arg(long)]
        apu: bool,
        /// Ring size in bytes (power of two).
        #[arg(long)]
        ring_size: Option<u32>,
        /// Firmware image to size the cache window from.
        #[arg(long)]
        firmware: Option<PathBuf>,
        /// Run a suspend/resume cycle before tearing down.
        #[arg(long)]
        suspend_cycle: bool,
    },
    /// Map a register BAR and print the diagnostic dump.
    Dump {
        /// PCI resource file (e.g. /sys/bus/pci/devices/0000:01:00.0/resource5).
        resource: PathBuf,
    },
    /// Print the three VCPU cache windows for a firmware size.
    Layout {
        /// Firmware size in bytes (decimal or 0x-prefixed hex).
        #[arg(value_parser = parse_u64)]
        firmware_size: u64,
        /// Firmware buffer GPU base address.
        #[arg(long, default_value = "0", value_parser = parse_u64)]
        base: u64,
    },
}

fn parse_u64(s: &str) -> std::result::Result<u64, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid number '{s}': {e}"))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Cmd::Simulate {
            boot_failures,
            never_boot,
            usec_timeout,
            big_endian,
            apu,
            ring_size,
            firmware,
            suspend_cycle,
        } => {
            let mut config = UvdConfig::from_env()?;
            if let Some(usec) = usec_timeout {
                config = config.with_usec_timeout(usec);
            }
            if let Some(bytes) = ring_size {
                config = config.with_ring_size(bytes);
            }
            if big_endian {
                config = config.with_byte_order(ByteOrder::Big);
            }
            if apu {
                config = config.with_apu(true);
            }
            let hw = if never_boot {
                SimulatedUvd::never_booting()
            } else {
                SimulatedUvd::with_boot_failures(boot_failures)
            };
            let platform = sim_platform(firmware.as_deref())?;
            cmd_simulate(hw, platform, config, suspend_cycle)?;
        }
        Cmd::Dump { resource } => cmd_dump(&resource)?,
        Cmd::Layout {
            firmware_size,
            base,
        } => cmd_layout(firmware_size, base)?,
    }

    Ok(())
}

fn sim_platform(firmware: Option<&Path>) -> Result<SimPlatform> {
    let Some(path) = firmware else {
        return Ok(SimPlatform::new());
    };
    let data = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    if data.is_empty() {
        bail!("{} is empty", path.display());
    }
    Ok(SimPlatform::with_firmware(FirmwareImage::new(Bytes::from(data))))
}

fn cmd_simulate(
    hw: SimulatedUvd,
    platform: SimPlatform,
    config: UvdConfig,
    suspend_cycle: bool,
) -> Result<()> {
    let mut sim = SimHarness::with_parts(hw, platform, config)?;
    let dev = &mut sim.device;

    dev.early_init()?;
    dev.sw_init()?;
    if let Some(layout) = dev.firmware_layout() {
        println!("{layout}");
    }

    dev.hw_init().context("hw_init")?;
    println!("hw_init     ok   ({} VCPU release(s))", sim.hw.vcpu_releases());

    dev.test_indirect_buffer().context("IB test")?;
    println!("ib test     ok");

    if suspend_cycle {
        dev.suspend()?;
        dev.resume().context("resume")?;
        println!("suspend/resume ok");
    }

    println!();
    println!("{}", RegisterDump::capture(sim.hw.as_ref()));
    println!();

    dev.hw_fini()?;
    dev.sw_fini()?;
    info!("simulation finished");
    println!(
        "virtual time {:.3} s, platform calls {}",
        sim.clock.elapsed_us() as f64 / 1e6,
        sim.calls.ops().len()
    );
    Ok(())
}

fn cmd_dump(resource: &Path) -> Result<()> {
    let region = MappedRegion::open(resource)?;

    let needed = DUMP_ORDER
        .iter()
        .map(|&(_, reg)| reg as usize * 4 + 4)
        .max()
        .unwrap_or(0);
    if region.size() < needed {
        bail!(
            "{} maps {:#x} bytes, register dump needs {needed:#x}",
            resource.display(),
            region.size()
        );
    }

    println!("{}", RegisterDump::capture(&region));
    Ok(())
}

fn cmd_layout(firmware_size: u64, base: u64) -> Result<()> {
    let layout = FirmwareLayout::new(&FirmwareDescriptor {
        gpu_addr: base,
        size: firmware_size,
    })?;
    println!("{layout}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_decimal_and_hex() {
        assert_eq!(parse_u64("4096"), Ok(4096));
        assert_eq!(parse_u64("0x1000"), Ok(4096));
        assert!(parse_u64("12k").is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn simulate_round_trip() {
        cmd_simulate(
            SimulatedUvd::with_boot_failures(2),
            SimPlatform::new(),
            UvdConfig::default(),
            true,
        )
        .unwrap();
    }

    #[test]
    fn firmware_file_sizes_the_cache_window() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("uvd.bin");
        std::fs::write(&path, vec![0u8; 5000]).unwrap();

        let mut sim = SimHarness::with_parts(
            SimulatedUvd::new(),
            sim_platform(Some(&path)).unwrap(),
            UvdConfig::default(),
        )
        .unwrap();
        sim.device.early_init().unwrap();
        sim.device.sw_init().unwrap();
        let layout = sim.device.firmware_layout().unwrap();
        // align_up(5000 + 4, 4096)
        assert_eq!(layout.cache.size, 8192);
    }

    #[test]
    fn empty_firmware_file_is_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("empty.bin");
        std::fs::write(&path, b"").unwrap();
        assert!(sim_platform(Some(&path)).is_err());
        assert!(sim_platform(Some(&dir.path().join("missing.bin"))).is_err());
    }

    #[test]
    fn simulate_reports_boot_failure() {
        let err = cmd_simulate(
            SimulatedUvd::never_booting(),
            SimPlatform::new(),
            UvdConfig::default(),
            false,
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("not responding"));
    }
}
