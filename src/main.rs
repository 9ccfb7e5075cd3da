use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use pal64::backend::{fb_minifb::Minifb, noninteractive::Noninteractive};
use pal64::c64::C64;
use pal64::clock::{Config, Cycler, PAL_CPU_HZ};
use pal64::mem;
use pal64::peripheral::Peripherals;
use pal64::utils::R2C;
use std::cell::RefCell;
use std::rc::Rc;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(name = "pal64", about = "PAL Commodore 64 emulator (text mode)")]
struct Opt {
    /// Directory containing the stock ROM dumps basic.901226-01.bin,
    /// kernal.901227-03.bin and characters.901225-01.bin
    #[structopt(long, parse(from_os_str), default_value = "roms")]
    rom_dir: PathBuf,

    /// Run headless (no window, keyboard matrix idle)
    #[structopt(long)]
    no_gui: bool,

    /// Stop after emulating this many clock cycles
    #[structopt(long)]
    exit_after_cycles: Option<u64>,

    /// Run as fast as the host allows instead of pacing to PAL speed
    #[structopt(long)]
    disable_clock_freq_limit: bool,

    /// Window scale factor (1, 2 or 4)
    #[structopt(long, default_value = "2")]
    scale: usize,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let opt = Opt::from_args();

    let peripherals: R2C<dyn Peripherals> = if opt.no_gui {
        Rc::new(RefCell::new(Noninteractive::new()))
    } else {
        Rc::new(RefCell::new(Minifb::new(opt.scale)))
    };

    let mut c64 = C64::new(peripherals);
    c64.load_stock_roms(&opt.rom_dir)
        .with_context(|| format!("loading ROM images from {}", opt.rom_dir.display()))?;
    c64.bus.borrow_mut().write(mem::CPU_PORT, 0x07);
    c64.reset();

    let mut cycler = Cycler::new(Config {
        guest_core_cps_hz: if opt.disable_clock_freq_limit { f64::INFINITY } else { PAL_CPU_HZ },
        report_interval: if opt.disable_clock_freq_limit { None } else { Some(Duration::from_secs(5)) },
    });

    let mut last_report = pal64::clock::Report::default();
    loop {
        if cycler.is_paused() {
            spin_sleep::sleep(Duration::from_millis(10));
            continue;
        }

        c64.step_line();

        if let Some(report) = cycler.cycle(c64.cycles()) {
            if let Some(delta) = report.delta(&last_report) {
                if delta.slow_cycles > 0 {
                    log::info!("emulation behind wall clock for {} lines", delta.slow_cycles);
                }
            }
            last_report = report;
        }

        if let Some(limit) = opt.exit_after_cycles {
            if c64.cycles() >= limit {
                log::info!("exiting after {} cycles", c64.cycles());
                break;
            }
        }
    }

    Ok(())
}
