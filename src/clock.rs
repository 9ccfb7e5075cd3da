//! Wall-clock pacing of the emulation loop.
//!
//! The run loop is the only free-running element; everything else is
//! stepped synchronously from it. `Cycler::cycle` sleeps whenever the
//! guest is ahead of real time and counts the iterations where it was
//! behind, reported at a configurable interval.

use std::time::{Duration, Instant};

/// PAL C64 dot clock divided down to the CPU: 63 cycles x 312 lines at
/// slightly above 50 frames per second.
pub const PAL_CPU_HZ: f64 = 985_248.0;

pub struct Config {
    pub guest_core_cps_hz: f64,
    pub report_interval: Option<Duration>,
}

#[derive(Debug, Default, Clone)]
pub struct Report {
    slow_cycles_total: u64,
}

#[derive(Debug)]
pub struct ReportDelta {
    pub slow_cycles: u64,
}

impl Report {
    pub fn delta(&self, other: &Report) -> Option<ReportDelta> {
        if self.slow_cycles_total < other.slow_cycles_total {
            None
        } else {
            Some(ReportDelta { slow_cycles: self.slow_cycles_total - other.slow_cycles_total })
        }
    }
}

pub struct Cycler {
    config: Config,

    paused: bool,

    last_report_at: Instant,
    next_report: Report,

    startup_at: Instant,
    startup_guest_cycles: u64,
}

impl Cycler {
    pub fn new(config: Config) -> Self {
        let now = Instant::now();
        Cycler {
            config,
            paused: false,
            last_report_at: now,
            next_report: Report::default(),
            startup_at: now,
            startup_guest_cycles: 0,
        }
    }

    /// Pause halts the whole emulator while preserving state; resuming
    /// re-anchors the pace so the guest does not fast-forward through the
    /// paused wall time.
    pub fn set_pause(&mut self, paused: bool, guest_cycles: u64) {
        if self.paused && !paused {
            self.reset_startup(guest_cycles);
        }
        self.paused = paused;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn cycle(&mut self, guest_cycles: u64) -> Option<Report> {
        let now = Instant::now();

        let guest_uptime = now - self.startup_at;
        let sleeptime = ((guest_cycles - self.startup_guest_cycles) as f64 / self.config.guest_core_cps_hz)
            - guest_uptime.as_secs_f64();
        let need_sleep = sleeptime > 0.0;
        if need_sleep {
            spin_sleep::sleep(Duration::from_secs_f64(sleeptime));
        } else {
            self.next_report.slow_cycles_total = self.next_report.slow_cycles_total.wrapping_add(1);
        }

        if let Some(report_interval) = self.config.report_interval {
            if now - self.last_report_at > report_interval {
                self.last_report_at = now;
                return Some(self.next_report.clone());
            }
            // fallthrough
        }
        None
    }

    pub fn reset_startup(&mut self, guest_cycles: u64) {
        self.startup_at = Instant::now();
        self.startup_guest_cycles = guest_cycles;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unthrottled_cycler_never_sleeps_long() {
        let mut cycler = Cycler::new(Config { guest_core_cps_hz: f64::INFINITY, report_interval: None });
        let before = Instant::now();
        for cycles in 0..1000 {
            assert!(cycler.cycle(cycles).is_none());
        }
        assert!(before.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn pause_resume_reanchors() {
        let mut cycler = Cycler::new(Config { guest_core_cps_hz: PAL_CPU_HZ, report_interval: None });
        cycler.set_pause(true, 0);
        assert!(cycler.is_paused());
        cycler.set_pause(false, 12345);
        assert!(!cycler.is_paused());
        assert_eq!(cycler.startup_guest_cycles, 12345);
    }
}
