//! Platform wall clock and cycle counter.
//!
//! DMA handshake deadlines and scheduler deadlines are expressed in platform
//! timer ticks. Cycle budgets are expressed in core clock cycles.

use crate::config::PlatformConfig;

/// Monotonic platform timer.
pub trait PlatformTimer {
    /// Current timer value in ticks.
    fn now(&self) -> u64;
}

/// Per-core cycle counter used to charge scheduler budgets.
pub trait CycleCounter {
    /// Current count of core clock cycles.
    fn cycles(&self) -> u64;
}

/// [`PlatformTimer`] backed by the embassy time driver.
///
/// On hardware the embassy tick rate is configured to the platform wall clock
/// so one embassy tick equals one platform timer tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbassyTimer;

impl PlatformTimer for EmbassyTimer {
    fn now(&self) -> u64 {
        embassy_time::Instant::now().as_ticks()
    }
}

/// [`CycleCounter`] derived from the embassy time driver.
///
/// The embassy tick count is scaled from [`embassy_time::TICK_HZ`] to the
/// configured core clock, so budgets keep their unit on targets without a
/// readable cycle register.
#[derive(Debug, Clone, Copy)]
pub struct EmbassyCycleCounter {
    core_hz: u32,
}

impl EmbassyCycleCounter {
    /// Counter for a core running at `config.cpu_clock`.
    pub const fn new(config: &PlatformConfig) -> Self {
        Self {
            core_hz: config.cpu_clock.freq_hz,
        }
    }
}

impl CycleCounter for EmbassyCycleCounter {
    fn cycles(&self) -> u64 {
        ticks_to_cycles(embassy_time::Instant::now().as_ticks(), embassy_time::TICK_HZ, self.core_hz)
    }
}

/// Core cycles elapsed in `ticks` of a `tick_hz` timer (saturating).
///
/// Returns 0 for a zero `tick_hz`.
#[must_use]
pub fn ticks_to_cycles(ticks: u64, tick_hz: u64, core_hz: u32) -> u64 {
    let cycles = u128::from(ticks)
        .saturating_mul(u128::from(core_hz))
        .checked_div(u128::from(tick_hz))
        .unwrap_or(0);
    u64::try_from(cycles).unwrap_or(u64::MAX)
}
