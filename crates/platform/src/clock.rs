//! Clock descriptions and tick conversion.
//!
//! Clock *configuration* (PLL programming, frequency switching) belongs to
//! the platform layer outside this workspace. This module only carries the
//! numbers the data path needs: the tick rate of a clock, and how to turn
//! milliseconds or microseconds into ticks for deadlines.

/// One selectable frequency of a clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FreqEntry {
    /// Frequency in Hz.
    pub freq_hz: u32,
    /// Timer ticks per millisecond at this frequency.
    pub ticks_per_msec: u32,
}

impl FreqEntry {
    /// Entry whose tick rate equals its frequency.
    #[must_use]
    pub const fn new(freq_hz: u32) -> Self {
        Self {
            freq_hz,
            ticks_per_msec: freq_hz / 1000,
        }
    }
}

/// The active frequency of a clock, as used for deadline arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ClockInfo {
    /// Frequency in Hz.
    pub freq_hz: u32,
    /// Timer ticks per millisecond.
    pub ticks_per_msec: u32,
}

impl ClockInfo {
    /// Clock running at the given table entry.
    #[must_use]
    pub const fn from_entry(entry: FreqEntry) -> Self {
        Self {
            freq_hz: entry.freq_hz,
            ticks_per_msec: entry.ticks_per_msec,
        }
    }

    /// Convert milliseconds to ticks (saturating).
    #[must_use]
    pub fn ms_to_ticks(&self, ms: u64) -> u64 {
        u64::from(self.ticks_per_msec).saturating_mul(ms)
    }

    /// Convert microseconds to ticks (saturating, rounded down).
    #[must_use]
    pub fn us_to_ticks(&self, us: u64) -> u64 {
        self.ms_to_ticks(us) / 1000
    }
}

/// Index of the lowest table frequency that is `>= hz`.
///
/// Falls back to the last (highest) entry when `hz` exceeds every entry.
/// Returns `None` only for an empty table.
#[must_use]
pub fn nearest_freq_idx(table: &[FreqEntry], hz: u32) -> Option<usize> {
    table
        .iter()
        .position(|entry| hz <= entry.freq_hz)
        .or_else(|| table.len().checked_sub(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: [FreqEntry; 2] = [FreqEntry::new(120_000_000), FreqEntry::new(400_000_000)];

    #[test]
    fn ms_and_us_conversion() {
        let clk = ClockInfo::from_entry(FreqEntry::new(38_400_000));
        assert_eq!(clk.ms_to_ticks(1), 38_400);
        assert_eq!(clk.us_to_ticks(50), 1_920);
        assert_eq!(clk.us_to_ticks(1_000), clk.ms_to_ticks(1));
    }

    #[test]
    fn nearest_freq_picks_lowest_sufficient() {
        assert_eq!(nearest_freq_idx(&TABLE, 1), Some(0));
        assert_eq!(nearest_freq_idx(&TABLE, 120_000_000), Some(0));
        assert_eq!(nearest_freq_idx(&TABLE, 120_000_001), Some(1));
    }

    #[test]
    fn nearest_freq_saturates_to_max() {
        assert_eq!(nearest_freq_idx(&TABLE, u32::MAX), Some(1));
        assert_eq!(nearest_freq_idx(&[], 1), None);
    }
}
