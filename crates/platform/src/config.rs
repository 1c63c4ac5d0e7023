//! Platform configuration and constants
//!
//! This module defines the platform values used across the data path.
//! Drivers and the buffer layer should reference these constants (or a
//! validated [`PlatformConfig`]) rather than hardcoding values.
//!
//! ## Memory map (cAVS-class DSP)
//!
//! | Region            | Base          | Size    | Caps                  | Use case |
//! |-------------------|---------------|---------|-----------------------|----------|
//! | HP SRAM buffers   | `0xBE10_0000` | 448 KiB | RAM, DMA, CACHE, HP   | Stage ring buffers |
//! | LP SRAM           | `0xBE80_0000` | 64 KiB  | RAM, LP               | Low-power pipelines |
//!
//! The buffer zone is cached; every hand-over between CPU and gateway DMA
//! therefore needs explicit cache maintenance (see [`crate::cache`]).

use crate::clock::{nearest_freq_idx, ClockInfo, FreqEntry};

// ── DMA constants ────────────────────────────────────────────────────────────

/// HD-Audio gateway buffer size and base alignment in bytes (DMA burst size).
pub const PLATFORM_HDA_BUFFER_ALIGNMENT: u32 = 0x80;

/// Host DMA handshake timeout in microseconds.
pub const PLATFORM_HOST_DMA_TIMEOUT_US: u32 = 50;

/// Number of channels in one HD-Audio gateway DMA controller.
pub const HDA_DMA_MAX_CHANS: usize = 9;

/// Size of one gateway channel's register block.
pub const HDA_CHAN_REG_SIZE: u32 = 0x40;

// ── Memory constants ─────────────────────────────────────────────────────────

/// Largest single ring-buffer allocation the buffer heap accepts.
pub const HEAP_BUFFER_SIZE: u32 = 0x5_0000;

/// Data-cache line size in bytes. DMA buffers must start and end on a line
/// so maintenance on one buffer never touches another.
pub const DCACHE_LINE_SIZE: u32 = 64;

// ── Clocks ───────────────────────────────────────────────────────────────────

/// Core frequency after boot.
pub const DEFAULT_CPU_FREQ: FreqEntry = FreqEntry::new(400_000_000);

/// Selectable DSP core frequencies, ascending.
pub const CPU_FREQ_TABLE: [FreqEntry; 2] = [FreqEntry::new(120_000_000), DEFAULT_CPU_FREQ];

/// Platform wall clock (the timer deadlines are measured against).
pub const WALL_CLOCK: FreqEntry = FreqEntry::new(38_400_000);

// ── Runtime configuration ────────────────────────────────────────────────────

/// Error returned by [`PlatformConfig::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// DMA alignment is zero, not a power of two, or not a whole number of
    /// cache lines.
    BadAlignment,
    /// Handshake timeout of zero would fail every blocking copy.
    ZeroTimeout,
    /// Channel count is zero or exceeds [`HDA_DMA_MAX_CHANS`].
    BadChannelCount,
    /// The clock ticks slower than once per millisecond.
    BadClock,
    /// [`HEAP_BUFFER_SIZE`] is not a multiple of the DMA alignment.
    BadBufferLimit,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let msg = match self {
            Self::BadAlignment => "DMA alignment must be a power of two of whole cache lines",
            Self::ZeroTimeout => "host DMA timeout must be non-zero",
            Self::BadChannelCount => "DMA channel count out of range",
            Self::BadClock => "clock must tick at least once per millisecond",
            Self::BadBufferLimit => "buffer limit must be a multiple of the DMA alignment",
        };
        f.write_str(msg)
    }
}

/// Platform values consumed by the DMA engine, buffers and scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PlatformConfig {
    /// Gateway buffer alignment in bytes.
    pub hda_buffer_alignment: u32,
    /// Host DMA handshake timeout in microseconds.
    pub host_dma_timeout_us: u32,
    /// Channels per gateway DMA controller.
    pub dma_max_channels: usize,
    /// Clock used for deadline arithmetic.
    pub default_clock: ClockInfo,
    /// Core clock; scheduler budgets count its cycles.
    pub cpu_clock: ClockInfo,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            hda_buffer_alignment: PLATFORM_HDA_BUFFER_ALIGNMENT,
            host_dma_timeout_us: PLATFORM_HOST_DMA_TIMEOUT_US,
            dma_max_channels: HDA_DMA_MAX_CHANS,
            default_clock: ClockInfo::from_entry(WALL_CLOCK),
            cpu_clock: ClockInfo::from_entry(DEFAULT_CPU_FREQ),
        }
    }
}

impl PlatformConfig {
    /// Check the configuration for values the drivers cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.hda_buffer_alignment.is_power_of_two()
            || self.hda_buffer_alignment.checked_rem(DCACHE_LINE_SIZE) != Some(0)
        {
            return Err(ConfigError::BadAlignment);
        }
        if self.host_dma_timeout_us == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.dma_max_channels == 0 || self.dma_max_channels > HDA_DMA_MAX_CHANS {
            return Err(ConfigError::BadChannelCount);
        }
        if self.default_clock.ticks_per_msec == 0 || self.cpu_clock.ticks_per_msec == 0 {
            return Err(ConfigError::BadClock);
        }
        if HEAP_BUFFER_SIZE.checked_rem(self.hda_buffer_alignment) != Some(0) {
            return Err(ConfigError::BadBufferLimit);
        }
        Ok(())
    }

    /// Same configuration with the core running at the lowest table
    /// frequency that is at least `hz`.
    #[must_use]
    pub fn with_cpu_freq(self, hz: u32) -> Self {
        let Some(entry) = nearest_freq_idx(&CPU_FREQ_TABLE, hz).and_then(|i| CPU_FREQ_TABLE.get(i).copied()) else {
            return self;
        };
        Self {
            cpu_clock: ClockInfo::from_entry(entry),
            ..self
        }
    }

    /// Host DMA handshake deadline length in timer ticks.
    #[must_use]
    pub fn host_dma_timeout_ticks(&self) -> u64 {
        self.default_clock.us_to_ticks(u64::from(self.host_dma_timeout_us))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(PlatformConfig::default().validate(), Ok(()));
    }

    #[test]
    fn timeout_ticks_follow_wall_clock() {
        // 38.4 MHz wall clock, 50 us timeout.
        assert_eq!(PlatformConfig::default().host_dma_timeout_ticks(), 1_920);
    }

    #[test]
    fn rejects_non_power_of_two_alignment() {
        let cfg = PlatformConfig {
            hda_buffer_alignment: 96,
            ..PlatformConfig::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::BadAlignment));
    }

    #[test]
    fn rejects_channel_count_over_hardware_limit() {
        let cfg = PlatformConfig {
            dma_max_channels: HDA_DMA_MAX_CHANS + 1,
            ..PlatformConfig::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::BadChannelCount));
    }

    #[test]
    fn rejects_alignment_below_a_cache_line() {
        let cfg = PlatformConfig {
            hda_buffer_alignment: 32,
            ..PlatformConfig::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::BadAlignment));
    }

    #[test]
    fn cpu_freq_rounds_up_to_table() {
        let cfg = PlatformConfig::default().with_cpu_freq(100_000_000);
        assert_eq!(cfg.cpu_clock.freq_hz, 120_000_000);
        let cfg = cfg.with_cpu_freq(u32::MAX);
        assert_eq!(cfg.cpu_clock, ClockInfo::from_entry(DEFAULT_CPU_FREQ));
        assert_eq!(cfg.validate(), Ok(()));
    }

    #[test]
    fn rejects_zero_timeout() {
        let cfg = PlatformConfig {
            host_dma_timeout_us: 0,
            ..PlatformConfig::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroTimeout));
    }
}
