//! Data-cache maintenance.
//!
//! The DSP core and the gateway DMA do not share a coherent view of memory.
//! Whoever hands a region from the CPU to DMA must write it back first, and
//! whoever hands a region from DMA to the CPU must invalidate it first.
//!
//! ```text
//! CPU writes ──► dcache ──writeback──► SRAM ──► DMA reads
//! DMA writes ──► SRAM ──invalidate──► dcache ──► CPU reads
//! ```

/// Data-cache maintenance on an address range.
///
/// Callers pass exact byte ranges. Implementations that maintain whole lines
/// round the range out with [`line_align`].
pub trait DcacheOps {
    /// Discard cached lines covering `[addr, addr + len)` so the next CPU
    /// read fetches what DMA wrote.
    fn invalidate_region(&self, addr: u32, len: u32);

    /// Flush dirty lines covering `[addr, addr + len)` so DMA observes what
    /// the CPU wrote.
    fn writeback_region(&self, addr: u32, len: u32);
}

/// Cache operations for memory mapped uncached or on coherent platforms.
#[derive(Debug, Clone, Copy, Default)]
pub struct CoherentCache;

impl DcacheOps for CoherentCache {
    fn invalidate_region(&self, _addr: u32, _len: u32) {}

    fn writeback_region(&self, _addr: u32, _len: u32) {}
}

/// Round `[addr, addr + len)` out to cache-line boundaries.
///
/// Returns `(aligned_addr, aligned_len)`. `line` must be a power of two.
#[must_use]
pub fn line_align(addr: u32, len: u32, line: u32) -> (u32, u32) {
    let mask = line.wrapping_sub(1);
    let start = addr & !mask;
    let end = addr.saturating_add(len).saturating_add(mask) & !mask;
    (start, end.saturating_sub(start))
}
