//! Capability-classed buffer memory.
//!
//! Ring buffers request a byte region together with the capabilities the
//! memory must have (DMA reachable, cached, low power, ...). A
//! [`CapabilityHeap`] serves one zone with one capability set using a
//! first-fit allocator; a request whose capabilities the zone lacks is
//! refused rather than silently satisfied from unsuitable memory.
//!
//! Regions are plain `(addr, size)` pairs in the DSP address space. Nothing
//! here dereferences them.

use core::cell::RefCell;

use bitflags::bitflags;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;

bitflags! {
    /// Memory capability classes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MemCaps: u32 {
        /// General purpose RAM.
        const RAM   = 1 << 0;
        /// Read-only memory.
        const ROM   = 1 << 1;
        /// External memory.
        const EXT   = 1 << 2;
        /// Low-power memory.
        const LP    = 1 << 3;
        /// High-performance memory.
        const HP    = 1 << 4;
        /// Reachable by DMA engines.
        const DMA   = 1 << 5;
        /// Accessed through the data cache.
        const CACHE = 1 << 6;
        /// Executable.
        const EXEC  = 1 << 7;
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for MemCaps {
    fn format(&self, f: defmt::Formatter<'_>) {
        defmt::write!(f, "MemCaps({=u32:#x})", self.bits());
    }
}

/// A contiguous byte range `[addr, addr + size)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Region {
    /// First byte.
    pub addr: u32,
    /// Length in bytes.
    pub size: u32,
}

impl Region {
    /// One past the last byte.
    #[must_use]
    pub fn end(&self) -> u32 {
        self.addr.saturating_add(self.size)
    }

    /// `true` when `addr` lies inside the region.
    #[must_use]
    pub fn contains(&self, addr: u32) -> bool {
        addr >= self.addr && addr < self.end()
    }

    /// `true` when the two regions share at least one byte.
    #[must_use]
    pub fn overlaps(&self, other: &Region) -> bool {
        self.addr < other.end() && other.addr < self.end()
    }
}

/// Errors returned by a [`RegionAllocator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HeapError {
    /// Zero-byte request.
    ZeroSize,
    /// The zone does not provide the requested capabilities.
    UnsupportedCaps,
    /// No free range large enough, or the block table is full.
    NoMemory,
    /// The region was not allocated from this heap.
    UnknownRegion,
}

impl core::fmt::Display for HeapError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let msg = match self {
            Self::ZeroSize => "zero-byte allocation",
            Self::UnsupportedCaps => "zone lacks requested capabilities",
            Self::NoMemory => "out of memory",
            Self::UnknownRegion => "region not owned by this heap",
        };
        f.write_str(msg)
    }
}

/// Request / release of capability-classed regions.
pub trait RegionAllocator {
    /// Allocate `size` bytes with at least `caps`.
    fn alloc(&self, caps: MemCaps, size: u32) -> Result<Region, HeapError>;

    /// Replace `old` by a region of `size` bytes.
    ///
    /// On failure `old` stays allocated and untouched.
    fn realloc(&self, old: Region, caps: MemCaps, size: u32) -> Result<Region, HeapError>;

    /// Return `region` to the heap.
    fn free(&self, region: Region) -> Result<(), HeapError>;
}

/// First-fit allocator over one memory zone.
///
/// `N` bounds the number of live allocations. Allocation bookkeeping runs
/// inside a critical section so buffers may be created from any context.
pub struct CapabilityHeap<const N: usize> {
    zone: Region,
    caps: MemCaps,
    align: u32,
    blocks: Mutex<CriticalSectionRawMutex, RefCell<heapless::Vec<Region, N>>>,
}

impl<const N: usize> CapabilityHeap<N> {
    /// Heap over `zone` providing `caps`; every allocation starts on an
    /// `align`-byte boundary (`align` must be a power of two).
    #[must_use]
    pub const fn new(zone: Region, caps: MemCaps, align: u32) -> Self {
        Self {
            zone,
            caps,
            align,
            blocks: Mutex::new(RefCell::new(heapless::Vec::new())),
        }
    }

    /// Capabilities of the zone.
    pub fn caps(&self) -> MemCaps {
        self.caps
    }

    /// Number of live allocations.
    pub fn live_blocks(&self) -> usize {
        self.blocks.lock(|b| b.borrow().len())
    }

    /// Bytes currently allocated.
    pub fn used_bytes(&self) -> u32 {
        self.blocks
            .lock(|b| b.borrow().iter().fold(0u32, |acc, r| acc.saturating_add(r.size)))
    }

    fn align_up(&self, addr: u32) -> Option<u32> {
        let mask = self.align.checked_sub(1)?;
        addr.checked_add(mask).map(|a| a & !mask)
    }

    /// Find the first gap of `size` bytes; returns the address and the index
    /// at which the block keeps the table sorted.
    fn find_gap(&self, blocks: &[Region], size: u32) -> Option<(u32, usize)> {
        let mut cursor = self.zone.addr;
        for (idx, block) in blocks.iter().enumerate() {
            let start = self.align_up(cursor)?;
            if start.checked_add(size)? <= block.addr {
                return Some((start, idx));
            }
            cursor = block.end();
        }
        let start = self.align_up(cursor)?;
        (start.checked_add(size)? <= self.zone.end()).then_some((start, blocks.len()))
    }

    fn check_request(&self, caps: MemCaps, size: u32) -> Result<(), HeapError> {
        if size == 0 {
            return Err(HeapError::ZeroSize);
        }
        if !self.caps.contains(caps) {
            return Err(HeapError::UnsupportedCaps);
        }
        Ok(())
    }
}

impl<const N: usize> RegionAllocator for CapabilityHeap<N> {
    fn alloc(&self, caps: MemCaps, size: u32) -> Result<Region, HeapError> {
        self.check_request(caps, size)?;
        self.blocks.lock(|cell| {
            let mut blocks = cell.borrow_mut();
            if blocks.is_full() {
                return Err(HeapError::NoMemory);
            }
            let Some((addr, idx)) = self.find_gap(&blocks, size) else {
                warn!("heap: no free range for {} bytes", size);
                return Err(HeapError::NoMemory);
            };
            let region = Region { addr, size };
            blocks.insert(idx, region).map_err(|_| HeapError::NoMemory)?;
            Ok(region)
        })
    }

    fn realloc(&self, old: Region, caps: MemCaps, size: u32) -> Result<Region, HeapError> {
        self.check_request(caps, size)?;
        self.blocks.lock(|cell| {
            let mut blocks = cell.borrow_mut();
            let old_idx = blocks
                .iter()
                .position(|r| *r == old)
                .ok_or(HeapError::UnknownRegion)?;

            // Search with the old block removed so it may grow in place,
            // then restore it if nothing fits.
            let removed = blocks.remove(old_idx);
            match self.find_gap(&blocks, size) {
                Some((addr, idx)) => {
                    let region = Region { addr, size };
                    blocks.insert(idx, region).map_err(|_| HeapError::NoMemory)?;
                    Ok(region)
                }
                None => {
                    blocks.insert(old_idx, removed).map_err(|_| HeapError::NoMemory)?;
                    Err(HeapError::NoMemory)
                }
            }
        })
    }

    fn free(&self, region: Region) -> Result<(), HeapError> {
        self.blocks.lock(|cell| {
            let mut blocks = cell.borrow_mut();
            let idx = blocks
                .iter()
                .position(|r| *r == region)
                .ok_or(HeapError::UnknownRegion)?;
            blocks.remove(idx);
            Ok(())
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn heap() -> CapabilityHeap<8> {
        CapabilityHeap::new(
            Region {
                addr: 0x1000,
                size: 0x1000,
            },
            MemCaps::RAM | MemCaps::DMA | MemCaps::CACHE,
            64,
        )
    }

    #[test]
    fn first_fit_reuses_freed_gap() {
        let h = heap();
        let a = h.alloc(MemCaps::RAM, 0x100).unwrap();
        let b = h.alloc(MemCaps::RAM, 0x100).unwrap();
        assert_eq!(a.addr, 0x1000);
        assert_eq!(b.addr, 0x1100);
        h.free(a).unwrap();
        let c = h.alloc(MemCaps::DMA, 0x80).unwrap();
        assert_eq!(c.addr, 0x1000);
        assert_eq!(h.live_blocks(), 2);
    }

    #[test]
    fn allocations_are_aligned() {
        let h = heap();
        let a = h.alloc(MemCaps::RAM, 10).unwrap();
        let b = h.alloc(MemCaps::RAM, 10).unwrap();
        assert_eq!(b.addr % 64, 0);
        assert!(!a.overlaps(&b));
    }

    #[test]
    fn refuses_missing_caps() {
        let h = heap();
        assert_eq!(h.alloc(MemCaps::LP, 16), Err(HeapError::UnsupportedCaps));
    }

    #[test]
    fn refuses_zero_and_oversize() {
        let h = heap();
        assert_eq!(h.alloc(MemCaps::RAM, 0), Err(HeapError::ZeroSize));
        assert_eq!(h.alloc(MemCaps::RAM, 0x1001), Err(HeapError::NoMemory));
    }

    #[test]
    fn realloc_failure_keeps_old_region() {
        let h = heap();
        let a = h.alloc(MemCaps::RAM, 0x800).unwrap();
        assert_eq!(h.realloc(a, MemCaps::RAM, 0x2000), Err(HeapError::NoMemory));
        assert_eq!(h.live_blocks(), 1);
        assert_eq!(h.used_bytes(), 0x800);
        h.free(a).unwrap();
    }

    #[test]
    fn realloc_can_grow_in_place() {
        let h = heap();
        let a = h.alloc(MemCaps::RAM, 0x400).unwrap();
        let b = h.realloc(a, MemCaps::RAM, 0x800).unwrap();
        assert_eq!(b.addr, a.addr);
        assert_eq!(b.size, 0x800);
        assert_eq!(h.free(a), Err(HeapError::UnknownRegion));
        h.free(b).unwrap();
    }
}
