//! Mock implementations for testing
//!
//! This module provides mock implementations of the platform traits
//! for use in unit and integration tests.

#![cfg(any(test, feature = "std"))]

use core::cell::{Cell, RefCell};

use crate::cache::{line_align, DcacheOps};
use crate::io::RegisterIo;
use crate::pm::{PmContext, PmRuntime};
use crate::timer::{CycleCounter, PlatformTimer};

// ── Registers ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct ReadScript {
    addr: u32,
    bits: u32,
    remaining: u32,
}

/// Mock register file
///
/// Unwritten registers read as zero. Every write is logged so tests can
/// assert on the exact register traffic a driver produced.
#[derive(Debug, Default)]
pub struct MockRegisters {
    values: RefCell<heapless::LinearMap<u32, u32, 256>>,
    writes: RefCell<heapless::Vec<(u32, u32), 512>>,
    scripts: RefCell<heapless::Vec<ReadScript, 16>>,
    w1c: RefCell<heapless::LinearMap<u32, u32, 16>>,
}

impl MockRegisters {
    /// Create an all-zero register file
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a register without logging a write
    pub fn poke(&self, addr: u32, value: u32) {
        let _ = self.values.borrow_mut().insert(addr, value);
    }

    /// Current value of a register
    pub fn peek(&self, addr: u32) -> u32 {
        self.values.borrow().get(&addr).copied().unwrap_or(0)
    }

    /// Set `bits` in `addr` once it has been read `reads` more times
    ///
    /// Models hardware that raises a status bit after some latency.
    pub fn set_after_reads(&self, addr: u32, bits: u32, reads: u32) {
        let _ = self.scripts.borrow_mut().push(ReadScript {
            addr,
            bits,
            remaining: reads,
        });
    }

    /// Mark `mask` bits of `addr` as write-one-to-clear
    pub fn set_w1c(&self, addr: u32, mask: u32) {
        let _ = self.w1c.borrow_mut().insert(addr, mask);
    }

    /// All logged writes, oldest first
    pub fn writes(&self) -> heapless::Vec<(u32, u32), 512> {
        self.writes.borrow().clone()
    }

    /// Values written to one register, oldest first
    pub fn writes_to(&self, addr: u32) -> heapless::Vec<u32, 64> {
        self.writes
            .borrow()
            .iter()
            .filter(|(a, _)| *a == addr)
            .map(|(_, v)| *v)
            .take(64)
            .collect()
    }

    /// Forget logged writes
    pub fn clear_writes(&self) {
        self.writes.borrow_mut().clear();
    }

    fn run_scripts(&self, addr: u32) {
        let mut fire = 0u32;
        let mut scripts = self.scripts.borrow_mut();
        scripts.retain_mut(|s| {
            if s.addr != addr {
                return true;
            }
            if s.remaining == 0 {
                fire |= s.bits;
                return false;
            }
            s.remaining = s.remaining.saturating_sub(1);
            true
        });
        drop(scripts);
        if fire != 0 {
            let old = self.peek(addr);
            self.poke(addr, old | fire);
        }
    }
}

impl RegisterIo for MockRegisters {
    fn read(&self, addr: u32) -> u32 {
        self.run_scripts(addr);
        self.peek(addr)
    }

    fn write(&self, addr: u32, value: u32) {
        let _ = self.writes.borrow_mut().push((addr, value));
        let mask = self.w1c.borrow().get(&addr).copied().unwrap_or(0);
        let old = self.peek(addr);
        let stored = (value & !mask) | (old & mask & !value);
        self.poke(addr, stored);
    }
}

// ── Cache ────────────────────────────────────────────────────────────────────

/// One recorded cache maintenance call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOp {
    /// `invalidate_region(addr, len)`
    Invalidate {
        /// Start address
        addr: u32,
        /// Length in bytes
        len: u32,
    },
    /// `writeback_region(addr, len)`
    WriteBack {
        /// Start address
        addr: u32,
        /// Length in bytes
        len: u32,
    },
}

/// Mock data cache recording every maintenance call
///
/// Ranges are recorded after rounding out to the recorder's line size, so a
/// recorder built with [`RecordingCache::with_line`] shows exactly the lines
/// a real cache would touch.
#[derive(Debug)]
pub struct RecordingCache {
    line: u32,
    ops: RefCell<heapless::Vec<CacheOp, 64>>,
}

impl Default for RecordingCache {
    fn default() -> Self {
        Self::with_line(1)
    }
}

impl RecordingCache {
    /// Create an empty recorder keeping byte-exact ranges
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty recorder with `line`-byte cache lines (a power of two)
    pub fn with_line(line: u32) -> Self {
        Self {
            line,
            ops: RefCell::new(heapless::Vec::new()),
        }
    }

    /// Recorded operations, oldest first
    pub fn ops(&self) -> heapless::Vec<CacheOp, 64> {
        self.ops.borrow().clone()
    }

    /// Forget recorded operations
    pub fn clear(&self) {
        self.ops.borrow_mut().clear();
    }
}

impl DcacheOps for RecordingCache {
    fn invalidate_region(&self, addr: u32, len: u32) {
        let (addr, len) = line_align(addr, len, self.line);
        let _ = self.ops.borrow_mut().push(CacheOp::Invalidate { addr, len });
    }

    fn writeback_region(&self, addr: u32, len: u32) {
        let (addr, len) = line_align(addr, len, self.line);
        let _ = self.ops.borrow_mut().push(CacheOp::WriteBack { addr, len });
    }
}

// ── Time ─────────────────────────────────────────────────────────────────────

/// Mock timer that advances by a fixed step on every read
///
/// A blocking wait polling this timer terminates after a bounded number of
/// polls without any real time passing.
#[derive(Debug)]
pub struct SteppingTimer {
    now: Cell<u64>,
    step: u64,
}

impl SteppingTimer {
    /// Timer starting at `start`, advancing `step` ticks per read
    pub fn new(start: u64, step: u64) -> Self {
        Self {
            now: Cell::new(start),
            step,
        }
    }

    /// Jump the timer
    pub fn set(&self, now: u64) {
        self.now.set(now);
    }

    /// Current value without advancing
    pub fn peek(&self) -> u64 {
        self.now.get()
    }
}

impl PlatformTimer for SteppingTimer {
    fn now(&self) -> u64 {
        let now = self.now.get();
        self.now.set(now.saturating_add(self.step));
        now
    }
}

/// Mock cycle counter advanced explicitly by the test
#[derive(Debug, Default)]
pub struct MockCycleCounter {
    cycles: Cell<u64>,
}

impl MockCycleCounter {
    /// Counter starting at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Burn `n` cycles
    pub fn advance(&self, n: u64) {
        self.cycles.set(self.cycles.get().saturating_add(n));
    }
}

impl CycleCounter for MockCycleCounter {
    fn cycles(&self) -> u64 {
        self.cycles.get()
    }
}

// ── Power ────────────────────────────────────────────────────────────────────

/// Mock power runtime counting references
#[derive(Debug, Default)]
pub struct RecordingPm {
    gets: Cell<u32>,
    puts: Cell<u32>,
    last: Cell<Option<(PmContext, u32)>>,
}

impl RecordingPm {
    /// Create a zeroed recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `get` calls
    pub fn gets(&self) -> u32 {
        self.gets.get()
    }

    /// Number of `put` calls
    pub fn puts(&self) -> u32 {
        self.puts.get()
    }

    /// Context and index of the most recent call
    pub fn last(&self) -> Option<(PmContext, u32)> {
        self.last.get()
    }
}

impl PmRuntime for RecordingPm {
    fn get(&self, context: PmContext, index: u32) {
        self.gets.set(self.gets.get().saturating_add(1));
        self.last.set(Some((context, index)));
    }

    fn put(&self, context: PmContext, index: u32) {
        self.puts.set(self.puts.get().saturating_add(1));
        self.last.set(Some((context, index)));
    }
}
