//! Memory-mapped register access.
//!
//! Drivers never dereference register addresses directly; they go through
//! [`RegisterIo`] so the same driver code runs against real MMIO on the DSP
//! and against [`crate::mocks::MockRegisters`] on the host.

/// 32-bit register access.
pub trait RegisterIo {
    /// Read the register at `addr`.
    fn read(&self, addr: u32) -> u32;

    /// Write `value` to the register at `addr`.
    fn write(&self, addr: u32, value: u32);

    /// Read-modify-write: replace the bits selected by `mask` with `value`.
    fn update_bits(&self, addr: u32, mask: u32, value: u32) {
        let old = self.read(addr);
        self.write(addr, (old & !mask) | (value & mask));
    }
}

/// Volatile MMIO access to the physical register space.
#[derive(Debug)]
pub struct MmioRegisters {
    _private: (),
}

impl MmioRegisters {
    /// Create a handle to the physical register space.
    ///
    /// # Safety
    ///
    /// Every address later passed to [`RegisterIo::read`] / [`RegisterIo::write`]
    /// must be a valid, 4-byte aligned device register for the running
    /// platform. Accesses are not bounds-checked.
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl RegisterIo for MmioRegisters {
    fn read(&self, addr: u32) -> u32 {
        // SAFETY: the constructor contract guarantees `addr` is a mapped,
        // aligned device register.
        unsafe { core::ptr::read_volatile(addr as usize as *const u32) }
    }

    fn write(&self, addr: u32, value: u32) {
        // SAFETY: the constructor contract guarantees `addr` is a mapped,
        // aligned device register.
        unsafe { core::ptr::write_volatile(addr as usize as *mut u32, value) }
    }
}
