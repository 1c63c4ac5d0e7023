//! Runtime power-management hooks.
//!
//! Drivers tell the power layer when a hardware block may drop into a
//! low-power state. Policy lives outside this workspace.

/// Power-management contexts a driver can reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PmContext {
    /// Host DMA link power state L1. A `put` allows the link to exit the
    /// forced-active state once the current transfer is handed over.
    HostDmaL1,
    /// DSP core clock gating.
    CoreClockGating,
}

/// Power runtime interface.
pub trait PmRuntime {
    /// Take a reference on `context`, keeping the hardware out of low power.
    fn get(&self, context: PmContext, index: u32);

    /// Drop a reference on `context`.
    fn put(&self, context: PmContext, index: u32);
}

/// Power runtime that ignores every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPm;

impl PmRuntime for NoPm {
    fn get(&self, _context: PmContext, _index: u32) {}

    fn put(&self, _context: PmContext, _index: u32) {}
}
