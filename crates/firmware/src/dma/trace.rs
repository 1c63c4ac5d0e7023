//! Gateway pointer trace.
//!
//! The first [`PTR_TRACE_DEPTH`] copies after a channel is started are
//! logged with the gateway pointers sampled before and after the copy. That
//! is usually enough to see whether a stream came up in step with the
//! gateway without flooding the log for the rest of the stream.

use platform::RegisterIo;

use super::regs::{Dgcs, DGBRP, DGBWP, DGCS};

/// Copies traced after each start.
pub const PTR_TRACE_DEPTH: u32 = 32;

/// Gateway pointers at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PtrSnapshot {
    /// DGBWP.
    pub wp: u32,
    /// DGBRP.
    pub rp: u32,
    /// DGCS.BNE.
    pub bne: bool,
}

impl PtrSnapshot {
    /// Sample the pointers of the channel whose registers start at `chan_base`.
    pub fn sample(regs: &dyn RegisterIo, chan_base: u32) -> Self {
        Self {
            wp: regs.read(chan_base.wrapping_add(DGBWP)),
            rp: regs.read(chan_base.wrapping_add(DGBRP)),
            bne: Dgcs::from_bits_retain(regs.read(chan_base.wrapping_add(DGCS))).contains(Dgcs::BNE),
        }
    }
}

/// Per-channel trace state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PtrTrace {
    count: u32,
    last: Option<(PtrSnapshot, PtrSnapshot)>,
}

impl PtrTrace {
    /// Fresh, armed trace.
    pub const fn new() -> Self {
        Self { count: 0, last: None }
    }

    /// `true` while the next copy should still be traced.
    pub fn armed(&self) -> bool {
        self.count < PTR_TRACE_DEPTH
    }

    /// Start over after the channel was (re)started.
    pub fn rearm(&mut self) {
        self.count = 0;
    }

    /// Copies traced since the last start.
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Pointers around the most recent traced copy.
    pub fn last(&self) -> Option<(PtrSnapshot, PtrSnapshot)> {
        self.last
    }

    /// Record one traced copy.
    pub fn record(&mut self, dma_id: u32, channel: usize, pre: PtrSnapshot, post: PtrSnapshot) {
        if !self.armed() {
            return;
        }
        self.count = self.count.saturating_add(1);
        self.last = Some((pre, post));
        debug!(
            "hda-dma {} ch {}: wp {} -> {}, rp {} -> {}, bne {} -> {}",
            dma_id, channel, pre.wp, post.wp, pre.rp, post.rp, pre.bne, post.bne
        );
    }
}
