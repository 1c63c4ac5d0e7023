//! HD-Audio gateway register map.
//!
//! Every channel owns a window of `HDA_CHAN_REG_SIZE` bytes starting at
//! `base + index * HDA_CHAN_REG_SIZE`. Offsets below are relative to that
//! window.

use bitflags::bitflags;

/// Gateway control and status.
pub const DGCS: u32 = 0x00;
/// Buffer base address.
pub const DGBBA: u32 = 0x04;
/// Buffer size.
pub const DGBS: u32 = 0x08;
/// Buffer fill pointer increment.
pub const DGBFPI: u32 = 0x0c;
/// Buffer read position.
pub const DGBRP: u32 = 0x10;
/// Buffer write position.
pub const DGBWP: u32 = 0x14;
/// Buffer segment pointer.
pub const DGBSP: u32 = 0x18;
/// Minimum buffer size.
pub const DGMBS: u32 = 0x1c;
/// Linear link position increment.
pub const DGLLPI: u32 = 0x24;
/// Linear position in buffer increment.
pub const DGLPIBI: u32 = 0x28;

/// Address bits the gateway keeps in DGBBA.
pub const DGBBA_MASK: u32 = 0x00ff_ff80;
/// Size bits the gateway keeps in DGBS.
pub const DGBS_MASK: u32 = 0x00ff_fff0;

bitflags! {
    /// DGCS bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Dgcs: u32 {
        /// Sample container size: set for 16-bit (or narrower) containers.
        const SCS     = 1 << 31;
        /// Gateway enable.
        const GEN     = 1 << 26;
        /// Function wake-up on buffer completion.
        const FWCB    = 1 << 23;
        /// Buffer segment completion.
        const BSC     = 1 << 11;
        /// Buffer overrun / underrun (write one to clear).
        const BOR     = 1 << 10;
        /// Buffer full.
        const BF      = 1 << 9;
        /// Buffer not empty.
        const BNE     = 1 << 8;
        /// FIFO ready.
        const FIFORDY = 1 << 5;
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Dgcs {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "Dgcs({=u32:#x})", self.bits());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dgcs_bit_positions() {
        assert_eq!(Dgcs::SCS.bits(), 0x8000_0000);
        assert_eq!(Dgcs::GEN.bits(), 0x0400_0000);
        assert_eq!(Dgcs::FWCB.bits(), 0x0080_0000);
        assert_eq!(Dgcs::BOR.bits(), 0x0400);
        assert_eq!(Dgcs::BF.bits(), 0x0200);
        assert_eq!(Dgcs::BNE.bits(), 0x0100);
        assert_eq!(Dgcs::FIFORDY.bits(), 0x0020);
    }
}
