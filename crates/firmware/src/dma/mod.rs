//! Gateway DMA
//!
//! A DMA controller exposes a pool of channels. Every channel is acquired
//! with [`DmaOps::channel_get`], programmed once with [`DmaOps::set_config`],
//! then started and driven one period at a time with [`DmaOps::copy`].
//!
//! ```text
//!  Idle ──get──► Ready ──set_config──► Configured ──start──► Active
//!   ▲                                      ▲  ◄────stop────── │ ▲
//!   └──────────────put─────────────────────┘           pause  │ │ resume
//!                                                             ▼ │
//!                                                            Paused
//! ```
//!
//! The only implementation in this workspace is the HD-Audio gateway
//! ([`hda::HdaDma`]); the trait is the seam between gateway stages and the
//! controller so stages can be tested against a different engine.

pub mod hda;
pub mod regs;
pub mod trace;

use bitflags::bitflags;
use pipeline::CompError;

pub use hda::{GatewayKind, HdaDma};
pub use trace::{PtrSnapshot, PtrTrace};

/// Direction of a DMA transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DmaDirection {
    /// Host memory to local memory (host playback gateway).
    HmemToLmem,
    /// Local memory to host memory (host capture gateway).
    LmemToHmem,
    /// Local memory to a link device (link playback gateway).
    MemToDev,
    /// Link device to local memory (link capture gateway).
    DevToMem,
}

impl DmaDirection {
    /// `true` for the two host-side directions.
    pub fn is_host(self) -> bool {
        matches!(self, Self::HmemToLmem | Self::LmemToHmem)
    }

    /// `true` for the two link-side directions.
    pub fn is_link(self) -> bool {
        !self.is_host()
    }

    /// `true` when data lands in local memory.
    pub fn is_input(self) -> bool {
        matches!(self, Self::HmemToLmem | Self::DevToMem)
    }
}

/// One scatter-gather element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SgElem {
    /// Source address.
    pub src: u32,
    /// Destination address.
    pub dest: u32,
    /// Bytes in this element (one period).
    pub size: u32,
}

/// Channel configuration handed to [`DmaOps::set_config`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SgConfig<'e> {
    /// Transfer direction.
    pub direction: DmaDirection,
    /// Source sample container width in bytes.
    pub src_width: u32,
    /// Destination sample container width in bytes.
    pub dest_width: u32,
    /// Ring (cyclic) transfer rather than one-shot.
    pub cyclic: bool,
    /// Channel is driven by the scheduler rather than by DMA interrupts.
    pub irq_disabled: bool,
    /// Periods of the local ring, in address order.
    pub elems: &'e [SgElem],
}

bitflags! {
    /// Modifiers for [`DmaOps::copy`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct CopyFlags: u32 {
        /// Only report whether the initial fill has completed.
        const PRELOAD  = 1 << 0;
        /// Busy-wait until the gateway has consumed / provided the data.
        const BLOCKING = 1 << 1;
    }
}

bitflags! {
    /// Events a [`DmaListener`] can subscribe to.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct DmaCbType: u32 {
        /// A copy was handed to the gateway.
        const COPY = 1 << 0;
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for CopyFlags {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "CopyFlags({=u32:#x})", self.bits());
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for DmaCbType {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "DmaCbType({=u32:#x})", self.bits());
    }
}

/// Receiver of channel events.
///
/// Called with interrupts possibly masked; implementations must not block
/// and must not call back into the same channel.
pub trait DmaListener {
    /// `bytes` were moved on `channel`.
    fn on_dma_event(&self, channel: usize, event: DmaCbType, bytes: u32);
}

/// Lifecycle state of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DmaChanState {
    /// Free in the pool.
    Idle,
    /// Acquired, not configured.
    Ready,
    /// Configured, not running.
    Configured,
    /// Running.
    Active,
    /// Suspended.
    Paused,
}

/// Snapshot returned by [`DmaOps::status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChanStatus {
    /// Channel state.
    pub state: DmaChanState,
    /// Gateway read position.
    pub r_pos: u32,
    /// Gateway write position.
    pub w_pos: u32,
    /// Platform timer at the time of the query.
    pub timestamp: u64,
}

/// Bytes the gateway can take or give without blocking.
///
/// Only one side is meaningful per direction; the other is zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DataSize {
    /// Bytes ready to be read from local memory (input directions).
    pub avail: u32,
    /// Bytes that can be written to local memory (output directions).
    pub free: u32,
}

/// Controller attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DmaAttribute {
    /// Required alignment of the local ring buffer.
    BufferAlignment,
    /// Required alignment of a single copy.
    CopyAlignment,
}

/// Errors returned by DMA operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DmaError {
    /// Bad channel index, malformed configuration, or an operation that
    /// is not valid in the channel's state.
    InvalidArgument,
    /// Channel or controller is in use.
    Busy,
    /// No idle channel left.
    NoChannel,
    /// The gateway did not reach the expected fill level in time.
    Timeout,
    /// Preload has not completed yet.
    NoData,
}

impl core::fmt::Display for DmaError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let msg = match self {
            Self::InvalidArgument => "invalid argument",
            Self::Busy => "busy",
            Self::NoChannel => "no free channel",
            Self::Timeout => "gateway timed out",
            Self::NoData => "no data yet",
        };
        f.write_str(msg)
    }
}

impl From<DmaError> for CompError {
    fn from(err: DmaError) -> Self {
        match err {
            DmaError::InvalidArgument => Self::InvalidArgument,
            DmaError::Busy => Self::Busy,
            DmaError::NoChannel => Self::NoResource,
            DmaError::Timeout => Self::Timeout,
            DmaError::NoData => Self::NoData,
        }
    }
}

/// Operations of a gateway DMA controller.
///
/// All methods take `&self`; implementations serialise access to their
/// channel table internally.
pub trait DmaOps<'a> {
    /// Controller id.
    fn id(&self) -> u32;

    /// Bring the controller up.
    fn probe(&self) -> Result<(), DmaError>;

    /// Shut the controller down.
    fn remove(&self) -> Result<(), DmaError>;

    /// Acquire channel `index`.
    fn channel_get(&self, index: usize) -> Result<usize, DmaError>;

    /// Acquire the first idle channel.
    fn acquire(&self) -> Result<usize, DmaError>;

    /// Return `channel` to the pool.
    fn channel_put(&self, channel: usize) -> Result<(), DmaError>;

    /// Program `channel` from `config`.
    fn set_config(&self, channel: usize, config: &SgConfig<'_>) -> Result<(), DmaError>;

    /// Register `listener` for the events in `mask`; `None` clears it.
    fn set_callback(
        &self,
        channel: usize,
        mask: DmaCbType,
        listener: Option<&'a dyn DmaListener>,
    ) -> Result<(), DmaError>;

    /// Enable the gateway.
    fn start(&self, channel: usize) -> Result<(), DmaError>;

    /// Disable the gateway.
    fn stop(&self, channel: usize) -> Result<(), DmaError>;

    /// Suspend a running channel.
    fn pause(&self, channel: usize) -> Result<(), DmaError>;

    /// Resume a paused channel.
    fn resume(&self, channel: usize) -> Result<(), DmaError>;

    /// Mark the channel as resuming after a pause; consumed by the next
    /// enable.
    fn release(&self, channel: usize) -> Result<(), DmaError>;

    /// Hand `bytes` to the gateway.
    fn copy(&self, channel: usize, bytes: u32, flags: CopyFlags) -> Result<(), DmaError>;

    /// Channel state and gateway positions.
    fn status(&self, channel: usize) -> Result<ChanStatus, DmaError>;

    /// Fill level of the local ring as seen by the gateway.
    fn get_data_size(&self, channel: usize) -> Result<DataSize, DmaError>;

    /// Controller attribute.
    fn get_attribute(&self, attr: DmaAttribute) -> Result<u32, DmaError>;

    /// Save register context before power gating.
    fn pm_context_store(&self) -> Result<(), DmaError>;

    /// Restore register context after power gating.
    fn pm_context_restore(&self) -> Result<(), DmaError>;

    /// Number of acquired channels.
    fn busy_channels(&self) -> usize;
}
