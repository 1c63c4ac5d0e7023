//! Stage interface.
//!
//! A stage ("component device") is one node of a processing pipeline. It
//! reads from at most one source buffer and writes to at most one sink
//! buffer. The scheduler only ever calls [`Component::copy`]; the other
//! operations are driven by the pipeline graph during setup and teardown.
//!
//! The lifecycle state lives in the graph, not in the stage, so every stage
//! implementation gets the same transition rules:
//!
//! ```text
//!  Init ──params──► Ready ──Prepare──► Prepare ──Start──► Active
//!                     ▲                   ▲  ◄──Stop────── │ ▲
//!                     │                   │                │ │ Release
//!                     └──────Reset────────┘        Pause ──▼ │
//!                                                        Paused
//! ```

use crate::buffer::{BufferError, CompBuffer};
use platform::DcacheOps;

/// Stage kinds known to the driver registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CompType {
    /// Host gateway: moves audio between host memory and a local buffer.
    Host,
    /// Link gateway: moves audio between an external link and a local buffer.
    Dai,
    /// Structural placeholder without per-period work.
    Switch,
}

/// Stream direction relative to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StreamDirection {
    /// Host → DSP → link.
    Playback,
    /// Link → DSP → host.
    Capture,
}

/// Lifecycle state of a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CompState {
    /// Created, no stream parameters yet.
    Init,
    /// Parameters set.
    Ready,
    /// Prepared for streaming.
    Prepare,
    /// Streaming; the scheduler may call `copy`.
    Active,
    /// Streaming suspended.
    Paused,
}

/// Trigger commands fanned out by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TriggerCmd {
    /// `Prepare → Active`.
    Start,
    /// `Active | Paused → Prepare`.
    Stop,
    /// `Active → Paused`.
    Pause,
    /// `Paused → Active`.
    Release,
    /// Back to `Ready`; refused while streaming.
    Reset,
    /// `Ready → Prepare`.
    Prepare,
}

/// Commands delivered through [`Component::handle_command`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CompCommand {
    /// Pipeline trigger, delivered after the state transition was accepted.
    Trigger(TriggerCmd),
    /// Runtime control value.
    SetValue {
        /// Control index.
        control: u32,
        /// New value.
        value: u32,
    },
}

/// Stream parameters shared by every stage of a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StreamParams {
    /// Direction of the stream.
    pub direction: StreamDirection,
    /// Sample rate in Hz.
    pub rate: u32,
    /// Interleaved channels.
    pub channels: u16,
    /// Bytes per sample container (2 or 4).
    pub container_bytes: u8,
    /// Bytes moved per scheduling period.
    pub period_bytes: u32,
}

/// Creation request handed to a [`ComponentDriver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CompDesc {
    /// Component id, unique within the pipeline.
    pub id: u32,
    /// Which driver builds this stage.
    pub comp_type: CompType,
    /// Owning pipeline.
    pub pipeline_id: u32,
    /// Core the stage is scheduled on.
    pub core: u32,
    /// Stream direction.
    pub direction: StreamDirection,
    /// Gateway DMA controller id (gateway stages only).
    pub dma_id: u32,
}

/// Errors returned by stage operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CompError {
    /// The trigger is not valid in the current state.
    InvalidState,
    /// Malformed request.
    InvalidArgument,
    /// No component, buffer or driver with that id.
    NotFound,
    /// Resource in use.
    Busy,
    /// A fixed-size table is full or a hardware resource is exhausted.
    NoResource,
    /// Hardware handshake not observed in time.
    Timeout,
    /// Nothing to move yet.
    NoData,
    /// Ring-buffer failure.
    Buffer(BufferError),
}

impl core::fmt::Display for CompError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InvalidState => f.write_str("invalid state transition"),
            Self::InvalidArgument => f.write_str("invalid argument"),
            Self::NotFound => f.write_str("not found"),
            Self::Busy => f.write_str("resource busy"),
            Self::NoResource => f.write_str("no resource available"),
            Self::Timeout => f.write_str("timed out"),
            Self::NoData => f.write_str("no data"),
            Self::Buffer(e) => write!(f, "buffer: {e}"),
        }
    }
}

impl From<BufferError> for CompError {
    fn from(err: BufferError) -> Self {
        Self::Buffer(err)
    }
}

/// Buffers and cache handle a stage works on for one call.
pub struct StageIo<'b, 'l> {
    /// Upstream buffer, absent at the pipeline's input edge.
    pub source: Option<&'b CompBuffer<'l>>,
    /// Downstream buffer, absent at the pipeline's output edge.
    pub sink: Option<&'b CompBuffer<'l>>,
    /// Data-cache maintenance for the buffers.
    pub cache: &'b dyn DcacheOps,
}

/// Behaviour of one stage kind.
pub trait Component {
    /// Kind of this stage.
    fn comp_type(&self) -> CompType;

    /// `true` when the stage moves data with DMA; decides cache maintenance
    /// on the adjacent buffers.
    fn is_dma_connected(&self) -> bool {
        false
    }

    /// Apply stream parameters.
    fn set_stream_params(&mut self, params: &StreamParams) -> Result<(), CompError>;

    /// Handle a trigger or control command.
    fn handle_command(&mut self, cmd: CompCommand, io: &StageIo<'_, '_>) -> Result<(), CompError>;

    /// Get ready to stream.
    fn prepare(&mut self, io: &StageIo<'_, '_>) -> Result<(), CompError>;

    /// Process one period. Returns the number of bytes moved.
    fn copy(&mut self, io: &StageIo<'_, '_>) -> Result<u32, CompError>;

    /// Drop streaming state.
    fn reset(&mut self) -> Result<(), CompError>;

    /// Release everything the stage holds. Called once, at teardown.
    fn destroy(&mut self);
}

/// Factory for one [`CompType`], producing stages of type `S`.
pub trait ComponentDriver<S> {
    /// The kind this driver builds.
    fn comp_type(&self) -> CompType;

    /// Build a stage from `desc`.
    fn create(&self, desc: &CompDesc) -> Result<S, CompError>;
}

/// State after applying `cmd` to a stage in `state`.
///
/// # Errors
///
/// [`CompError::InvalidState`] when `cmd` is not allowed in `state`.
pub fn next_state(state: CompState, cmd: TriggerCmd) -> Result<CompState, CompError> {
    use CompState::{Active, Init, Paused, Prepare, Ready};
    match (cmd, state) {
        (TriggerCmd::Prepare, Ready | Prepare) => Ok(Prepare),
        (TriggerCmd::Start, Prepare) | (TriggerCmd::Release, Paused) => Ok(Active),
        (TriggerCmd::Pause, Active) => Ok(Paused),
        (TriggerCmd::Stop, Active | Paused) => Ok(Prepare),
        (TriggerCmd::Reset, Init) => Ok(Init),
        (TriggerCmd::Reset, Ready | Prepare) => Ok(Ready),
        _ => Err(CompError::InvalidState),
    }
}
