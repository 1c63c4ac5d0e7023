//! Inter-stage ring buffer.
//!
//! A [`CompBuffer`] connects exactly one producer stage to one consumer
//! stage. It owns a byte region obtained from a [`RegionAllocator`] and
//! tracks how much of it holds unread data. The buffer never touches the
//! bytes itself: stages and DMA engines move data, then report the amount
//! through [`CompBuffer::produce`] / [`CompBuffer::consume`].
//!
//! # Cache maintenance
//!
//! The DSP core and gateway DMA are not coherent. Each produce/consume
//! applies maintenance to the span it covers, chosen by which side of the
//! buffer is DMA-driven:
//!
//! | source | sink    | action                |
//! |--------|---------|-----------------------|
//! | DMA    | CPU     | invalidate            |
//! | CPU    | DMA     | write back            |
//! | DMA    | DMA     | none                  |
//! | CPU    | CPU     | none                  |
//!
//! A span that crosses the end of the region is split into a head (up to
//! the end) and a tail (from the base).
//!
//! # Full vs. empty
//!
//! Equal read and write offsets mean *full* after a produce and *empty*
//! after a consume. The last mutating call decides; equality alone does not.
//!
//! # Locking
//!
//! All accounting runs inside a critical section, because DMA completion
//! interrupts and scheduled stage copies touch the same buffer.

use core::cell::RefCell;

use bitflags::bitflags;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use platform::config::HEAP_BUFFER_SIZE;
use platform::{DcacheOps, HeapError, MemCaps, Region, RegionAllocator};

bitflags! {
    /// Buffer events a listener can subscribe to.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BufferEvent: u32 {
        /// Bytes were produced into the buffer.
        const PRODUCE = 1 << 0;
        /// Bytes were consumed from the buffer.
        const CONSUME = 1 << 1;
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for BufferEvent {
    fn format(&self, f: defmt::Formatter<'_>) {
        defmt::write!(f, "BufferEvent({=u32:#x})", self.bits());
    }
}

/// Completion hook invoked after produce/consume accounting.
///
/// Runs inside the buffer's critical section, possibly at interrupt
/// priority. Implementations must not block. They may read the buffer's
/// [`status`](CompBuffer::status) but must not produce into or consume from
/// it.
pub trait BufferListener {
    /// `bytes` were moved through buffer `buffer_id`.
    fn on_buffer_event(&self, buffer_id: u32, event: BufferEvent, bytes: u32);
}

/// Stage attached to one side of a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Endpoint {
    /// Component id of the stage.
    pub comp_id: u32,
    /// Whether the stage moves data with DMA rather than the CPU.
    pub dma_connected: bool,
}

/// Buffer creation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BufferDesc {
    /// Buffer id, unique within the pipeline graph.
    pub id: u32,
    /// Requested size in bytes.
    pub size: u32,
    /// Required memory capabilities.
    pub caps: MemCaps,
}

/// Errors returned by buffer operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BufferError {
    /// Size is zero or exceeds [`HEAP_BUFFER_SIZE`].
    InvalidSize,
    /// The heap could not provide the region.
    OutOfMemory,
    /// The buffer's storage was already released.
    Released,
}

impl core::fmt::Display for BufferError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let msg = match self {
            Self::InvalidSize => "invalid buffer size",
            Self::OutOfMemory => "out of buffer memory",
            Self::Released => "buffer storage released",
        };
        f.write_str(msg)
    }
}

impl From<HeapError> for BufferError {
    fn from(err: HeapError) -> Self {
        match err {
            HeapError::ZeroSize => Self::InvalidSize,
            HeapError::UnsupportedCaps | HeapError::NoMemory | HeapError::UnknownRegion => {
                Self::OutOfMemory
            }
        }
    }
}

/// Accounting snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BufferStatus {
    /// Base address of the region.
    pub addr: u32,
    /// Capacity in bytes.
    pub size: u32,
    /// Bytes ready to consume.
    pub avail: u32,
    /// Bytes ready to produce into.
    pub free: u32,
    /// Read offset from `addr`.
    pub r_off: u32,
    /// Write offset from `addr`.
    pub w_off: u32,
}

#[derive(Clone, Copy)]
enum CacheAction {
    Invalidate,
    WriteBack,
}

impl CacheAction {
    fn apply(self, cache: &dyn DcacheOps, addr: u32, len: u32) {
        match self {
            Self::Invalidate => cache.invalidate_region(addr, len),
            Self::WriteBack => cache.writeback_region(addr, len),
        }
    }
}

struct State<'l> {
    region: Option<Region>,
    r_off: u32,
    w_off: u32,
    avail: u32,
    source: Option<Endpoint>,
    sink: Option<Endpoint>,
    listener: Option<(BufferEvent, &'l dyn BufferListener)>,
}

impl State<'_> {
    fn fresh(region: Region) -> Self {
        Self {
            region: Some(region),
            r_off: 0,
            w_off: 0,
            avail: 0,
            source: None,
            sink: None,
            listener: None,
        }
    }

    fn snapshot(&self) -> BufferStatus {
        let (addr, size) = self.region.map_or((0, 0), |r| (r.addr, r.size));
        BufferStatus {
            addr,
            size,
            avail: self.avail,
            free: size.saturating_sub(self.avail),
            r_off: self.r_off,
            w_off: self.w_off,
        }
    }

    /// A missing endpoint counts as CPU-driven.
    fn cache_action(&self) -> Option<CacheAction> {
        let source_dma = self.source.is_some_and(|e| e.dma_connected);
        let sink_dma = self.sink.is_some_and(|e| e.dma_connected);
        match (source_dma, sink_dma) {
            (true, false) => Some(CacheAction::Invalidate),
            (false, true) => Some(CacheAction::WriteBack),
            _ => None,
        }
    }

    fn maintain(&self, cache: &dyn DcacheOps, region: Region, off: u32, bytes: u32) {
        let Some(action) = self.cache_action() else {
            return;
        };
        let span = bytes.min(region.size);
        let head = span.min(region.size.saturating_sub(off));
        let tail = span.saturating_sub(head);
        action.apply(cache, region.addr.wrapping_add(off), head);
        if tail > 0 {
            action.apply(cache, region.addr, tail);
        }
    }
}

fn notify(
    listener: Option<(BufferEvent, &dyn BufferListener)>,
    id: u32,
    event: BufferEvent,
    bytes: u32,
) {
    if let Some((mask, listener)) = listener {
        if mask.contains(event) {
            listener.on_buffer_event(id, event, bytes);
        }
    }
}

/// `(off + bytes) mod size`.
fn wrap_add(off: u32, bytes: u32, size: u32) -> u32 {
    let sum = u64::from(off).wrapping_add(u64::from(bytes));
    sum.checked_rem(u64::from(size))
        .and_then(|v| u32::try_from(v).ok())
        .unwrap_or(0)
}

/// Bytes between the cursors; `at_equal` decides full vs. empty.
#[allow(clippy::arithmetic_side_effects)] // Safety: each subtraction is guarded by the preceding comparison; r_off, w_off < size
fn fill_level(r_off: u32, w_off: u32, size: u32, at_equal: u32) -> u32 {
    if r_off < w_off {
        w_off - r_off
    } else if r_off == w_off {
        at_equal
    } else {
        size - (r_off - w_off)
    }
}

fn validate_size(size: u32) -> Result<(), BufferError> {
    if size == 0 || size > HEAP_BUFFER_SIZE {
        return Err(BufferError::InvalidSize);
    }
    Ok(())
}

/// Ring buffer between two pipeline stages.
///
/// `'l` is the lifetime of the registered [`BufferListener`].
pub struct CompBuffer<'l> {
    id: u32,
    caps: MemCaps,
    state: Mutex<CriticalSectionRawMutex, RefCell<State<'l>>>,
}

impl<'l> CompBuffer<'l> {
    /// Allocate a buffer as described by `desc`.
    ///
    /// # Errors
    ///
    /// [`BufferError::InvalidSize`] for a zero or over-limit size,
    /// [`BufferError::OutOfMemory`] when `heap` cannot satisfy the request.
    pub fn new(desc: &BufferDesc, heap: &dyn RegionAllocator) -> Result<Self, BufferError> {
        if let Err(e) = validate_size(desc.size) {
            error!("buffer {}: new size {} is invalid", desc.id, desc.size);
            return Err(e);
        }
        let region = heap.alloc(desc.caps, desc.size).map_err(|e| {
            error!(
                "buffer {}: could not alloc {} bytes of caps {}",
                desc.id,
                desc.size,
                desc.caps.bits()
            );
            BufferError::from(e)
        })?;
        debug!("buffer {}: {} bytes at {}", desc.id, region.size, region.addr);
        Ok(Self {
            id: desc.id,
            caps: desc.caps,
            state: Mutex::new(RefCell::new(State::fresh(region))),
        })
    }

    /// Buffer id.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Capabilities the storage was allocated with.
    pub fn caps(&self) -> MemCaps {
        self.caps
    }

    /// Accounting snapshot.
    pub fn status(&self) -> BufferStatus {
        self.state.lock(|s| s.borrow().snapshot())
    }

    /// Bytes ready to consume.
    pub fn avail(&self) -> u32 {
        self.status().avail
    }

    /// Bytes ready to produce into.
    pub fn free(&self) -> u32 {
        self.status().free
    }

    /// Capacity in bytes (zero once released).
    pub fn size(&self) -> u32 {
        self.status().size
    }

    /// Address the next consume reads from.
    pub fn read_addr(&self) -> u32 {
        let s = self.status();
        s.addr.wrapping_add(s.r_off)
    }

    /// Address the next produce writes to.
    pub fn write_addr(&self) -> u32 {
        let s = self.status();
        s.addr.wrapping_add(s.w_off)
    }

    /// Attach (or detach with `None`) the producing stage.
    pub fn link_source(&self, endpoint: Option<Endpoint>) {
        self.state.lock(|s| s.borrow_mut().source = endpoint);
    }

    /// Attach (or detach with `None`) the consuming stage.
    pub fn link_sink(&self, endpoint: Option<Endpoint>) {
        self.state.lock(|s| s.borrow_mut().sink = endpoint);
    }

    /// Producing stage, if linked.
    pub fn source(&self) -> Option<Endpoint> {
        self.state.lock(|s| s.borrow().source)
    }

    /// Consuming stage, if linked.
    pub fn sink(&self) -> Option<Endpoint> {
        self.state.lock(|s| s.borrow().sink)
    }

    /// Invoke `listener` after every event in `mask`. Replaces any previous
    /// listener.
    pub fn set_listener(&self, mask: BufferEvent, listener: &'l dyn BufferListener) {
        self.state.lock(|s| s.borrow_mut().listener = Some((mask, listener)));
    }

    /// Drop the registered listener.
    pub fn clear_listener(&self) {
        self.state.lock(|s| s.borrow_mut().listener = None);
    }

    /// Account for `bytes` written at the write cursor.
    ///
    /// Zero bytes is a no-op: no cache maintenance, no listener call.
    /// Producing more than [`free`](Self::free) is an overrun; it is logged
    /// and the cursor still wraps. Equal cursors afterwards mean full.
    pub fn produce(&self, cache: &dyn DcacheOps, bytes: u32) -> Result<(), BufferError> {
        if bytes == 0 {
            trace!("buffer {}: no bytes to produce", self.id);
            return Ok(());
        }

        let status = self.state.lock(|cell| -> Result<BufferStatus, BufferError> {
            let mut st = cell.borrow_mut();
            let region = st.region.ok_or(BufferError::Released)?;

            let free = region.size.saturating_sub(st.avail);
            if bytes > free {
                warn!("buffer {}: overrun, produce {} with {} free", self.id, bytes, free);
            }

            st.maintain(cache, region, st.w_off, bytes);
            st.w_off = wrap_add(st.w_off, bytes, region.size);
            st.avail = fill_level(st.r_off, st.w_off, region.size, region.size);

            let listener = st.listener;
            let status = st.snapshot();
            drop(st);
            notify(listener, self.id, BufferEvent::PRODUCE, bytes);
            Ok(status)
        })?;

        trace!(
            "buffer {}: produce {}, avail {} free {} r {} w {}",
            self.id,
            bytes,
            status.avail,
            status.free,
            status.r_off,
            status.w_off
        );
        Ok(())
    }

    /// Account for `bytes` read at the read cursor.
    ///
    /// Zero bytes is a no-op. Consuming more than [`avail`](Self::avail) is
    /// an underrun; it is logged and the cursor still wraps. Equal cursors
    /// afterwards mean empty.
    pub fn consume(&self, cache: &dyn DcacheOps, bytes: u32) -> Result<(), BufferError> {
        if bytes == 0 {
            trace!("buffer {}: no bytes to consume", self.id);
            return Ok(());
        }

        let status = self.state.lock(|cell| -> Result<BufferStatus, BufferError> {
            let mut st = cell.borrow_mut();
            let region = st.region.ok_or(BufferError::Released)?;

            if bytes > st.avail {
                warn!("buffer {}: underrun, consume {} with {} avail", self.id, bytes, st.avail);
            }

            st.maintain(cache, region, st.r_off, bytes);
            st.r_off = wrap_add(st.r_off, bytes, region.size);
            st.avail = fill_level(st.r_off, st.w_off, region.size, 0);

            let listener = st.listener;
            let status = st.snapshot();
            drop(st);
            notify(listener, self.id, BufferEvent::CONSUME, bytes);
            Ok(status)
        })?;

        trace!(
            "buffer {}: consume {}, avail {} free {} r {} w {}",
            self.id,
            bytes,
            status.avail,
            status.free,
            status.r_off,
            status.w_off
        );
        Ok(())
    }

    /// Reallocate the storage to `size` bytes, keeping the buffer's identity
    /// and links. Cursors restart at the base of the new region, empty.
    ///
    /// Callers must not resize a buffer while either attached stage is
    /// running.
    ///
    /// # Errors
    ///
    /// [`BufferError::InvalidSize`] for a zero or over-limit size,
    /// [`BufferError::OutOfMemory`] when the heap cannot satisfy the request.
    /// On error the buffer is unchanged.
    pub fn resize(&self, heap: &dyn RegionAllocator, size: u32) -> Result<(), BufferError> {
        if let Err(e) = validate_size(size) {
            error!("buffer {}: resize to {} is invalid", self.id, size);
            return Err(e);
        }
        self.state.lock(|cell| {
            let mut st = cell.borrow_mut();
            let old = st.region.ok_or(BufferError::Released)?;
            let region = heap.realloc(old, self.caps, size).map_err(|_| {
                error!("buffer {}: can't realloc {} bytes", self.id, size);
                BufferError::OutOfMemory
            })?;
            st.region = Some(region);
            st.r_off = 0;
            st.w_off = 0;
            st.avail = 0;
            debug!("buffer {}: resized to {} bytes at {}", self.id, region.size, region.addr);
            Ok(())
        })
    }

    /// Unlink both stages and the listener, then return the storage to
    /// `heap`.
    ///
    /// Any later produce/consume/resize fails with
    /// [`BufferError::Released`].
    pub fn destroy(&self, heap: &dyn RegionAllocator) -> Result<(), BufferError> {
        let region = self.state.lock(|cell| {
            let mut st = cell.borrow_mut();
            st.source = None;
            st.sink = None;
            st.listener = None;
            st.r_off = 0;
            st.w_off = 0;
            st.avail = 0;
            st.region.take()
        });
        let region = region.ok_or(BufferError::Released)?;
        debug!("buffer {}: free", self.id);
        heap.free(region).map_err(BufferError::from)
    }
}
