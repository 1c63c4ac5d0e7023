//! HD-Audio gateway DMA
//!
//! Host gateways move audio between host memory and a local ring buffer,
//! link gateways between the local ring and a link device. In both cases the
//! gateway does the actual transfer on its own; firmware only tells it how
//! many bytes of the local ring it has produced or consumed (the "fill
//! pointer increment") and watches the full / not-empty flags.
//!
//! # Busy-wait
//!
//! A blocking host copy spins on DGCS until the gateway reports the buffer
//! full (host → local) or empty (local → host). The spin is bounded by
//! [`PlatformConfig::host_dma_timeout_ticks`] and fails with
//! [`DmaError::Timeout`]; it never holds the channel-table lock.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use platform::config::{HDA_CHAN_REG_SIZE, HDA_DMA_MAX_CHANS};
use platform::{PlatformConfig, PlatformTimer, PmContext, PmRuntime, RegisterIo};

use super::regs::{
    Dgcs, DGBBA, DGBBA_MASK, DGBFPI, DGBRP, DGBS, DGBS_MASK, DGBWP, DGCS, DGLLPI, DGLPIBI, DGMBS,
};
use super::trace::{PtrSnapshot, PtrTrace};
use super::{
    ChanStatus, CopyFlags, DataSize, DmaAttribute, DmaCbType, DmaChanState, DmaDirection, DmaError,
    DmaListener, DmaOps, SgConfig,
};

/// Which side of the gateway a controller serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GatewayKind {
    /// Host memory side.
    Host,
    /// Link device side.
    Link,
}

/// Platform services a controller needs.
#[derive(Clone, Copy)]
pub struct DmaServices<'a> {
    /// Register access.
    pub regs: &'a dyn RegisterIo,
    /// Wall clock for handshake deadlines and status timestamps.
    pub timer: &'a dyn PlatformTimer,
    /// Power runtime for the host DMA L1 hold.
    pub pm: &'a dyn PmRuntime,
}

#[derive(Clone, Copy)]
struct HdaChan<'a> {
    state: DmaChanState,
    direction: DmaDirection,
    desc_count: u32,
    desc_avail: u32,
    period_bytes: u32,
    buffer_addr: u32,
    buffer_bytes: u32,
    release: bool,
    cb_mask: DmaCbType,
    listener: Option<&'a dyn DmaListener>,
    trace: PtrTrace,
}

impl HdaChan<'_> {
    const fn idle() -> Self {
        Self {
            state: DmaChanState::Idle,
            direction: DmaDirection::HmemToLmem,
            desc_count: 0,
            desc_avail: 0,
            period_bytes: 0,
            buffer_addr: 0,
            buffer_bytes: 0,
            release: false,
            cb_mask: DmaCbType::empty(),
            listener: None,
            trace: PtrTrace::new(),
        }
    }
}

struct Inner<'a> {
    probed: bool,
    busy: usize,
    chans: [HdaChan<'a>; HDA_DMA_MAX_CHANS],
}

/// Validated result of a [`SgConfig`], ready to be programmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RingPlan {
    buffer_addr: u32,
    buffer_bytes: u32,
    period_bytes: u32,
    desc_count: u32,
    dgcs: Dgcs,
}

/// Fill level the gateway should reach before a blocking copy returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum Fill {
    Full,
    Empty,
}

/// One HD-Audio gateway DMA controller.
pub struct HdaDma<'a> {
    id: u32,
    kind: GatewayKind,
    base: u32,
    config: PlatformConfig,
    regs: &'a dyn RegisterIo,
    timer: &'a dyn PlatformTimer,
    pm: &'a dyn PmRuntime,
    inner: Mutex<CriticalSectionRawMutex, RefCell<Inner<'a>>>,
}

impl<'a> HdaDma<'a> {
    /// Controller `id` whose channel register windows start at `base`.
    ///
    /// The controller must be probed before use.
    pub const fn new(
        id: u32,
        kind: GatewayKind,
        base: u32,
        config: PlatformConfig,
        services: DmaServices<'a>,
    ) -> Self {
        Self {
            id,
            kind,
            base,
            config,
            regs: services.regs,
            timer: services.timer,
            pm: services.pm,
            inner: Mutex::new(RefCell::new(Inner {
                probed: false,
                busy: 0,
                chans: [HdaChan::idle(); HDA_DMA_MAX_CHANS],
            })),
        }
    }

    /// Host or link side.
    pub fn kind(&self) -> GatewayKind {
        self.kind
    }

    /// Pointer trace of `channel` since its last start.
    pub fn pointer_trace(&self, channel: usize) -> Result<PtrTrace, DmaError> {
        self.with_chan(channel, |chan| Ok(chan.trace))
    }

    /// Current lifecycle state of `channel`.
    pub fn channel_state(&self, channel: usize) -> Result<DmaChanState, DmaError> {
        self.with_chan(channel, |chan| Ok(chan.state))
    }

    // ── Locking ──────────────────────────────────────────────────────────────

    fn channels(&self) -> usize {
        self.config.dma_max_channels.min(HDA_DMA_MAX_CHANS)
    }

    fn with_inner<R>(&self, f: impl FnOnce(&mut Inner<'a>) -> Result<R, DmaError>) -> Result<R, DmaError> {
        self.inner.lock(|cell| {
            let mut inner = cell.borrow_mut();
            if !inner.probed {
                error!("hda-dma {}: not probed", self.id);
                return Err(DmaError::InvalidArgument);
            }
            f(&mut *inner)
        })
    }

    fn with_chan<R>(
        &self,
        channel: usize,
        f: impl FnOnce(&mut HdaChan<'a>) -> Result<R, DmaError>,
    ) -> Result<R, DmaError> {
        let limit = self.channels();
        self.with_inner(|inner| {
            let chan = inner
                .chans
                .get_mut(channel)
                .filter(|_| channel < limit)
                .ok_or(DmaError::InvalidArgument)
                .map_err(|e| {
                    error!("hda-dma {}: invalid channel {}", self.id, channel);
                    e
                })?;
            f(chan)
        })
    }

    // ── Registers ────────────────────────────────────────────────────────────

    fn chan_base(&self, channel: usize) -> u32 {
        // Channel indices are bounded by HDA_DMA_MAX_CHANS.
        self.base
            .wrapping_add((channel as u32).wrapping_mul(HDA_CHAN_REG_SIZE))
    }

    fn read(&self, base: u32, reg: u32) -> u32 {
        self.regs.read(base.wrapping_add(reg))
    }

    fn write(&self, base: u32, reg: u32, value: u32) {
        self.regs.write(base.wrapping_add(reg), value);
    }

    fn dgcs(&self, base: u32) -> Dgcs {
        Dgcs::from_bits_retain(self.read(base, DGCS))
    }

    fn update_dgcs(&self, base: u32, mask: Dgcs, value: Dgcs) {
        self.regs
            .update_bits(base.wrapping_add(DGCS), mask.bits(), value.bits());
    }

    /// Host flavour: the link position registers advance together with the
    /// fill pointer.
    fn inc_fp(&self, base: u32, bytes: u32) {
        self.write(base, DGBFPI, bytes);
        self.write(base, DGLLPI, bytes);
        self.write(base, DGLPIBI, bytes);
    }

    fn inc_link_fp(&self, base: u32, bytes: u32) {
        self.write(base, DGBFPI, bytes);
    }

    fn fill_reached(&self, base: u32, want: Fill) -> bool {
        let dgcs = self.dgcs(base);
        match want {
            Fill::Full => dgcs.contains(Dgcs::BF),
            Fill::Empty => !dgcs.contains(Dgcs::BNE),
        }
    }

    fn wait_for(&self, channel: usize, base: u32, want: Fill) -> Result<(), DmaError> {
        let deadline = self
            .timer
            .now()
            .saturating_add(self.config.host_dma_timeout_ticks());

        while !self.fill_reached(base, want) {
            if deadline < self.timer.now() {
                // The gateway may have got there while we read the clock.
                if self.fill_reached(base, want) {
                    return Ok(());
                }
                error!(
                    "hda-dma {} ch {}: timeout waiting for {:?}, rp {} wp {}",
                    self.id,
                    channel,
                    want,
                    self.read(base, DGBRP),
                    self.read(base, DGBWP)
                );
                return Err(DmaError::Timeout);
            }
        }
        Ok(())
    }

    // ── Transitions ──────────────────────────────────────────────────────────

    /// Gateway enable; runs with the channel table locked.
    fn enable(&self, channel: usize, chan: &mut HdaChan<'a>) {
        let base = self.chan_base(channel);
        self.update_dgcs(base, Dgcs::GEN | Dgcs::FIFORDY, Dgcs::GEN | Dgcs::FIFORDY);
        chan.desc_avail = chan.desc_count;

        if chan.direction.is_host() {
            self.pm.put(PmContext::HostDmaL1, 0);
        }

        // An output link starts with a full ring unless it is resuming.
        if chan.direction == DmaDirection::MemToDev && !chan.release {
            self.inc_link_fp(base, chan.buffer_bytes);
        }
        chan.release = false;
        chan.trace.rearm();

        let snap = PtrSnapshot::sample(self.regs, base);
        debug!(
            "hda-dma {} ch {}: enabled, ring {:#x}+{} in {} periods of {}, wp {} rp {}",
            self.id,
            channel,
            chan.buffer_addr,
            chan.buffer_bytes,
            chan.desc_avail,
            chan.period_bytes,
            snap.wp,
            snap.rp
        );
    }

    fn host_copy(
        &self,
        channel: usize,
        base: u32,
        direction: DmaDirection,
        bytes: u32,
        flags: CopyFlags,
    ) -> Result<(), DmaError> {
        let want = if direction == DmaDirection::HmemToLmem {
            Fill::Full
        } else {
            Fill::Empty
        };

        if flags.contains(CopyFlags::PRELOAD) {
            if !self.fill_reached(base, want) {
                return Err(DmaError::NoData);
            }
        } else {
            self.inc_fp(base, bytes);
        }

        if flags.contains(CopyFlags::BLOCKING) {
            self.wait_for(channel, base, want)?;
        }
        Ok(())
    }

    fn link_copy(&self, base: u32, bytes: u32) {
        if self.dgcs(base).contains(Dgcs::BOR) {
            // Write-one-to-clear.
            self.update_dgcs(base, Dgcs::BOR, Dgcs::BOR);
        }
        self.inc_link_fp(base, bytes);
    }

    fn post_copy(
        &self,
        channel: usize,
        direction: DmaDirection,
        listener: Option<&'a dyn DmaListener>,
        mask: DmaCbType,
        bytes: u32,
    ) {
        if let Some(listener) = listener {
            if mask.contains(DmaCbType::COPY) {
                listener.on_dma_event(channel, DmaCbType::COPY, bytes);
            }
        }
        if direction.is_host() {
            self.pm.put(PmContext::HostDmaL1, 0);
        }
    }
}

/// Validate `config` against the gateway rules without touching hardware.
fn plan_ring(kind: GatewayKind, config: &SgConfig<'_>, align: u32) -> Result<RingPlan, DmaError> {
    let dir = config.direction;
    if config.elems.is_empty() {
        error!("hda-dma: no descriptors");
        return Err(DmaError::InvalidArgument);
    }
    if (kind == GatewayKind::Host) != dir.is_host() {
        error!("hda-dma: direction {:?} on a {:?} gateway", dir, kind);
        return Err(DmaError::InvalidArgument);
    }
    // Link gateways are fed from the scheduler, never from DMA interrupts.
    if dir.is_link() && !config.irq_disabled {
        error!("hda-dma: link direction {:?} needs scheduler-driven copies", dir);
        return Err(DmaError::InvalidArgument);
    }

    let mut buffer_addr: Option<u32> = None;
    let mut buffer_bytes: u32 = 0;
    let mut period_bytes: u32 = 0;
    for elem in config.elems {
        let addr = if dir.is_input() { elem.dest } else { elem.src };
        if let Some(start) = buffer_addr {
            if start.checked_add(buffer_bytes) != Some(addr) {
                error!("hda-dma: descriptor {} not contiguous with {} + {}", addr, start, buffer_bytes);
                return Err(DmaError::InvalidArgument);
            }
        }
        if period_bytes != 0 && period_bytes != elem.size {
            error!("hda-dma: period {} differs from {}", elem.size, period_bytes);
            return Err(DmaError::InvalidArgument);
        }
        period_bytes = elem.size;
        buffer_bytes = buffer_bytes
            .checked_add(elem.size)
            .ok_or(DmaError::InvalidArgument)?;
        buffer_addr.get_or_insert(addr);
    }

    if buffer_bytes.checked_rem(align) != Some(0) {
        error!("hda-dma: ring of {} bytes not {}-aligned", buffer_bytes, align);
        return Err(DmaError::InvalidArgument);
    }

    let mut dgcs = Dgcs::FWCB;
    let narrow = match dir {
        DmaDirection::HmemToLmem | DmaDirection::DevToMem => config.dest_width <= 2,
        DmaDirection::LmemToHmem | DmaDirection::MemToDev => config.src_width <= 2,
    };
    if narrow {
        dgcs |= Dgcs::SCS;
    }
    // Output rings report FIFO ready from the first enable.
    if (config.cyclic && dir == DmaDirection::MemToDev)
        || (!config.cyclic && dir == DmaDirection::LmemToHmem)
    {
        dgcs |= Dgcs::FIFORDY;
    }

    Ok(RingPlan {
        buffer_addr: buffer_addr.unwrap_or(0),
        buffer_bytes,
        period_bytes,
        desc_count: u32::try_from(config.elems.len()).map_err(|_| DmaError::InvalidArgument)?,
        dgcs,
    })
}

/// Bytes readable (input) or writable (output) in a ring of `size` bytes,
/// as reported by the gateway.
fn gateway_level(dgcs: Dgcs, rp: u32, wp: u32, size: u32, input: bool) -> DataSize {
    let (from, to) = if input { (rp, wp) } else { (wp, rp) };
    let level = if dgcs.contains(Dgcs::BF) {
        if input {
            size
        } else {
            0
        }
    } else if !dgcs.contains(Dgcs::BNE) {
        if input {
            0
        } else {
            size
        }
    } else {
        let mut diff = i64::from(to).wrapping_sub(i64::from(from));
        if diff <= 0 {
            diff = diff.wrapping_add(i64::from(size));
        }
        u32::try_from(diff).unwrap_or(0)
    };

    if input {
        DataSize { avail: level, free: 0 }
    } else {
        DataSize { avail: 0, free: level }
    }
}

impl<'a> DmaOps<'a> for HdaDma<'a> {
    fn id(&self) -> u32 {
        self.id
    }

    fn probe(&self) -> Result<(), DmaError> {
        self.inner.lock(|cell| {
            let mut inner = cell.borrow_mut();
            if inner.probed {
                warn!("hda-dma {}: already probed", self.id);
                return Err(DmaError::Busy);
            }
            inner.probed = true;
            inner.busy = 0;
            inner.chans = [HdaChan::idle(); HDA_DMA_MAX_CHANS];
            info!("hda-dma {}: probed, {} channels", self.id, self.channels());
            Ok(())
        })
    }

    fn remove(&self) -> Result<(), DmaError> {
        self.with_inner(|inner| {
            if inner
                .chans
                .iter()
                .any(|c| matches!(c.state, DmaChanState::Active | DmaChanState::Paused))
            {
                return Err(DmaError::Busy);
            }
            inner.probed = false;
            inner.busy = 0;
            inner.chans = [HdaChan::idle(); HDA_DMA_MAX_CHANS];
            info!("hda-dma {}: removed", self.id);
            Ok(())
        })
    }

    fn channel_get(&self, index: usize) -> Result<usize, DmaError> {
        let limit = self.channels();
        self.with_inner(|inner| {
            let chan = inner
                .chans
                .get_mut(index)
                .filter(|_| index < limit)
                .ok_or(DmaError::InvalidArgument)?;
            if chan.state != DmaChanState::Idle {
                error!("hda-dma {}: channel {} not free", self.id, index);
                return Err(DmaError::NoChannel);
            }
            chan.state = DmaChanState::Ready;
            inner.busy = inner.busy.saturating_add(1);
            debug!("hda-dma {}: channel {} acquired", self.id, index);
            Ok(index)
        })
    }

    fn acquire(&self) -> Result<usize, DmaError> {
        let limit = self.channels();
        self.with_inner(|inner| {
            let Some((index, chan)) = inner
                .chans
                .iter_mut()
                .take(limit)
                .enumerate()
                .find(|(_, c)| c.state == DmaChanState::Idle)
            else {
                warn!("hda-dma {}: all {} channels busy", self.id, limit);
                return Err(DmaError::NoChannel);
            };
            chan.state = DmaChanState::Ready;
            inner.busy = inner.busy.saturating_add(1);
            debug!("hda-dma {}: channel {} acquired", self.id, index);
            Ok(index)
        })
    }

    fn channel_put(&self, channel: usize) -> Result<(), DmaError> {
        let limit = self.channels();
        self.with_inner(|inner| {
            let chan = inner
                .chans
                .get_mut(channel)
                .filter(|_| channel < limit)
                .ok_or(DmaError::InvalidArgument)?;
            match chan.state {
                DmaChanState::Active | DmaChanState::Paused => {
                    error!("hda-dma {}: put of running channel {}", self.id, channel);
                    Err(DmaError::Busy)
                }
                DmaChanState::Idle => Ok(()),
                DmaChanState::Ready | DmaChanState::Configured => {
                    *chan = HdaChan::idle();
                    inner.busy = inner.busy.saturating_sub(1);
                    debug!("hda-dma {}: channel {} released", self.id, channel);
                    Ok(())
                }
            }
        })
    }

    fn set_config(&self, channel: usize, config: &SgConfig<'_>) -> Result<(), DmaError> {
        let align = self.config.hda_buffer_alignment;
        self.with_chan(channel, |chan| {
            match chan.state {
                DmaChanState::Idle => return Err(DmaError::InvalidArgument),
                DmaChanState::Active | DmaChanState::Paused => return Err(DmaError::Busy),
                DmaChanState::Ready | DmaChanState::Configured => {}
            }
            let plan = plan_ring(self.kind, config, align)?;

            let base = self.chan_base(channel);
            self.write(base, DGBBA, plan.buffer_addr & DGBBA_MASK);
            self.write(base, DGBS, plan.buffer_bytes & DGBS_MASK);
            if config.direction.is_host() {
                let mbs = plan
                    .buffer_bytes
                    .checked_next_multiple_of(align)
                    .ok_or(DmaError::InvalidArgument)?;
                self.write(base, DGMBS, mbs);
            }
            self.write(base, DGCS, plan.dgcs.bits());

            chan.direction = config.direction;
            chan.desc_count = plan.desc_count;
            chan.period_bytes = plan.period_bytes;
            chan.buffer_addr = plan.buffer_addr;
            chan.buffer_bytes = plan.buffer_bytes;
            chan.state = DmaChanState::Configured;
            debug!(
                "hda-dma {} ch {}: {:?} ring {} bytes, period {}",
                self.id, channel, config.direction, plan.buffer_bytes, plan.period_bytes
            );
            Ok(())
        })
    }

    fn set_callback(
        &self,
        channel: usize,
        mask: DmaCbType,
        listener: Option<&'a dyn DmaListener>,
    ) -> Result<(), DmaError> {
        self.with_chan(channel, |chan| {
            if chan.state == DmaChanState::Idle {
                return Err(DmaError::InvalidArgument);
            }
            chan.cb_mask = if listener.is_some() { mask } else { DmaCbType::empty() };
            chan.listener = listener;
            Ok(())
        })
    }

    fn start(&self, channel: usize) -> Result<(), DmaError> {
        self.with_chan(channel, |chan| {
            let base = self.chan_base(channel);
            if chan.state != DmaChanState::Configured || self.dgcs(base).contains(Dgcs::GEN) {
                warn!("hda-dma {} ch {}: start in {:?}", self.id, channel, chan.state);
                return Err(DmaError::Busy);
            }
            self.enable(channel, chan);
            chan.state = DmaChanState::Active;
            Ok(())
        })
    }

    fn stop(&self, channel: usize) -> Result<(), DmaError> {
        self.with_chan(channel, |chan| {
            if chan.state == DmaChanState::Idle {
                return Err(DmaError::InvalidArgument);
            }
            let base = self.chan_base(channel);
            self.update_dgcs(base, Dgcs::GEN | Dgcs::FIFORDY, Dgcs::empty());
            if matches!(chan.state, DmaChanState::Active | DmaChanState::Paused) {
                chan.state = DmaChanState::Configured;
            }
            chan.release = false;
            let snap = PtrSnapshot::sample(self.regs, base);
            debug!("hda-dma {} ch {}: stopped, wp {} rp {}", self.id, channel, snap.wp, snap.rp);
            Ok(())
        })
    }

    fn pause(&self, channel: usize) -> Result<(), DmaError> {
        self.with_chan(channel, |chan| {
            if chan.state == DmaChanState::Active {
                chan.state = DmaChanState::Paused;
                debug!("hda-dma {} ch {}: paused", self.id, channel);
            }
            Ok(())
        })
    }

    fn resume(&self, channel: usize) -> Result<(), DmaError> {
        self.with_chan(channel, |chan| match chan.state {
            DmaChanState::Active => Ok(()),
            DmaChanState::Paused => {
                self.enable(channel, chan);
                chan.state = DmaChanState::Active;
                Ok(())
            }
            DmaChanState::Idle | DmaChanState::Ready | DmaChanState::Configured => {
                Err(DmaError::InvalidArgument)
            }
        })
    }

    fn release(&self, channel: usize) -> Result<(), DmaError> {
        self.with_chan(channel, |chan| {
            if chan.state == DmaChanState::Idle {
                return Err(DmaError::InvalidArgument);
            }
            chan.release = true;
            Ok(())
        })
    }

    fn copy(&self, channel: usize, bytes: u32, flags: CopyFlags) -> Result<(), DmaError> {
        let (direction, listener, mask, traced) = self.with_chan(channel, |chan| {
            if chan.state != DmaChanState::Active {
                error!("hda-dma {} ch {}: copy in {:?}", self.id, channel, chan.state);
                return Err(DmaError::InvalidArgument);
            }
            Ok((chan.direction, chan.listener, chan.cb_mask, chan.trace.armed()))
        })?;

        trace!("hda-dma {} ch {}: copy {} bytes", self.id, channel, bytes);
        let base = self.chan_base(channel);
        let pre = traced.then(|| PtrSnapshot::sample(self.regs, base));

        match self.kind {
            GatewayKind::Host => self.host_copy(channel, base, direction, bytes, flags)?,
            GatewayKind::Link => self.link_copy(base, bytes),
        }
        self.post_copy(channel, direction, listener, mask, bytes);

        if let Some(pre) = pre {
            let post = PtrSnapshot::sample(self.regs, base);
            self.with_chan(channel, |chan| {
                chan.trace.record(self.id, channel, pre, post);
                Ok(())
            })?;
        }
        Ok(())
    }

    fn status(&self, channel: usize) -> Result<ChanStatus, DmaError> {
        self.with_chan(channel, |chan| {
            if chan.state == DmaChanState::Idle {
                return Err(DmaError::InvalidArgument);
            }
            let base = self.chan_base(channel);
            Ok(ChanStatus {
                state: chan.state,
                r_pos: self.read(base, DGBRP),
                w_pos: self.read(base, DGBWP),
                timestamp: self.timer.now(),
            })
        })
    }

    fn get_data_size(&self, channel: usize) -> Result<DataSize, DmaError> {
        self.with_chan(channel, |chan| {
            if matches!(chan.state, DmaChanState::Idle | DmaChanState::Ready) {
                return Err(DmaError::InvalidArgument);
            }
            let base = self.chan_base(channel);
            let dgcs = self.dgcs(base);
            let rp = self.read(base, DGBRP);
            let wp = self.read(base, DGBWP);
            Ok(gateway_level(dgcs, rp, wp, chan.buffer_bytes, chan.direction.is_input()))
        })
    }

    fn get_attribute(&self, attr: DmaAttribute) -> Result<u32, DmaError> {
        match attr {
            DmaAttribute::BufferAlignment => Ok(self.config.hda_buffer_alignment),
            DmaAttribute::CopyAlignment => Err(DmaError::InvalidArgument),
        }
    }

    fn pm_context_store(&self) -> Result<(), DmaError> {
        trace!("hda-dma {}: nothing to store", self.id);
        Ok(())
    }

    fn pm_context_restore(&self) -> Result<(), DmaError> {
        trace!("hda-dma {}: nothing to restore", self.id);
        Ok(())
    }

    fn busy_channels(&self) -> usize {
        self.inner.lock(|cell| cell.borrow().busy)
    }
}
