//! Gateway stages.
//!
//! A gateway stage sits at the edge of a pipeline and hands one ring buffer
//! to a gateway DMA channel. The ring buffer's storage *is* the DMA's local
//! ring, so a period costs no CPU copy: the stage only tells the gateway how
//! many bytes changed hands and advances the ring's cursors by the same
//! amount.
//!
//! ```text
//!  host ──HmemToLmem──► [ring] ──► ... ──► [ring] ──MemToDev──► link
//!        (Host stage, sink ring)            (Dai stage, source ring)
//! ```

use pipeline::{
    CompBuffer, CompCommand, CompDesc, CompError, CompType, Component, ComponentDriver, StageIo,
    StreamDirection, StreamParams, TriggerCmd,
};

use crate::dma::{CopyFlags, DmaCbType, DmaDirection, DmaError, DmaListener, DmaOps, SgConfig, SgElem};
use crate::init::DmaRegistry;

use super::stage::Stage;

/// Most periods a gateway ring can be split into.
pub const MAX_RING_PERIODS: usize = 16;

/// Stage driving one gateway DMA channel.
pub struct DmaStage<'a> {
    comp_id: u32,
    comp_type: CompType,
    direction: DmaDirection,
    dma: &'a dyn DmaOps<'a>,
    channel: Option<usize>,
    period_bytes: u32,
    container_bytes: u8,
    feed: Option<&'a dyn DmaListener>,
    preload: bool,
}

impl<'a> DmaStage<'a> {
    /// Gateway stage for `desc` on controller `dma`.
    ///
    /// # Errors
    ///
    /// [`CompError::InvalidArgument`] unless `desc` describes a host or link
    /// gateway.
    pub fn new(desc: &CompDesc, dma: &'a dyn DmaOps<'a>) -> Result<Self, CompError> {
        let direction = match (desc.comp_type, desc.direction) {
            (CompType::Host, StreamDirection::Playback) => DmaDirection::HmemToLmem,
            (CompType::Host, StreamDirection::Capture) => DmaDirection::LmemToHmem,
            (CompType::Dai, StreamDirection::Playback) => DmaDirection::MemToDev,
            (CompType::Dai, StreamDirection::Capture) => DmaDirection::DevToMem,
            (CompType::Switch, _) => return Err(CompError::InvalidArgument),
        };
        Ok(Self {
            comp_id: desc.id,
            comp_type: desc.comp_type,
            direction,
            dma,
            channel: None,
            period_bytes: 0,
            container_bytes: 0,
            feed: None,
            preload: false,
        })
    }

    /// Account DMA copies through `feed` instead of inline.
    ///
    /// The feed is registered as the channel callback at the next prepare.
    pub fn attach_feed(&mut self, feed: &'a dyn DmaListener) {
        self.feed = Some(feed);
    }

    /// Gateway direction of this stage.
    pub fn direction(&self) -> DmaDirection {
        self.direction
    }

    /// DMA channel, once prepared.
    pub fn channel(&self) -> Option<usize> {
        self.channel
    }

    /// The ring the DMA works on.
    fn ring<'b, 'l>(&self, io: &StageIo<'b, 'l>) -> Option<&'b CompBuffer<'l>> {
        if self.direction.is_input() {
            io.sink
        } else {
            io.source
        }
    }

    fn channel_or_err(&self) -> Result<usize, CompError> {
        self.channel.ok_or(CompError::InvalidState)
    }

    fn program(&mut self, ring: &CompBuffer<'_>) -> Result<(), CompError> {
        let status = ring.status();
        if self.period_bytes == 0 || status.size.checked_rem(self.period_bytes) != Some(0) {
            error!(
                "gateway {}: ring {} is not a whole number of {}-byte periods",
                self.comp_id, status.size, self.period_bytes
            );
            return Err(CompError::InvalidArgument);
        }

        let mut elems: heapless::Vec<SgElem, MAX_RING_PERIODS> = heapless::Vec::new();
        let mut local = status.addr;
        let end = status.addr.saturating_add(status.size);
        while local < end {
            // The far end belongs to the gateway; only the local side is
            // described.
            let elem = if self.direction.is_input() {
                SgElem { src: 0, dest: local, size: self.period_bytes }
            } else {
                SgElem { src: local, dest: 0, size: self.period_bytes }
            };
            elems.push(elem).map_err(|_| CompError::NoResource)?;
            local = local.saturating_add(self.period_bytes);
        }

        let width = u32::from(self.container_bytes);
        let config = SgConfig {
            direction: self.direction,
            src_width: width,
            dest_width: width,
            cyclic: true,
            irq_disabled: true,
            elems: &elems,
        };

        let channel = match self.channel {
            Some(ch) => ch,
            None => {
                let ch = self.dma.acquire()?;
                self.channel = Some(ch);
                ch
            }
        };
        self.dma.set_config(channel, &config)?;
        self.dma.set_callback(channel, DmaCbType::COPY, self.feed)?;
        debug!(
            "gateway {}: ch {} {:?}, {} periods",
            self.comp_id,
            channel,
            self.direction,
            elems.len()
        );
        Ok(())
    }

    fn release_channel(&mut self) -> Result<(), CompError> {
        if let Some(ch) = self.channel.take() {
            self.dma.channel_put(ch)?;
        }
        Ok(())
    }
}

impl Component for DmaStage<'_> {
    fn comp_type(&self) -> CompType {
        self.comp_type
    }

    fn is_dma_connected(&self) -> bool {
        true
    }

    fn set_stream_params(&mut self, params: &StreamParams) -> Result<(), CompError> {
        if params.period_bytes == 0 || !matches!(params.container_bytes, 2 | 4) {
            return Err(CompError::InvalidArgument);
        }
        self.period_bytes = params.period_bytes;
        self.container_bytes = params.container_bytes;
        Ok(())
    }

    fn handle_command(&mut self, cmd: CompCommand, _io: &StageIo<'_, '_>) -> Result<(), CompError> {
        let CompCommand::Trigger(cmd) = cmd else {
            return Err(CompError::InvalidArgument);
        };
        let ch = self.channel_or_err()?;
        match cmd {
            TriggerCmd::Start => {
                self.dma.start(ch)?;
                self.preload = self.direction == DmaDirection::HmemToLmem;
            }
            TriggerCmd::Stop => self.dma.stop(ch)?,
            TriggerCmd::Pause => self.dma.pause(ch)?,
            TriggerCmd::Release => {
                self.dma.release(ch)?;
                self.dma.resume(ch)?;
            }
            TriggerCmd::Prepare | TriggerCmd::Reset => {}
        }
        Ok(())
    }

    fn prepare(&mut self, io: &StageIo<'_, '_>) -> Result<(), CompError> {
        let ring = self.ring(io).ok_or(CompError::NotFound)?;
        self.program(ring)
    }

    fn copy(&mut self, io: &StageIo<'_, '_>) -> Result<u32, CompError> {
        let ch = self.channel_or_err()?;
        let ring = self.ring(io).ok_or(CompError::NotFound)?;

        let level = self.dma.get_data_size(ch)?;
        let bytes = if self.direction.is_input() {
            level.avail.min(ring.free())
        } else {
            level.free.min(ring.avail())
        }
        .min(self.period_bytes);
        if bytes == 0 {
            return Ok(0);
        }

        let flags = if self.preload {
            CopyFlags::PRELOAD
        } else {
            CopyFlags::empty()
        };
        match self.dma.copy(ch, bytes, flags) {
            Ok(()) => self.preload = false,
            // The host has not filled the ring yet; try again next period.
            Err(DmaError::NoData) => return Ok(0),
            Err(e) => return Err(e.into()),
        }

        if self.feed.is_none() {
            if self.direction.is_input() {
                ring.produce(io.cache, bytes)?;
            } else {
                ring.consume(io.cache, bytes)?;
            }
        }
        trace!("gateway {}: {} bytes", self.comp_id, bytes);
        Ok(bytes)
    }

    fn reset(&mut self) -> Result<(), CompError> {
        self.preload = false;
        self.release_channel()
    }

    fn destroy(&mut self) {
        if let Err(e) = self.release_channel() {
            warn!("gateway {}: channel release failed: {}", self.comp_id, e);
        }
    }
}

/// Driver building gateway stages on the controller named by
/// [`CompDesc::dma_id`].
pub struct GatewayDriver<'r, 'a, const N: usize> {
    comp_type: CompType,
    dmas: &'r DmaRegistry<'a, N>,
}

impl<'r, 'a, const N: usize> GatewayDriver<'r, 'a, N> {
    /// Driver for `comp_type` (`Host` or `Dai`) over the controllers in `dmas`.
    pub const fn new(comp_type: CompType, dmas: &'r DmaRegistry<'a, N>) -> Self {
        Self { comp_type, dmas }
    }
}

impl<'a, const N: usize> ComponentDriver<Stage<'a>> for GatewayDriver<'_, 'a, N> {
    fn comp_type(&self) -> CompType {
        self.comp_type
    }

    fn create(&self, desc: &CompDesc) -> Result<Stage<'a>, CompError> {
        let Some(dma) = self.dmas.get(desc.dma_id) else {
            error!("gateway {}: no DMA controller {}", desc.id, desc.dma_id);
            return Err(CompError::NotFound);
        };
        trace!("gateway {}: new on dma {}", desc.id, desc.dma_id);
        Ok(Stage::Gateway(DmaStage::new(desc, dma)?))
    }
}
