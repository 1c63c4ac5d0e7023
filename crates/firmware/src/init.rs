//! Startup wiring.
//!
//! Everything here is built once, before the first pipeline, and then only
//! borrowed. There are no global tables: the DMA registry and the stage
//! drivers are owned by whoever brings the DSP up and passed down by
//! reference.

use pipeline::{CompError, CompType, ComponentRegistry, SwitchDriver};

use crate::audio::{GatewayDriver, Stage};
use crate::dma::{DmaError, DmaOps};

/// Gateway DMA controllers known to the firmware, looked up by id.
pub struct DmaRegistry<'a, const N: usize> {
    dmas: heapless::Vec<&'a dyn DmaOps<'a>, N>,
}

impl<'a, const N: usize> DmaRegistry<'a, N> {
    /// Empty registry.
    pub const fn new() -> Self {
        Self {
            dmas: heapless::Vec::new(),
        }
    }

    /// Add a controller.
    ///
    /// # Errors
    ///
    /// [`DmaError::Busy`] if a controller with the same id is registered,
    /// [`DmaError::NoChannel`] if the table is full.
    pub fn register(&mut self, dma: &'a dyn DmaOps<'a>) -> Result<(), DmaError> {
        let id = dma.id();
        if self.get(id).is_some() {
            warn!("dma registry: controller {} registered twice", id);
            return Err(DmaError::Busy);
        }
        self.dmas.push(dma).map_err(|_| DmaError::NoChannel)?;
        debug!("dma registry: controller {} added", id);
        Ok(())
    }

    /// Controller `id`, if registered.
    pub fn get(&self, id: u32) -> Option<&'a dyn DmaOps<'a>> {
        self.dmas.iter().copied().find(|d| d.id() == id)
    }

    /// Probe every registered controller.
    ///
    /// Stops at the first failure; controllers probed before it stay probed.
    pub fn probe_all(&self) -> Result<(), DmaError> {
        for dma in &self.dmas {
            dma.probe().map_err(|e| {
                error!("dma registry: controller {} probe failed: {}", dma.id(), e);
                e
            })?;
        }
        info!("dma registry: {} controllers up", self.dmas.len());
        Ok(())
    }

    /// Channels in use across all controllers.
    pub fn busy_channels(&self) -> usize {
        self.dmas
            .iter()
            .map(|d| d.busy_channels())
            .fold(0, usize::saturating_add)
    }

    /// Number of registered controllers.
    pub fn len(&self) -> usize {
        self.dmas.len()
    }

    /// `true` when no controller is registered.
    pub fn is_empty(&self) -> bool {
        self.dmas.is_empty()
    }
}

impl<const N: usize> Default for DmaRegistry<'_, N> {
    fn default() -> Self {
        Self::new()
    }
}

/// The stage drivers this firmware links in.
pub struct StageDrivers<'r, 'a, const N: usize> {
    switch: SwitchDriver,
    host: GatewayDriver<'r, 'a, N>,
    dai: GatewayDriver<'r, 'a, N>,
}

impl<'r, 'a, const N: usize> StageDrivers<'r, 'a, N> {
    /// Drivers for switch, host and link gateway stages on `dmas`.
    pub const fn new(dmas: &'r DmaRegistry<'a, N>) -> Self {
        Self {
            switch: SwitchDriver,
            host: GatewayDriver::new(CompType::Host, dmas),
            dai: GatewayDriver::new(CompType::Dai, dmas),
        }
    }

    /// Component registry holding every driver.
    pub fn registry(&self) -> Result<ComponentRegistry<'_, Stage<'a>, 3>, CompError> {
        let mut reg = ComponentRegistry::new();
        reg.register(&self.switch)?;
        reg.register(&self.host)?;
        reg.register(&self.dai)?;
        Ok(reg)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::dma::{DmaChanState, GatewayKind, HdaDma};
    use crate::dma::hda::DmaServices;
    use pipeline::{CompDesc, StreamDirection};
    use platform::mocks::{MockRegisters, RecordingPm, SteppingTimer};
    use platform::PlatformConfig;

    fn desc(comp_type: CompType, dma_id: u32) -> CompDesc {
        CompDesc {
            id: 1,
            comp_type,
            pipeline_id: 1,
            core: 0,
            direction: StreamDirection::Playback,
            dma_id,
        }
    }

    #[test]
    fn lookup_by_controller_id() {
        let regs = MockRegisters::new();
        let timer = SteppingTimer::new(0, 1);
        let pm = RecordingPm::new();
        let services = DmaServices { regs: &regs, timer: &timer, pm: &pm };
        let host = HdaDma::new(0, GatewayKind::Host, 0x1000, PlatformConfig::default(), services);
        let link = HdaDma::new(1, GatewayKind::Link, 0x2000, PlatformConfig::default(), services);
        let third = HdaDma::new(2, GatewayKind::Link, 0x3000, PlatformConfig::default(), services);

        let mut dmas: DmaRegistry<'_, 2> = DmaRegistry::new();
        dmas.register(&host).unwrap();
        assert_eq!(dmas.register(&host).err(), Some(DmaError::Busy));
        dmas.register(&link).unwrap();
        assert_eq!(dmas.register(&third).err(), Some(DmaError::NoChannel));
        assert_eq!(dmas.len(), 2);

        dmas.probe_all().unwrap();
        assert_eq!(dmas.get(1).map(|d| d.id()), Some(1));
        assert!(dmas.get(7).is_none());

        let ch = host.acquire().unwrap();
        assert_eq!(host.channel_state(ch), Ok(DmaChanState::Ready));
        assert_eq!(dmas.busy_channels(), 1);

        // Probing again fails on the first controller.
        assert_eq!(dmas.probe_all(), Err(DmaError::Busy));
    }

    #[test]
    fn registry_builds_every_stage_kind() {
        let regs = MockRegisters::new();
        let timer = SteppingTimer::new(0, 1);
        let pm = RecordingPm::new();
        let services = DmaServices { regs: &regs, timer: &timer, pm: &pm };
        let host = HdaDma::new(0, GatewayKind::Host, 0x1000, PlatformConfig::default(), services);

        let mut dmas: DmaRegistry<'_, 2> = DmaRegistry::new();
        dmas.register(&host).unwrap();
        let drivers = StageDrivers::new(&dmas);
        let reg = drivers.registry().unwrap();
        assert_eq!(reg.len(), 3);

        assert!(matches!(reg.create(&desc(CompType::Switch, 0)), Ok(Stage::Switch(_))));
        assert!(matches!(reg.create(&desc(CompType::Host, 0)), Ok(Stage::Gateway(_))));
        assert_eq!(reg.create(&desc(CompType::Dai, 5)).err(), Some(CompError::NotFound));
    }
}
