//! Component driver registry.
//!
//! Built once at startup from the drivers the firmware links in, then
//! passed by reference to whatever constructs pipelines. There is no global
//! table.

use crate::component::{CompDesc, CompError, CompType, ComponentDriver};

/// Lookup from [`CompType`] to the driver that builds it.
pub struct ComponentRegistry<'r, S, const N: usize> {
    drivers: heapless::Vec<&'r dyn ComponentDriver<S>, N>,
}

impl<'r, S, const N: usize> ComponentRegistry<'r, S, N> {
    /// Empty registry.
    pub const fn new() -> Self {
        Self {
            drivers: heapless::Vec::new(),
        }
    }

    /// Add a driver.
    ///
    /// # Errors
    ///
    /// [`CompError::Busy`] if a driver for the same type is registered,
    /// [`CompError::NoResource`] if the table is full.
    pub fn register(&mut self, driver: &'r dyn ComponentDriver<S>) -> Result<(), CompError> {
        let ty = driver.comp_type();
        if self.get(ty).is_some() {
            return Err(CompError::Busy);
        }
        self.drivers.push(driver).map_err(|_| CompError::NoResource)?;
        debug!("registry: driver for {:?} registered", ty);
        Ok(())
    }

    /// Driver for `ty`, if registered.
    pub fn get(&self, ty: CompType) -> Option<&'r dyn ComponentDriver<S>> {
        self.drivers.iter().copied().find(|d| d.comp_type() == ty)
    }

    /// Build a stage with the driver matching `desc.comp_type`.
    ///
    /// # Errors
    ///
    /// [`CompError::NotFound`] without a matching driver, otherwise whatever
    /// the driver returns.
    pub fn create(&self, desc: &CompDesc) -> Result<S, CompError> {
        let Some(driver) = self.get(desc.comp_type) else {
            error!("registry: no driver for comp {}", desc.id);
            return Err(CompError::NotFound);
        };
        driver.create(desc)
    }

    /// Number of registered drivers.
    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    /// `true` when no driver is registered.
    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }
}

impl<S, const N: usize> Default for ComponentRegistry<'_, S, N> {
    fn default() -> Self {
        Self::new()
    }
}
