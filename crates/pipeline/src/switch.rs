//! Switch stage.
//!
//! A structural placeholder: it sits in the graph so buffers have a node to
//! attach to, but does no per-period work. Every operation succeeds without
//! touching its buffers.

use crate::component::{
    CompCommand, CompDesc, CompError, CompType, Component, ComponentDriver, StageIo, StreamParams,
};

/// Placeholder stage.
#[derive(Debug, Clone, Copy, Default)]
pub struct Switch;

impl Component for Switch {
    fn comp_type(&self) -> CompType {
        CompType::Switch
    }

    fn set_stream_params(&mut self, _params: &StreamParams) -> Result<(), CompError> {
        Ok(())
    }

    fn handle_command(&mut self, _cmd: CompCommand, _io: &StageIo<'_, '_>) -> Result<(), CompError> {
        Ok(())
    }

    fn prepare(&mut self, _io: &StageIo<'_, '_>) -> Result<(), CompError> {
        Ok(())
    }

    fn copy(&mut self, _io: &StageIo<'_, '_>) -> Result<u32, CompError> {
        Ok(0)
    }

    fn reset(&mut self) -> Result<(), CompError> {
        Ok(())
    }

    fn destroy(&mut self) {}
}

/// Driver building [`Switch`] stages into any stage type that can hold one.
#[derive(Debug, Clone, Copy, Default)]
pub struct SwitchDriver;

impl<S: From<Switch>> ComponentDriver<S> for SwitchDriver {
    fn comp_type(&self) -> CompType {
        CompType::Switch
    }

    fn create(&self, desc: &CompDesc) -> Result<S, CompError> {
        trace!("switch {}: new", desc.id);
        Ok(S::from(Switch))
    }
}
