//! The closed set of stage kinds this firmware builds.

use pipeline::{
    CompCommand, CompError, CompType, Component, StageIo, StreamParams, Switch,
};

use super::gateway::DmaStage;

/// Any stage a pipeline of this firmware can hold.
pub enum Stage<'a> {
    /// Placeholder without per-period work.
    Switch(Switch),
    /// Host or link gateway.
    Gateway(DmaStage<'a>),
}

impl<'a> Stage<'a> {
    /// The gateway stage, if this is one.
    pub fn as_gateway_mut(&mut self) -> Option<&mut DmaStage<'a>> {
        match self {
            Self::Gateway(g) => Some(g),
            Self::Switch(_) => None,
        }
    }

    /// The gateway stage, if this is one.
    pub fn as_gateway(&self) -> Option<&DmaStage<'a>> {
        match self {
            Self::Gateway(g) => Some(g),
            Self::Switch(_) => None,
        }
    }
}

impl From<Switch> for Stage<'_> {
    fn from(s: Switch) -> Self {
        Self::Switch(s)
    }
}

impl<'a> From<DmaStage<'a>> for Stage<'a> {
    fn from(g: DmaStage<'a>) -> Self {
        Self::Gateway(g)
    }
}

macro_rules! delegate {
    ($self:ident, $s:ident => $e:expr) => {
        match $self {
            Stage::Switch($s) => $e,
            Stage::Gateway($s) => $e,
        }
    };
}

impl Component for Stage<'_> {
    fn comp_type(&self) -> CompType {
        delegate!(self, s => s.comp_type())
    }

    fn is_dma_connected(&self) -> bool {
        delegate!(self, s => s.is_dma_connected())
    }

    fn set_stream_params(&mut self, params: &StreamParams) -> Result<(), CompError> {
        delegate!(self, s => s.set_stream_params(params))
    }

    fn handle_command(&mut self, cmd: CompCommand, io: &StageIo<'_, '_>) -> Result<(), CompError> {
        delegate!(self, s => s.handle_command(cmd, io))
    }

    fn prepare(&mut self, io: &StageIo<'_, '_>) -> Result<(), CompError> {
        delegate!(self, s => s.prepare(io))
    }

    fn copy(&mut self, io: &StageIo<'_, '_>) -> Result<u32, CompError> {
        delegate!(self, s => s.copy(io))
    }

    fn reset(&mut self) -> Result<(), CompError> {
        delegate!(self, s => s.reset())
    }

    fn destroy(&mut self) {
        delegate!(self, s => s.destroy())
    }
}
