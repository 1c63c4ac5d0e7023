//! Pipeline graph.
//!
//! A [`Pipeline`] owns its stages and borrows the ring buffers connecting
//! them. It enforces the topology rules (one source and one sink buffer per
//! stage, one producer and one consumer per buffer), keeps the lifecycle
//! state of every stage, and fans triggers out to all of them.
//!
//! Buffers are borrowed rather than owned so that DMA completion adapters can
//! hold long-lived references to the same buffers.

use crate::buffer::{CompBuffer, Endpoint};
use crate::component::{
    next_state, CompCommand, CompDesc, CompError, CompState, Component, StageIo, StreamParams,
    TriggerCmd,
};
use crate::registry::ComponentRegistry;
use platform::{DcacheOps, RegionAllocator};

struct Node<S> {
    id: u32,
    state: CompState,
    comp: S,
}

#[derive(Clone, Copy)]
struct Edge<'a, 'l> {
    buffer: &'a CompBuffer<'l>,
    source: u32,
    sink: u32,
}

/// Stages of one pipeline and the buffers between them.
///
/// `NC` bounds the number of stages, `NB` the number of buffers.
pub struct Pipeline<'a, 'l, S, const NC: usize, const NB: usize> {
    id: u32,
    cache: &'a dyn DcacheOps,
    nodes: heapless::Vec<Node<S>, NC>,
    edges: heapless::Vec<Edge<'a, 'l>, NB>,
}

impl<'a, 'l, S: Component, const NC: usize, const NB: usize> Pipeline<'a, 'l, S, NC, NB> {
    /// Empty pipeline. `cache` performs maintenance for all its buffers.
    pub fn new(id: u32, cache: &'a dyn DcacheOps) -> Self {
        Self {
            id,
            cache,
            nodes: heapless::Vec::new(),
            edges: heapless::Vec::new(),
        }
    }

    /// Pipeline id.
    pub fn id(&self) -> u32 {
        self.id
    }

    // ── Construction ─────────────────────────────────────────────────────────

    /// Insert an already-built stage.
    ///
    /// # Errors
    ///
    /// [`CompError::Busy`] for a duplicate id, [`CompError::NoResource`]
    /// when the stage table is full.
    pub fn add(&mut self, id: u32, comp: S) -> Result<(), CompError> {
        if self.node_index(id).is_some() {
            return Err(CompError::Busy);
        }
        self.nodes
            .push(Node {
                id,
                state: CompState::Init,
                comp,
            })
            .map_err(|_| CompError::NoResource)?;
        debug!("pipeline {}: comp {} added", self.id, id);
        Ok(())
    }

    /// Build a stage through `registry` and insert it.
    ///
    /// # Errors
    ///
    /// [`CompError::InvalidArgument`] if `desc` names another pipeline, plus
    /// the errors of [`ComponentRegistry::create`] and [`Self::add`].
    pub fn create<const N: usize>(
        &mut self,
        registry: &ComponentRegistry<'_, S, N>,
        desc: &CompDesc,
    ) -> Result<(), CompError> {
        if desc.pipeline_id != self.id {
            error!("pipeline {}: comp {} belongs to pipeline {}", self.id, desc.id, desc.pipeline_id);
            return Err(CompError::InvalidArgument);
        }
        let comp = registry.create(desc)?;
        self.add(desc.id, comp)
    }

    /// Connect `buffer` from stage `source` to stage `sink`.
    ///
    /// # Errors
    ///
    /// - [`CompError::NotFound`] if either stage is missing.
    /// - [`CompError::InvalidArgument`] if `source == sink`.
    /// - [`CompError::Busy`] if the buffer is already connected, `source`
    ///   already has a sink buffer or `sink` already has a source buffer.
    /// - [`CompError::NoResource`] if the buffer table is full.
    pub fn connect(&mut self, source: u32, buffer: &'a CompBuffer<'l>, sink: u32) -> Result<(), CompError> {
        if source == sink {
            return Err(CompError::InvalidArgument);
        }
        let src_dma = self.node(source).ok_or(CompError::NotFound)?.comp.is_dma_connected();
        let sink_dma = self.node(sink).ok_or(CompError::NotFound)?.comp.is_dma_connected();

        let taken = self
            .edges
            .iter()
            .any(|e| e.buffer.id() == buffer.id() || e.source == source || e.sink == sink);
        if taken {
            return Err(CompError::Busy);
        }

        self.edges
            .push(Edge { buffer, source, sink })
            .map_err(|_| CompError::NoResource)?;
        buffer.link_source(Some(Endpoint {
            comp_id: source,
            dma_connected: src_dma,
        }));
        buffer.link_sink(Some(Endpoint {
            comp_id: sink,
            dma_connected: sink_dma,
        }));
        debug!("pipeline {}: buffer {} connects {} -> {}", self.id, buffer.id(), source, sink);
        Ok(())
    }

    /// Remove buffer `buffer_id` from the graph and unlink it from both
    /// stages. The buffer keeps its storage.
    ///
    /// # Errors
    ///
    /// [`CompError::NotFound`] for an unknown buffer, [`CompError::Busy`]
    /// while an adjacent stage is prepared or streaming.
    pub fn disconnect(&mut self, buffer_id: u32) -> Result<&'a CompBuffer<'l>, CompError> {
        let idx = self.edge_index(buffer_id).ok_or(CompError::NotFound)?;
        self.check_unprepared_edge(idx)?;
        let edge = self.edges.remove(idx);
        edge.buffer.link_source(None);
        edge.buffer.link_sink(None);
        debug!("pipeline {}: buffer {} disconnected", self.id, buffer_id);
        Ok(edge.buffer)
    }

    /// Disconnect buffer `buffer_id`, then release its storage to `heap`.
    pub fn destroy_buffer(&mut self, buffer_id: u32, heap: &dyn RegionAllocator) -> Result<(), CompError> {
        let buffer = self.disconnect(buffer_id)?;
        buffer.destroy(heap)?;
        Ok(())
    }

    /// Resize buffer `buffer_id`.
    ///
    /// # Errors
    ///
    /// [`CompError::Busy`] while an adjacent stage is prepared or streaming
    /// (reset the pipeline first), plus the buffer's own errors.
    pub fn resize_buffer(&mut self, buffer_id: u32, heap: &dyn RegionAllocator, size: u32) -> Result<(), CompError> {
        let idx = self.edge_index(buffer_id).ok_or(CompError::NotFound)?;
        self.check_unprepared_edge(idx)?;
        let edge = self.edges.get(idx).ok_or(CompError::NotFound)?;
        edge.buffer.resize(heap, size)?;
        Ok(())
    }

    // ── Lifecycle ────────────────────────────────────────────────────────────

    /// Hand `params` to every stage; stages move to `Ready`.
    ///
    /// # Errors
    ///
    /// [`CompError::InvalidState`] unless every stage is `Init` or `Ready`.
    pub fn set_stream_params(&mut self, params: &StreamParams) -> Result<(), CompError> {
        if self
            .nodes
            .iter()
            .any(|n| !matches!(n.state, CompState::Init | CompState::Ready))
        {
            return Err(CompError::InvalidState);
        }
        for node in &mut self.nodes {
            node.comp.set_stream_params(params)?;
            node.state = CompState::Ready;
        }
        debug!("pipeline {}: params rate {} period {}", self.id, params.rate, params.period_bytes);
        Ok(())
    }

    /// Trigger `Prepare` on every stage.
    pub fn prepare(&mut self) -> Result<(), CompError> {
        self.trigger(TriggerCmd::Prepare)
    }

    /// Trigger `Reset` on every stage.
    pub fn reset(&mut self) -> Result<(), CompError> {
        self.trigger(TriggerCmd::Reset)
    }

    /// Apply `cmd` to every stage.
    ///
    /// All transitions are validated first, so a trigger that is invalid for
    /// any stage changes nothing. `Prepare` calls [`Component::prepare`],
    /// `Reset` calls [`Component::reset`], every other command goes through
    /// [`Component::handle_command`].
    ///
    /// When a stage fails, the stages already moved are taken back with the
    /// opposite command (`Start` is undone by `Stop`, `Pause` by `Release`
    /// and so on), leaving the whole pipeline in one state. `Stop` and
    /// `Reset` have no opposite: they reach every stage regardless and each
    /// stage lands in the target state.
    ///
    /// # Errors
    ///
    /// [`CompError::InvalidState`] if any stage rejects the transition, or
    /// the first error a stage returns.
    pub fn trigger(&mut self, cmd: TriggerCmd) -> Result<(), CompError> {
        let mut next: heapless::Vec<CompState, NC> = heapless::Vec::new();
        for node in &self.nodes {
            let state = next_state(node.state, cmd).map_err(|e| {
                warn!("pipeline {}: comp {} rejects {:?} in {:?}", self.id, node.id, cmd, node.state);
                e
            })?;
            next.push(state).map_err(|_| CompError::NoResource)?;
        }

        let undo = opposite(cmd);
        let mut first_err = None;
        for (applied, (node, state)) in self.nodes.iter_mut().zip(next).enumerate() {
            let io = Self::stage_io(&self.edges, self.cache, node.id);
            match apply(&mut node.comp, cmd, &io) {
                Ok(()) => node.state = state,
                Err(e) if undo.is_some() => {
                    error!("pipeline {}: comp {} failed {:?}: {}", self.id, node.id, cmd, e);
                    first_err = Some((applied, e));
                    break;
                }
                Err(e) => {
                    warn!("pipeline {}: comp {} failed {:?}: {}", self.id, node.id, cmd, e);
                    node.state = state;
                    first_err = first_err.or(Some((applied, e)));
                }
            }
        }

        match (first_err, undo) {
            (None, _) => {
                info!("pipeline {}: {:?}", self.id, cmd);
                Ok(())
            }
            (Some((failed, e)), Some(undo)) => {
                self.roll_back(undo, failed);
                Err(e)
            }
            (Some((_, e)), None) => Err(e),
        }
    }

    /// Apply `undo` to the first `count` stages, which just took the
    /// command being undone.
    fn roll_back(&mut self, undo: TriggerCmd, count: usize) {
        for node in self.nodes.iter_mut().take(count) {
            let io = Self::stage_io(&self.edges, self.cache, node.id);
            if let Err(e) = apply(&mut node.comp, undo, &io) {
                warn!("pipeline {}: comp {} could not {:?}: {}", self.id, node.id, undo, e);
            }
            if let Ok(state) = next_state(node.state, undo) {
                node.state = state;
            }
        }
        warn!("pipeline {}: rolled back {} stages with {:?}", self.id, count, undo);
    }

    /// Deliver a non-trigger command to one stage.
    pub fn command(&mut self, comp_id: u32, cmd: CompCommand) -> Result<(), CompError> {
        if matches!(cmd, CompCommand::Trigger(_)) {
            return Err(CompError::InvalidArgument);
        }
        let io = Self::stage_io(&self.edges, self.cache, comp_id);
        let node = self.node_mut(comp_id).ok_or(CompError::NotFound)?;
        node.comp.handle_command(cmd, &io)
    }

    /// Run one period of stage `comp_id`.
    ///
    /// # Errors
    ///
    /// [`CompError::NotFound`] for an unknown stage,
    /// [`CompError::InvalidState`] unless the stage is `Active`, otherwise
    /// the stage's own error.
    pub fn copy(&mut self, comp_id: u32) -> Result<u32, CompError> {
        let io = Self::stage_io(&self.edges, self.cache, comp_id);
        let node = self.node_mut(comp_id).ok_or(CompError::NotFound)?;
        if node.state != CompState::Active {
            return Err(CompError::InvalidState);
        }
        node.comp.copy(&io)
    }

    /// Destroy every buffer and stage.
    ///
    /// # Errors
    ///
    /// [`CompError::Busy`] while any stage is streaming; nothing is torn
    /// down in that case.
    pub fn teardown(&mut self, heap: &dyn RegionAllocator) -> Result<(), CompError> {
        if self
            .nodes
            .iter()
            .any(|n| matches!(n.state, CompState::Active | CompState::Paused))
        {
            return Err(CompError::Busy);
        }
        while let Some(edge) = self.edges.pop() {
            edge.buffer.link_source(None);
            edge.buffer.link_sink(None);
            if let Err(e) = edge.buffer.destroy(heap) {
                warn!("pipeline {}: buffer {} free failed: {}", self.id, edge.buffer.id(), e);
            }
        }
        while let Some(mut node) = self.nodes.pop() {
            node.comp.destroy();
        }
        info!("pipeline {}: torn down", self.id);
        Ok(())
    }

    // ── Queries ──────────────────────────────────────────────────────────────

    /// Lifecycle state of stage `comp_id`.
    pub fn state(&self, comp_id: u32) -> Option<CompState> {
        self.node(comp_id).map(|n| n.state)
    }

    /// Stage `comp_id`.
    pub fn component(&self, comp_id: u32) -> Option<&S> {
        self.node(comp_id).map(|n| &n.comp)
    }

    /// Stage `comp_id`, mutably.
    pub fn component_mut(&mut self, comp_id: u32) -> Option<&mut S> {
        self.node_mut(comp_id).map(|n| &mut n.comp)
    }

    /// Connected buffer `buffer_id`.
    pub fn buffer(&self, buffer_id: u32) -> Option<&'a CompBuffer<'l>> {
        self.edges.iter().find(|e| e.buffer.id() == buffer_id).map(|e| e.buffer)
    }

    /// Ids of all stages in insertion order.
    pub fn component_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.nodes.iter().map(|n| n.id)
    }

    /// Number of stages.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// `true` without stages.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    // ── Internals ────────────────────────────────────────────────────────────

    fn node_index(&self, id: u32) -> Option<usize> {
        self.nodes.iter().position(|n| n.id == id)
    }

    fn node(&self, id: u32) -> Option<&Node<S>> {
        self.nodes.iter().find(|n| n.id == id)
    }

    fn node_mut(&mut self, id: u32) -> Option<&mut Node<S>> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    fn edge_index(&self, buffer_id: u32) -> Option<usize> {
        self.edges.iter().position(|e| e.buffer.id() == buffer_id)
    }

    /// Refuse changes to a buffer a stage has already been prepared on.
    ///
    /// Prepared gateway stages hold the buffer's address and size in their
    /// DMA registers, so the buffer must stay put until the stages are reset.
    fn check_unprepared_edge(&self, idx: usize) -> Result<(), CompError> {
        let edge = self.edges.get(idx).ok_or(CompError::NotFound)?;
        let prepared = [edge.source, edge.sink].into_iter().any(|id| {
            self.state(id)
                .is_some_and(|s| matches!(s, CompState::Prepare | CompState::Active | CompState::Paused))
        });
        if prepared {
            warn!("pipeline {}: buffer {} in use by a prepared stage", self.id, edge.buffer.id());
            return Err(CompError::Busy);
        }
        Ok(())
    }

    fn stage_io(edges: &[Edge<'a, 'l>], cache: &'a dyn DcacheOps, id: u32) -> StageIo<'a, 'l> {
        StageIo {
            source: edges.iter().find(|e| e.sink == id).map(|e| e.buffer),
            sink: edges.iter().find(|e| e.source == id).map(|e| e.buffer),
            cache,
        }
    }
}

fn apply<S: Component>(comp: &mut S, cmd: TriggerCmd, io: &StageIo<'_, '_>) -> Result<(), CompError> {
    match cmd {
        TriggerCmd::Prepare => comp.prepare(io),
        TriggerCmd::Reset => comp.reset(),
        _ => comp.handle_command(CompCommand::Trigger(cmd), io),
    }
}

/// Command taking a stage back from the state `cmd` moved it to.
fn opposite(cmd: TriggerCmd) -> Option<TriggerCmd> {
    match cmd {
        TriggerCmd::Start => Some(TriggerCmd::Stop),
        TriggerCmd::Pause => Some(TriggerCmd::Release),
        TriggerCmd::Release => Some(TriggerCmd::Pause),
        TriggerCmd::Prepare => Some(TriggerCmd::Reset),
        TriggerCmd::Stop | TriggerCmd::Reset => None,
    }
}
