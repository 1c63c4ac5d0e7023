//! End-to-end: host gateway to ring to link gateway, scheduled by EDF.
// Integration test file: unwrap and test arithmetic are intentional.
#![allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]
//!
//! Both gateways run on mock register files. The test plays the hardware
//! side by setting the gateway status flags, then lets the scheduler drive
//! one `copy` per stage per period.
//!
//! Run with: cargo test -p firmware --test gateway_pipeline

use firmware::audio::{BufferFeed, FeedSide};
use firmware::dma::hda::DmaServices;
use firmware::dma::regs::{Dgcs, DGBBA, DGBFPI, DGBS, DGCS};
use firmware::dma::DmaChanState;
use firmware::{DmaRegistry, EdfScheduler, GatewayKind, HdaDma, Stage, StageDrivers, TaskDesc};
use pipeline::{
    BufferDesc, CompBuffer, CompDesc, CompError, CompState, CompType, Pipeline, StreamDirection,
    StreamParams, TriggerCmd,
};
use platform::mocks::{MockCycleCounter, MockRegisters, RecordingCache, RecordingPm, SteppingTimer};
use platform::{CapabilityHeap, ClockInfo, FreqEntry, MemCaps, PlatformConfig, Region};

const HOST_BASE: u32 = 0x1000;
const LINK_BASE: u32 = 0x2000;
const PERIOD: u64 = 38_400;

fn heap() -> CapabilityHeap<4> {
    CapabilityHeap::new(
        Region {
            addr: 0x4000,
            size: 0x4000,
        },
        MemCaps::RAM | MemCaps::DMA,
        0x80,
    )
}

fn params() -> StreamParams {
    StreamParams {
        direction: StreamDirection::Playback,
        rate: 48_000,
        channels: 2,
        container_bytes: 2,
        period_bytes: 192,
    }
}

fn desc(id: u32, comp_type: CompType, dma_id: u32) -> CompDesc {
    CompDesc {
        id,
        comp_type,
        pipeline_id: 1,
        core: 0,
        direction: StreamDirection::Playback,
        dma_id,
    }
}

/// Report the host ring as filled by the host.
fn host_ring_full(regs: &MockRegisters) {
    let dgcs = regs.peek(HOST_BASE + DGCS);
    regs.poke(HOST_BASE + DGCS, dgcs | Dgcs::BF.bits());
}

#[test]
fn playback_periods_flow_host_to_link() {
    let regs = MockRegisters::new();
    let timer = SteppingTimer::new(0, 100);
    let pm = RecordingPm::new();
    let cycles = MockCycleCounter::new();
    let cache = RecordingCache::new();
    let h = heap();
    let ring = CompBuffer::new(&BufferDesc { id: 100, size: 384, caps: MemCaps::DMA }, &h).unwrap();

    let services = DmaServices { regs: &regs, timer: &timer, pm: &pm };
    let config = PlatformConfig::default();
    let host = HdaDma::new(0, GatewayKind::Host, HOST_BASE, config, services);
    let link = HdaDma::new(1, GatewayKind::Link, LINK_BASE, config, services);
    let mut dmas: DmaRegistry<'_, 2> = DmaRegistry::new();
    dmas.register(&host).unwrap();
    dmas.register(&link).unwrap();
    dmas.probe_all().unwrap();

    let drivers = StageDrivers::new(&dmas);
    let registry = drivers.registry().unwrap();
    let mut p: Pipeline<'_, '_, Stage<'_>, 4, 2> = Pipeline::new(1, &cache);
    p.create(&registry, &desc(1, CompType::Host, 0)).unwrap();
    p.create(&registry, &desc(2, CompType::Dai, 1)).unwrap();
    p.connect(1, &ring, 2).unwrap();
    p.set_stream_params(&params()).unwrap();
    p.prepare().unwrap();
    p.trigger(TriggerCmd::Start).unwrap();
    assert_eq!(p.state(1), Some(CompState::Active));
    assert_eq!(host.channel_state(0), Ok(DmaChanState::Active));
    assert_eq!(link.channel_state(0), Ok(DmaChanState::Active));
    assert_eq!(dmas.busy_channels(), 2);

    // The output link starts with its whole ring handed to the gateway.
    assert_eq!(regs.writes_to(LINK_BASE + DGBFPI).as_slice(), &[384]);
    regs.clear_writes();

    let clock = ClockInfo::from_entry(FreqEntry::new(38_400_000));
    let mut edf: EdfScheduler<'_, 4> = EdfScheduler::new(0, &cycles);
    let host_task = TaskDesc::for_stage(1, &desc(1, CompType::Host, 0), &params(), &clock, 0).unwrap();
    let mut link_task = TaskDesc::for_stage(2, &desc(2, CompType::Dai, 1), &params(), &clock, 0).unwrap();
    link_task.priority = 1;
    assert_eq!(host_task.period, PERIOD);
    edf.register(host_task).unwrap();
    edf.register(link_task).unwrap();

    // Host has not filled the ring yet: the preload copy waits.
    assert_eq!(edf.tick(0, &mut p), 2);
    assert_eq!(ring.avail(), 0);
    assert!(regs.writes_to(HOST_BASE + DGBFPI).is_empty());

    host_ring_full(&regs);
    let mut now = PERIOD;
    for _ in 0..4 {
        assert_eq!(edf.tick(now, &mut p), 2);
        // One period in, the same period out.
        assert_eq!(ring.avail(), 0);
        now += PERIOD;
    }

    // The preload copy does not advance the host fill pointer; the three
    // periods after it do.
    assert_eq!(regs.writes_to(HOST_BASE + DGBFPI).as_slice(), &[192, 192, 192]);
    assert_eq!(regs.writes_to(LINK_BASE + DGBFPI).as_slice(), &[192, 192, 192, 192]);
    assert_eq!(edf.stats(1).map(|s| (s.runs, s.errors, s.misses)), Some((5, 0, 0)));

    p.trigger(TriggerCmd::Stop).unwrap();
    assert_eq!(host.channel_state(0), Ok(DmaChanState::Configured));
    p.reset().unwrap();
    assert_eq!(dmas.busy_channels(), 0);
    p.teardown(&h).unwrap();
}

#[test]
fn feed_accounts_host_copies() {
    let regs = MockRegisters::new();
    let timer = SteppingTimer::new(0, 100);
    let pm = RecordingPm::new();
    let cache = RecordingCache::new();
    let h = heap();
    let ring = CompBuffer::new(&BufferDesc { id: 100, size: 384, caps: MemCaps::DMA }, &h).unwrap();
    let feed = BufferFeed::new(&ring, &cache, FeedSide::Produce);

    let services = DmaServices { regs: &regs, timer: &timer, pm: &pm };
    let host = HdaDma::new(0, GatewayKind::Host, HOST_BASE, PlatformConfig::default(), services);
    let mut dmas: DmaRegistry<'_, 1> = DmaRegistry::new();
    dmas.register(&host).unwrap();
    dmas.probe_all().unwrap();

    let drivers = StageDrivers::new(&dmas);
    let registry = drivers.registry().unwrap();
    let mut p: Pipeline<'_, '_, Stage<'_>, 2, 1> = Pipeline::new(1, &cache);
    p.create(&registry, &desc(1, CompType::Host, 0)).unwrap();
    p.create(&registry, &desc(2, CompType::Switch, 0)).unwrap();
    p.connect(1, &ring, 2).unwrap();
    p.component_mut(1)
        .and_then(Stage::as_gateway_mut)
        .unwrap()
        .attach_feed(&feed);

    p.set_stream_params(&params()).unwrap();
    p.prepare().unwrap();
    p.trigger(TriggerCmd::Start).unwrap();
    host_ring_full(&regs);

    assert_eq!(p.copy(1), Ok(192));
    assert_eq!(ring.avail(), 192);
    assert_eq!(p.copy(1), Ok(192));
    assert_eq!(ring.avail(), 384);
    // Ring full: nothing to move.
    assert_eq!(p.copy(1), Ok(0));
    assert_eq!(pm.puts(), 3);
}

#[test]
fn failed_link_start_stops_the_host_gateway() {
    let regs = MockRegisters::new();
    let timer = SteppingTimer::new(0, 100);
    let pm = RecordingPm::new();
    let cache = RecordingCache::new();
    let h = heap();
    let ring = CompBuffer::new(&BufferDesc { id: 100, size: 384, caps: MemCaps::DMA }, &h).unwrap();

    let services = DmaServices { regs: &regs, timer: &timer, pm: &pm };
    let host = HdaDma::new(0, GatewayKind::Host, HOST_BASE, PlatformConfig::default(), services);
    let link = HdaDma::new(1, GatewayKind::Link, LINK_BASE, PlatformConfig::default(), services);
    let mut dmas: DmaRegistry<'_, 2> = DmaRegistry::new();
    dmas.register(&host).unwrap();
    dmas.register(&link).unwrap();
    dmas.probe_all().unwrap();

    let drivers = StageDrivers::new(&dmas);
    let registry = drivers.registry().unwrap();
    let mut p: Pipeline<'_, '_, Stage<'_>, 4, 2> = Pipeline::new(1, &cache);
    p.create(&registry, &desc(1, CompType::Host, 0)).unwrap();
    p.create(&registry, &desc(2, CompType::Dai, 1)).unwrap();
    p.connect(1, &ring, 2).unwrap();
    p.set_stream_params(&params()).unwrap();
    p.prepare().unwrap();

    // The link gateway is still enabled from an earlier user.
    regs.poke(LINK_BASE + DGCS, Dgcs::GEN.bits());
    assert_eq!(p.trigger(TriggerCmd::Start), Err(CompError::Busy));
    assert_eq!(p.state(1), Some(CompState::Prepare));
    assert_eq!(p.state(2), Some(CompState::Prepare));
    assert_eq!(host.channel_state(0), Ok(DmaChanState::Configured));
    assert!(!Dgcs::from_bits_retain(regs.peek(HOST_BASE + DGCS)).contains(Dgcs::GEN));

    regs.poke(LINK_BASE + DGCS, 0);
    p.trigger(TriggerCmd::Start).unwrap();
    assert_eq!(host.channel_state(0), Ok(DmaChanState::Active));
    assert_eq!(link.channel_state(0), Ok(DmaChanState::Active));

    p.trigger(TriggerCmd::Stop).unwrap();
    p.reset().unwrap();
    assert_eq!(dmas.busy_channels(), 0);
    p.teardown(&h).unwrap();
}

#[test]
fn ring_is_reprogrammed_only_through_reset() {
    let regs = MockRegisters::new();
    let timer = SteppingTimer::new(0, 100);
    let pm = RecordingPm::new();
    let cache = RecordingCache::new();
    let h = heap();
    let ring = CompBuffer::new(&BufferDesc { id: 100, size: 384, caps: MemCaps::DMA }, &h).unwrap();

    let services = DmaServices { regs: &regs, timer: &timer, pm: &pm };
    let host = HdaDma::new(0, GatewayKind::Host, HOST_BASE, PlatformConfig::default(), services);
    let mut dmas: DmaRegistry<'_, 1> = DmaRegistry::new();
    dmas.register(&host).unwrap();
    dmas.probe_all().unwrap();

    let drivers = StageDrivers::new(&dmas);
    let registry = drivers.registry().unwrap();
    let mut p: Pipeline<'_, '_, Stage<'_>, 2, 1> = Pipeline::new(1, &cache);
    p.create(&registry, &desc(1, CompType::Host, 0)).unwrap();
    p.create(&registry, &desc(2, CompType::Switch, 0)).unwrap();
    p.connect(1, &ring, 2).unwrap();
    p.set_stream_params(&params()).unwrap();
    p.prepare().unwrap();
    assert_eq!(regs.peek(HOST_BASE + DGBBA), ring.status().addr);
    assert_eq!(regs.peek(HOST_BASE + DGBS), 384);

    // The gateway holds the ring's address; the storage must not move.
    assert_eq!(p.resize_buffer(100, &h, 768), Err(CompError::Busy));
    assert_eq!(ring.size(), 384);

    p.reset().unwrap();
    p.resize_buffer(100, &h, 768).unwrap();
    p.prepare().unwrap();
    p.trigger(TriggerCmd::Start).unwrap();
    assert_eq!(regs.peek(HOST_BASE + DGBBA), ring.status().addr);
    assert_eq!(regs.peek(HOST_BASE + DGBS), 768);

    p.trigger(TriggerCmd::Stop).unwrap();
    p.reset().unwrap();
    p.teardown(&h).unwrap();
    assert_eq!(h.live_blocks(), 0);
}

#[test]
fn pause_and_release_resume_without_refilling_the_link() {
    let regs = MockRegisters::new();
    let timer = SteppingTimer::new(0, 100);
    let pm = RecordingPm::new();
    let cache = RecordingCache::new();
    let h = heap();
    let ring = CompBuffer::new(&BufferDesc { id: 100, size: 384, caps: MemCaps::DMA }, &h).unwrap();

    let services = DmaServices { regs: &regs, timer: &timer, pm: &pm };
    let host = HdaDma::new(0, GatewayKind::Host, HOST_BASE, PlatformConfig::default(), services);
    let link = HdaDma::new(1, GatewayKind::Link, LINK_BASE, PlatformConfig::default(), services);
    let mut dmas: DmaRegistry<'_, 2> = DmaRegistry::new();
    dmas.register(&host).unwrap();
    dmas.register(&link).unwrap();
    dmas.probe_all().unwrap();

    let drivers = StageDrivers::new(&dmas);
    let registry = drivers.registry().unwrap();
    let mut p: Pipeline<'_, '_, Stage<'_>, 4, 2> = Pipeline::new(1, &cache);
    p.create(&registry, &desc(1, CompType::Host, 0)).unwrap();
    p.create(&registry, &desc(2, CompType::Dai, 1)).unwrap();
    p.connect(1, &ring, 2).unwrap();
    p.set_stream_params(&params()).unwrap();
    p.prepare().unwrap();
    p.trigger(TriggerCmd::Start).unwrap();
    assert_eq!(regs.writes_to(LINK_BASE + DGBFPI).as_slice(), &[384]);
    regs.clear_writes();

    host_ring_full(&regs);
    assert_eq!(p.copy(1), Ok(192));
    assert_eq!(p.copy(2), Ok(192));

    p.trigger(TriggerCmd::Pause).unwrap();
    assert_eq!(p.state(2), Some(CompState::Paused));
    assert_eq!(host.channel_state(0), Ok(DmaChanState::Paused));
    assert_eq!(link.channel_state(0), Ok(DmaChanState::Paused));
    assert_eq!(p.copy(1), Err(CompError::InvalidState));

    p.trigger(TriggerCmd::Release).unwrap();
    assert_eq!(p.state(1), Some(CompState::Active));
    assert_eq!(host.channel_state(0), Ok(DmaChanState::Active));
    assert_eq!(link.channel_state(0), Ok(DmaChanState::Active));
    // Resuming keeps the link's fill level: no second full-ring push.
    assert_eq!(regs.writes_to(LINK_BASE + DGBFPI).as_slice(), &[192]);

    assert_eq!(p.copy(1), Ok(192));
    assert_eq!(ring.avail(), 192);
    assert_eq!(p.copy(2), Ok(192));
    assert_eq!(ring.avail(), 0);
    assert_eq!(regs.writes_to(HOST_BASE + DGBFPI).as_slice(), &[192]);
    assert_eq!(regs.writes_to(LINK_BASE + DGBFPI).as_slice(), &[192, 192]);

    p.trigger(TriggerCmd::Stop).unwrap();
    p.reset().unwrap();
    p.teardown(&h).unwrap();
}
