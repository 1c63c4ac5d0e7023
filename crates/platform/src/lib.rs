//! Hardware Abstraction Layer (HAL) for the audio DSP data path
//!
//! This crate provides trait-based abstractions for the hardware the data
//! path touches, enabling development and testing without physical
//! hardware.
//!
//! # Architecture Layers
//!
//! ```text
//! Firmware Layer (DMA engines, schedulers, stage adapters)
//!         ↓
//! Pipeline Layer (ring buffers, components, graph)
//!         ↓
//! Platform HAL (this crate - trait abstractions)
//!         ↓
//! Hardware Layer (MMIO, dcache, timers)
//! ```
//!
//! # Abstractions
//!
//! - [`RegisterIo`] - 32-bit device register access
//! - [`DcacheOps`] - data-cache invalidate / writeback
//! - [`PlatformTimer`] / [`CycleCounter`] - wall clock and core cycles
//! - [`PmRuntime`] - power-management references
//! - [`RegionAllocator`] - capability-classed buffer memory
//!
//! # Features
//!
//! - `std`: Enable standard library support and [`mocks`] (for testing)
//! - `hardware`: Physical hardware implementations
//! - `defmt`: Enable defmt logging
//! - `tracing`: Route logs to `tracing` (host builds)

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)] // no .unwrap() in production code
#![deny(clippy::expect_used)] // no .expect() in production code
#![deny(clippy::panic)] // no panic!() in production code
#![deny(clippy::unreachable)] // no unreachable!() that isn't documented
#![deny(unused_must_use)]
// all Results must be handled
// ────────────────────────────────────────────────────────────────────────────
#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(unsafe_op_in_unsafe_fn)] // unsafe fn body is not implicitly unsafe block
#![warn(clippy::print_stdout)] // prefer tracing/defmt over println! in lib code
// Pedantic lints suppressed for this hardware HAL crate:
#![allow(clippy::doc_markdown)] // hex addresses and register names in doc comments
#![allow(clippy::must_use_candidate)] // hardware accessors, callers decide
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

// This must go FIRST so that all the other modules see its macros.
#[macro_use]
mod fmt;

pub mod cache;
pub mod clock;
pub mod config;
pub mod io;
pub mod memory;
pub mod mocks;
pub mod pm;
pub mod timer;

pub use cache::{line_align, CoherentCache, DcacheOps};
pub use clock::{nearest_freq_idx, ClockInfo, FreqEntry};
pub use config::{ConfigError, PlatformConfig};
pub use io::{MmioRegisters, RegisterIo};
pub use memory::{CapabilityHeap, HeapError, MemCaps, Region, RegionAllocator};
pub use pm::{NoPm, PmContext, PmRuntime};
pub use timer::{ticks_to_cycles, CycleCounter, EmbassyCycleCounter, EmbassyTimer, PlatformTimer};
