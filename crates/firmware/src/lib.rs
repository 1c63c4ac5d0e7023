//! Audio DSP firmware: gateway DMA, gateway stages, EDF scheduling
//!
//! Builds on the [`pipeline`] crate's ring buffers and stage interface and
//! adds what needs the hardware: the HD-Audio gateway DMA engine, the stages
//! that hand pipeline rings to it, and the per-core scheduler that runs
//! stage work once per period.
//!
//! # Architecture
//!
//! ```text
//! schedule (EDF per core, embassy-time tick)
//!         ↓ TaskDispatch
//! pipeline::Pipeline<Stage>
//!         ↓ Component
//! audio (gateway stages, DMA → buffer feed)
//!         ↓ DmaOps
//! dma (HD-Audio gateway DMA)
//!         ↓ RegisterIo / PlatformTimer / PmRuntime
//! platform HAL
//! ```
//!
//! # Features
//!
//! - `hardware` - Build for the DSP target (defmt logging, MMIO registers)
//! - `std` - Enable standard library (host tests, simulator)
//! - `defmt` / `tracing` - Log backend

#![cfg_attr(all(not(test), not(feature = "std")), no_std)]
// Upgrade relevant warns to deny; keep pedantic as warn (too noisy for firmware)
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Critical correctness: deny these
#![deny(clippy::await_holding_lock)] // holding a blocking Mutex across .await is a bug
#![deny(unsafe_op_in_unsafe_fn)]
// unsafe fn body is not implicitly unsafe block
// Logging discipline (allow println in tests via clippy.toml)
#![warn(clippy::print_stdout)] // prefer tracing/defmt over println! in lib code
#![warn(clippy::dbg_macro)] // dbg! should not be left in committed code
// Intentional allows for this codebase:
#![allow(clippy::module_name_repetitions)] // common in Rust crates; not a real issue
#![allow(clippy::missing_errors_doc)] // most errors are self-explanatory
// Pedantic lints too noisy for firmware application code:
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::similar_names)]
#![allow(clippy::unused_self)]
#![allow(clippy::unused_async)]

// This must go FIRST so that all the other modules see its macros.
#[macro_use]
mod fmt;

pub mod audio;
pub mod dma;
pub mod init;
pub mod schedule;

// Re-export key types
pub use audio::{BufferFeed, DmaStage, GatewayDriver, Stage};
pub use dma::{DmaDirection, DmaError, DmaOps, GatewayKind, HdaDma};
pub use init::{DmaRegistry, StageDrivers};
pub use schedule::{EdfScheduler, ScheduleError, TaskDesc, TaskDispatch};
