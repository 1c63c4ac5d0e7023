//! Audio pipeline core: ring buffers, stage interface, pipeline graph
//!
//! Stages exchange audio exclusively through [`CompBuffer`]s. The crate
//! knows nothing about DMA hardware: gateway stages live in the firmware
//! crate and plug in through the [`Component`] trait.
//!
//! # Features
//!
//! - `std`: Enable platform mocks for host testing
//! - `defmt`: Enable defmt logging
//! - `tracing`: Route logs to `tracing` (host builds)
#![cfg_attr(not(test), no_std)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

// This must go FIRST so that all the other modules see its macros.
#[macro_use]
mod fmt;

pub mod buffer;
pub mod component;
pub mod graph;
pub mod registry;
pub mod switch;

pub use buffer::{BufferDesc, BufferError, BufferEvent, BufferListener, BufferStatus, CompBuffer, Endpoint};
pub use component::{
    CompCommand, CompDesc, CompError, CompState, CompType, Component, ComponentDriver, StageIo,
    StreamDirection, StreamParams, TriggerCmd,
};
pub use graph::Pipeline;
pub use registry::ComponentRegistry;
pub use switch::{Switch, SwitchDriver};
