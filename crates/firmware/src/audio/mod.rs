//! Audio stages backed by gateway DMA.
//!
//! # Module structure
//!
//! - [`gateway`]: host / link gateway stage and its driver
//! - [`feed`]: DMA callback adapter advancing ring-buffer cursors
//! - [`stage`]: [`Stage`], the stage type pipelines of this firmware hold

pub mod feed;
pub mod gateway;
pub mod stage;

pub use feed::{BufferFeed, FeedSide};
pub use gateway::{DmaStage, GatewayDriver, MAX_RING_PERIODS};
pub use stage::Stage;
