//! DMA completion → ring-buffer accounting.
//!
//! A gateway DMA moves audio in and out of a local ring on its own. The ring
//! buffer only learns about it when somebody calls `produce` / `consume`.
//! [`BufferFeed`] does that from the DMA copy callback, so the accounting
//! happens exactly when the gateway was told about the bytes.

use pipeline::CompBuffer;
use platform::DcacheOps;

use crate::dma::{DmaCbType, DmaListener};

/// Which cursor a feed advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FeedSide {
    /// The DMA filled the ring: advance the write cursor.
    Produce,
    /// The DMA drained the ring: advance the read cursor.
    Consume,
}

/// [`DmaListener`] that accounts DMA copies on a ring buffer.
pub struct BufferFeed<'a, 'l> {
    buffer: &'a CompBuffer<'l>,
    cache: &'a dyn DcacheOps,
    side: FeedSide,
}

impl<'a, 'l> BufferFeed<'a, 'l> {
    /// Feed `buffer` from the DMA side `side`.
    pub fn new(buffer: &'a CompBuffer<'l>, cache: &'a dyn DcacheOps, side: FeedSide) -> Self {
        Self { buffer, cache, side }
    }

    /// The buffer being fed.
    pub fn buffer(&self) -> &'a CompBuffer<'l> {
        self.buffer
    }

    /// Cursor this feed advances.
    pub fn side(&self) -> FeedSide {
        self.side
    }
}

impl DmaListener for BufferFeed<'_, '_> {
    fn on_dma_event(&self, channel: usize, event: DmaCbType, bytes: u32) {
        if !event.contains(DmaCbType::COPY) {
            return;
        }
        let res = match self.side {
            FeedSide::Produce => self.buffer.produce(self.cache, bytes),
            FeedSide::Consume => self.buffer.consume(self.cache, bytes),
        };
        if let Err(e) = res {
            warn!("feed: ch {} buffer {}: {}", channel, self.buffer.id(), e);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pipeline::{BufferDesc, Endpoint};
    use platform::mocks::{CacheOp, RecordingCache};
    use platform::{CapabilityHeap, MemCaps, Region};

    #[test]
    fn copy_event_produces_into_buffer() {
        let heap: CapabilityHeap<2> = CapabilityHeap::new(
            Region {
                addr: 0x8000,
                size: 0x1000,
            },
            MemCaps::RAM | MemCaps::DMA,
            64,
        );
        let buf = CompBuffer::new(
            &BufferDesc {
                id: 7,
                size: 384,
                caps: MemCaps::DMA,
            },
            &heap,
        )
        .unwrap();
        buf.link_source(Some(Endpoint {
            comp_id: 1,
            dma_connected: true,
        }));
        buf.link_sink(Some(Endpoint {
            comp_id: 2,
            dma_connected: false,
        }));

        let cache = RecordingCache::new();
        let feed = BufferFeed::new(&buf, &cache, FeedSide::Produce);
        feed.on_dma_event(0, DmaCbType::COPY, 192);
        feed.on_dma_event(0, DmaCbType::empty(), 192);

        assert_eq!(buf.avail(), 192);
        assert!(matches!(cache.ops().first(), Some(CacheOp::Invalidate { len: 192, .. })));
    }
}
