// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Live frames from an image key onto a texture.
//!
//! Three feeds are supported and never mixed for one key: `stream` (the push
//! payload is the frame), `notify` (a push only marks the frame dirty and the
//! next tick fetches it), and `poll` (fetch every tick). A notify push that
//! parses as a frame notice marks the frame dirty only when its image count
//! changes.

use crate::feature::{Feature, FeatureCx, Fetch, LoadError};
use natar_app_core::prefs::VideoFeed;
use natar_store_client::{StoreError, StoreHandle};
use natar_store_proto::{suffix, ChannelKey};
use natar_vision::{
    overlay_markers, FrameBuffer, FrameError, FrameNotice, MarkerSet, PixelFormat,
};
use tracing::debug;

/// Image metadata published next to a frame key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ImageShape {
    pub(crate) width: usize,
    pub(crate) height: usize,
    pub(crate) channels: usize,
    pub(crate) pixel_format: String,
}

impl ImageShape {
    /// Read `:width`, `:height`, `:channels` (required) and `:pixelformat`.
    pub(crate) fn fetch(
        fetch: &mut Fetch<'_>,
        key: &ChannelKey,
    ) -> Result<Option<Self>, StoreError> {
        let width = fetch.number::<usize>(&key.join(suffix::WIDTH))?;
        let height = fetch.number::<usize>(&key.join(suffix::HEIGHT))?;
        let channels = fetch.number::<usize>(&key.join(suffix::CHANNELS))?;
        let pixel_format = fetch
            .optional_text(&key.join(suffix::PIXEL_FORMAT))?
            .unwrap_or_default();
        Ok(match (width, height, channels) {
            (Some(width), Some(height), Some(channels)) => Some(Self {
                width,
                height,
                channels,
                pixel_format,
            }),
            _ => None,
        })
    }

    /// Reshape `slot`, allocating only on first use or a dimension change.
    pub(crate) fn adopt(&self, slot: &mut Option<FrameBuffer>) -> Result<(), FrameError> {
        match slot {
            Some(frame) => {
                if frame.ensure_shape(self.width, self.height, self.channels, &self.pixel_format)? {
                    debug!(width = self.width, height = self.height, "frame buffer reallocated");
                }
            }
            None => {
                *slot = Some(FrameBuffer::new(
                    self.width,
                    self.height,
                    self.channels,
                    self.pixel_format.clone(),
                )?);
            }
        }
        Ok(())
    }
}

/// Streams an image key into a texture.
#[derive(Debug)]
pub struct VideoPlayer {
    key: ChannelKey,
    markers_key: ChannelKey,
    feed: VideoFeed,
    markers: bool,
    frame: Option<FrameBuffer>,
    pending: Option<Vec<u8>>,
    dirty: bool,
    last_count: Option<i64>,
    dropped: u64,
}

impl VideoPlayer {
    /// Play `key` with the given feed.
    pub fn new(key: impl Into<String>, feed: VideoFeed) -> Self {
        let key = ChannelKey::new(key);
        Self {
            markers_key: key.join(suffix::DETECTED_MARKERS),
            key,
            feed,
            markers: false,
            frame: None,
            pending: None,
            dirty: false,
            last_count: None,
            dropped: 0,
        }
    }

    /// Draw `<key>:detected-markers` over RGB frames.
    pub fn with_markers(mut self, markers: bool) -> Self {
        self.markers = markers;
        self
    }

    fn next_payload(&mut self, store: &mut dyn StoreHandle) -> Result<Option<Vec<u8>>, StoreError> {
        match self.feed {
            VideoFeed::Stream => Ok(self.pending.take()),
            VideoFeed::Notify if std::mem::take(&mut self.dirty) => store.get(self.key.as_str()),
            VideoFeed::Notify => Ok(None),
            VideoFeed::Poll => store.get(self.key.as_str()),
        }
    }
}

impl Feature for VideoPlayer {
    fn name(&self) -> &str {
        self.key.as_str()
    }

    fn control_key(&self) -> &str {
        self.key.as_str()
    }

    fn try_load(
        &mut self,
        store: &mut dyn StoreHandle,
        _cx: &mut FeatureCx<'_>,
    ) -> Result<(), LoadError> {
        let mut fetch = Fetch::new(store);
        let Some(shape) = ImageShape::fetch(&mut fetch, &self.key)? else {
            return Err(fetch.into_missing());
        };
        shape
            .adopt(&mut self.frame)
            .map_err(|e| LoadError::decode(&self.key.join(suffix::CHANNELS), e))?;
        // The first notify-mode frame is fetched without waiting for a push.
        self.dirty = true;
        Ok(())
    }

    fn channel(&self) -> Option<ChannelKey> {
        match self.feed {
            VideoFeed::Stream | VideoFeed::Notify => Some(self.key.clone()),
            VideoFeed::Poll => None,
        }
    }

    fn on_message(&mut self, payload: Vec<u8>, _cx: &mut FeatureCx<'_>) {
        match self.feed {
            VideoFeed::Stream => self.pending = Some(payload),
            VideoFeed::Notify => match FrameNotice::from_json(&payload) {
                Ok(notice) => {
                    if self.last_count.replace(notice.image_count) != Some(notice.image_count) {
                        self.dirty = true;
                    }
                }
                Err(_) => self.dirty = true,
            },
            VideoFeed::Poll => {}
        }
    }

    fn update(
        &mut self,
        store: &mut dyn StoreHandle,
        cx: &mut FeatureCx<'_>,
    ) -> Result<(), StoreError> {
        let Some(raw) = self.next_payload(store)? else {
            return Ok(());
        };
        let Some(frame) = self.frame.as_mut() else {
            return Ok(());
        };
        if let Err(err) = frame.apply_raw(&raw) {
            self.dropped += 1;
            debug!(key = %self.key, %err, dropped = self.dropped, "frame dropped");
            return Ok(());
        }
        if self.markers && matches!(frame.format(), Ok(PixelFormat::Rgb24)) {
            if let Some(json) = store.get(self.markers_key.as_str())? {
                match MarkerSet::from_json(&json) {
                    Ok(set) => {
                        let (width, height) = (frame.width(), frame.height());
                        overlay_markers(frame.data_mut(), width, height, &set.markers);
                    }
                    Err(err) => debug!(key = %self.markers_key, %err, "markers dropped"),
                }
            }
        }
        cx.sink.upload_texture(self.key.as_str(), frame);
        Ok(())
    }

    fn reset(&mut self) {
        self.pending = None;
        self.dirty = false;
        self.last_count = None;
    }
}
