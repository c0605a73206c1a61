// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! One-shot image load into a texture.

use super::video::ImageShape;
use crate::feature::{Feature, FeatureCx, Fetch, LoadError};
use natar_store_client::StoreHandle;
use natar_store_proto::{suffix, ChannelKey};
use natar_vision::FrameBuffer;

/// Loads the image under a key once.
#[derive(Debug)]
pub struct TextureLoader {
    key: ChannelKey,
    frame: Option<FrameBuffer>,
}

impl TextureLoader {
    /// Load `key` and its metadata.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: ChannelKey::new(key),
            frame: None,
        }
    }
}

impl Feature for TextureLoader {
    fn name(&self) -> &str {
        self.key.as_str()
    }

    fn control_key(&self) -> &str {
        self.key.as_str()
    }

    fn try_load(
        &mut self,
        store: &mut dyn StoreHandle,
        cx: &mut FeatureCx<'_>,
    ) -> Result<(), LoadError> {
        let mut fetch = Fetch::new(store);
        let shape = ImageShape::fetch(&mut fetch, &self.key)?;
        let image = fetch.bytes(&self.key)?;
        let (Some(shape), Some(image)) = (shape, image) else {
            return Err(fetch.into_missing());
        };
        shape
            .adopt(&mut self.frame)
            .map_err(|e| LoadError::decode(&self.key.join(suffix::CHANNELS), e))?;
        if let Some(frame) = self.frame.as_mut() {
            frame
                .apply_raw(&image)
                .map_err(|e| LoadError::decode(&self.key, e))?;
            cx.sink.upload_texture(self.key.as_str(), frame);
        }
        Ok(())
    }
}
