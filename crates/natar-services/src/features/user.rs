// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Seat the viewer relative to the table from `user:position`.

use crate::feature::{Feature, FeatureCx, LoadError};
use glam::Mat4;
use natar_store_client::StoreHandle;
use natar_store_proto::{suffix, ChannelKey};
use natar_vision::{facing, PositionRecord};

/// Places an object at the table position minus the published offset,
/// facing the table. Loads once.
#[derive(Debug, Clone)]
pub struct UserFollower {
    object: String,
    table: String,
    key: ChannelKey,
}

impl UserFollower {
    /// Seat `object` relative to the pose recorded for `table`.
    pub fn new(object: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            object: object.into(),
            table: table.into(),
            key: ChannelKey::for_object("user", suffix::POSITION),
        }
    }

    /// Read the offset from `key` instead of `user:position`.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = ChannelKey::new(key);
        self
    }
}

impl Feature for UserFollower {
    fn name(&self) -> &str {
        &self.object
    }

    fn control_key(&self) -> &str {
        self.key.as_str()
    }

    fn try_load(
        &mut self,
        store: &mut dyn StoreHandle,
        cx: &mut FeatureCx<'_>,
    ) -> Result<(), LoadError> {
        if self.table.is_empty() {
            return Err(LoadError::Configuration(format!(
                "no table object for {}",
                self.object
            )));
        }
        let Some(raw) = store.get(self.key.as_str())? else {
            return Err(LoadError::Missing(vec![self.key.to_string()]));
        };
        let offset = PositionRecord::from_json(&raw)
            .map_err(|e| LoadError::decode(&self.key, e))?
            .to_vec3();
        let Some(table) = cx.table.object_pose(&self.table) else {
            return Err(LoadError::Waiting(format!("pose of {}", self.table)));
        };
        let pose = facing(table.w_axis.truncate(), offset);
        cx.sink.set_transform(&self.object, pose);
        cx.table.set_object_pose(
            &self.object,
            Mat4::from_rotation_translation(pose.rotation, pose.position),
        );
        Ok(())
    }
}
