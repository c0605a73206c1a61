// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Table preferences on disk, best-effort.

use natar_app_core::config::{ConfigService, Loaded};
use natar_app_core::config_port::ConfigPort;
use natar_app_core::prefs::{TablePrefs, PREFS_KEY};
use natar_config_fs::FsConfigStore;
use tracing::{info, warn};

/// [`ConfigPort`] over the platform config directory. Without a usable
/// directory every load yields defaults and saves are dropped.
pub struct FsPrefs {
    service: Option<ConfigService<FsConfigStore>>,
}

impl FsPrefs {
    /// Open the platform config directory.
    pub fn open() -> Self {
        match FsConfigStore::new() {
            Ok(store) => Self::with_store(store),
            Err(err) => {
                warn!(%err, "no config directory; preferences will not persist");
                Self { service: None }
            }
        }
    }

    fn with_store(store: FsConfigStore) -> Self {
        info!(dir = %store.base().display(), "config directory");
        Self {
            service: Some(ConfigService::new(store)),
        }
    }
}

impl ConfigPort for FsPrefs {
    /// Saved prefs, with defaults written on first run. A corrupt file is
    /// left alone and `None` is returned.
    fn load_prefs(&self) -> Option<TablePrefs> {
        let service = self.service.as_ref()?;
        match service.load_or_default::<TablePrefs>(PREFS_KEY) {
            Ok((prefs, Loaded::Stored)) => Some(prefs),
            Ok((prefs, Loaded::Defaulted)) => {
                info!(key = PREFS_KEY, "saved default preferences");
                Some(prefs)
            }
            Err(err) => {
                warn!(%err, key = PREFS_KEY, "preferences unreadable");
                None
            }
        }
    }

    fn save_prefs(&self, prefs: &TablePrefs) {
        if let Some(service) = &self.service {
            if let Err(err) = service.save(PREFS_KEY, prefs) {
                warn!(%err, key = PREFS_KEY, "could not save preferences");
            }
        }
    }
}
