// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Config port for the table runtime.

use crate::prefs::TablePrefs;

/// Config-facing port for loading/saving table preferences.
pub trait ConfigPort {
    /// Load table preferences (returns None if they cannot be produced).
    fn load_prefs(&self) -> Option<TablePrefs>;
    /// Persist table preferences (best-effort; impl may log errors internally).
    fn save_prefs(&self, prefs: &TablePrefs);
}
