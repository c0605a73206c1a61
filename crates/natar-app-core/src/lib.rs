// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared application services for the table client (config, prefs, control).
//! Keeps runtime adapters thin and transport-agnostic.

pub mod config;
pub mod config_port;
pub mod control_port;
pub mod prefs;
