// SPDX-License-Identifier: Apache-2.0
//! Host-local application services for the lockstep hosting daemon:
//! configuration storage and the preferences it stores. Nothing in this
//! crate participates in the deterministic simulation — it exists purely
//! to get a host process up and running with the bind address, frame
//! rate, and default lobby options it was last configured with.

pub mod config;
pub mod prefs;

pub use config::{ConfigError, ConfigService, ConfigStore};
pub use prefs::{HostPrefs, HOST_PREFS_KEY};
