// SPDX-License-Identifier: Apache-2.0
//! Filesystem-backed [`ConfigStore`] for the lockstep hosting daemon
//! (resolves the platform config directory via `directories`).

use directories::ProjectDirs;
use lockstep_app_core::{ConfigError, ConfigStore};
use std::fs;
use std::path::PathBuf;

/// Stores configs as JSON files under the platform config directory,
/// e.g. `~/.config/lockstep-hostd` on Linux.
pub struct FsConfigStore {
    base: PathBuf,
}

impl FsConfigStore {
    /// Create a store rooted at the user config directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Other`] if the platform config directory
    /// can't be resolved, or [`ConfigError::Io`] if it can't be created.
    pub fn new() -> Result<Self, ConfigError> {
        let proj = ProjectDirs::from("dev", "lockstep", "lockstep-hostd")
            .ok_or_else(|| ConfigError::Other("could not resolve config dir".into()))?;
        let base = proj.config_dir().to_path_buf();
        fs::create_dir_all(&base)?;
        Ok(Self { base })
    }

    /// Create a store rooted at an arbitrary directory, bypassing platform
    /// resolution. Used by tests and by callers that want an explicit
    /// `--config-dir` override.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if `base` can't be created.
    pub fn at(base: PathBuf) -> Result<Self, ConfigError> {
        fs::create_dir_all(&base)?;
        Ok(Self { base })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.base.join(format!("{key}.json"))
    }
}

impl ConfigStore for FsConfigStore {
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError> {
        let path = self.path_for(key);
        match fs::read(path) {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(ConfigError::NotFound),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, data)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lockstep_app_core::{ConfigService, HostPrefs};

    fn temp_dir(label: &str) -> PathBuf {
        let mut dir = std::env::temp_dir();
        dir.push(format!("lockstep-config-fs-test-{label}-{:x}", std::process::id()));
        dir
    }

    #[test]
    fn missing_key_is_not_found() {
        let store = FsConfigStore::at(temp_dir("missing")).unwrap();
        assert!(matches!(store.load_raw("nope"), Err(ConfigError::NotFound)));
    }

    #[test]
    fn saved_host_prefs_round_trip_through_a_fresh_store() {
        let dir = temp_dir("roundtrip");
        let store = FsConfigStore::at(dir.clone()).unwrap();
        let service = ConfigService::new(store);

        let prefs = HostPrefs {
            bind_address: "127.0.0.1:9999".to_string(),
            frame_rate: 30,
            ..HostPrefs::default()
        };
        service.save(lockstep_app_core::HOST_PREFS_KEY, &prefs).unwrap();

        let reopened = FsConfigStore::at(dir).unwrap();
        let service = ConfigService::new(reopened);
        let loaded: Option<HostPrefs> = service.load(lockstep_app_core::HOST_PREFS_KEY).unwrap();
        assert_eq!(loaded, Some(prefs));
    }
}
