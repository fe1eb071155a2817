// SPDX-License-Identifier: Apache-2.0
//! The fixed-schema game options record.

use serde::{Deserialize, Serialize};

use crate::error::SessionError;

/// Session-wide game options. The field list is closed: a lobby UI or a
/// GAME_SETTINGS packet can only ever change one of these, never add a
/// new one, which is what lets [`crate::Session::set_option`] reject
/// unknown keys instead of silently accepting them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameOptions {
    /// Starting credits per player.
    pub credits: u32,
    /// Tech level cap (unlocks higher-tier units/structures).
    pub tech_level: u8,
    /// Maximum live units per player.
    pub unit_cap: u16,
    /// Resupply crates enabled.
    pub crates_enabled: bool,
    /// Tiberium/ore field growth enabled.
    pub tiberium_enabled: bool,
    /// Pre-built bases enabled (vs. build-from-MCV starts).
    pub bases_enabled: bool,
    /// Simulation speed, 1 (slowest) through 6 (fastest).
    pub game_speed: u8,
}

impl Default for GameOptions {
    fn default() -> Self {
        Self {
            credits: 10_000,
            tech_level: 10,
            unit_cap: 250,
            crates_enabled: true,
            tiberium_enabled: true,
            bases_enabled: true,
            game_speed: 3,
        }
    }
}

/// A single option value, as carried by the host-facing `set_option` API
/// and by a decoded GAME_SETTINGS packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionValue {
    /// A `u32`-typed option (credits).
    U32(u32),
    /// A `u16`-typed option (unit cap).
    U16(u16),
    /// A `u8`-typed option (tech level, game speed).
    U8(u8),
    /// A `bool`-typed option (crates/tiberium/bases toggles).
    Bool(bool),
}

impl GameOptions {
    /// Apply one option by its string key, rejecting keys outside the
    /// fixed schema and values outside their field's valid range.
    pub fn apply(&mut self, key: &str, value: OptionValue) -> Result<(), SessionError> {
        match (key, value) {
            ("credits", OptionValue::U32(v)) => self.credits = v,
            ("tech_level", OptionValue::U8(v)) => self.tech_level = v,
            ("unit_cap", OptionValue::U16(v)) => self.unit_cap = v,
            ("crates_enabled", OptionValue::Bool(v)) => self.crates_enabled = v,
            ("tiberium_enabled", OptionValue::Bool(v)) => self.tiberium_enabled = v,
            ("bases_enabled", OptionValue::Bool(v)) => self.bases_enabled = v,
            ("game_speed", OptionValue::U8(v)) => {
                if !(1..=6).contains(&v) {
                    return Err(SessionError::InvalidOptionValue {
                        key: "game_speed",
                        reason: "must be in 1..=6",
                    });
                }
                self.game_speed = v;
            }
            (
                "credits" | "tech_level" | "unit_cap" | "crates_enabled" | "tiberium_enabled"
                | "bases_enabled" | "game_speed",
                _,
            ) => {
                return Err(SessionError::InvalidOptionValue {
                    key: "option",
                    reason: "value type does not match key",
                })
            }
            (other, _) => return Err(SessionError::UnknownOption(other.to_string())),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_key_is_rejected() {
        let mut opts = GameOptions::default();
        let err = opts.apply("crab_cap", OptionValue::U32(1)).unwrap_err();
        assert_eq!(err, SessionError::UnknownOption("crab_cap".to_string()));
    }

    #[test]
    fn game_speed_out_of_range_is_rejected() {
        let mut opts = GameOptions::default();
        assert!(opts.apply("game_speed", OptionValue::U8(7)).is_err());
        assert!(opts.apply("game_speed", OptionValue::U8(0)).is_err());
        assert!(opts.apply("game_speed", OptionValue::U8(6)).is_ok());
    }

    #[test]
    fn mismatched_value_type_is_rejected() {
        let mut opts = GameOptions::default();
        let err = opts.apply("credits", OptionValue::Bool(true)).unwrap_err();
        assert!(matches!(err, SessionError::InvalidOptionValue { .. }));
    }

    #[test]
    fn valid_updates_take_effect() {
        let mut opts = GameOptions::default();
        opts.apply("credits", OptionValue::U32(5_000)).unwrap();
        opts.apply("bases_enabled", OptionValue::Bool(false)).unwrap();
        assert_eq!(opts.credits, 5_000);
        assert!(!opts.bases_enabled);
    }
}
