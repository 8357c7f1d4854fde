//! Preset registry
//!
//! Presets are immutable at runtime: the registry is built once at startup
//! from the built-in table (plus any operator additions) and handed around
//! behind an `Arc`. An empty registry makes the platform useless, so startup
//! treats it as fatal.

use agora_core::{Error, Preset, PresetId, Result, RoundConfig, Speaker, WordLimit};
use once_cell::sync::Lazy;
use std::collections::HashMap;

static BUILTIN_PRESETS: Lazy<Vec<Preset>> = Lazy::new(|| {
    vec![
        Preset {
            id: PresetId::from("classic"),
            name: "Classic".to_string(),
            rounds: vec![
                RoundConfig {
                    name: "opening".to_string(),
                    speaker: Speaker::Both,
                    time_limit: 60,
                    word_limit: WordLimit { min: 50, max: 250 },
                    exchanges: 1,
                },
                RoundConfig {
                    name: "rebuttal".to_string(),
                    speaker: Speaker::Both,
                    time_limit: 90,
                    word_limit: WordLimit { min: 50, max: 300 },
                    exchanges: 2,
                },
                RoundConfig {
                    name: "closing".to_string(),
                    speaker: Speaker::Both,
                    time_limit: 60,
                    word_limit: WordLimit { min: 50, max: 200 },
                    exchanges: 1,
                },
            ],
            prep_time: 10,
            vote_window: 30,
        },
        Preset {
            id: PresetId::from("blitz"),
            name: "Blitz".to_string(),
            rounds: vec![RoundConfig {
                name: "exchange".to_string(),
                speaker: Speaker::Both,
                time_limit: 30,
                word_limit: WordLimit { min: 20, max: 120 },
                exchanges: 1,
            }],
            prep_time: 3,
            vote_window: 15,
        },
    ]
});

/// Immutable id → preset table.
pub struct PresetRegistry {
    presets: HashMap<PresetId, Preset>,
}

impl PresetRegistry {
    /// Registry seeded with the built-in presets.
    pub fn with_builtins() -> Self {
        let mut presets = HashMap::new();
        for preset in BUILTIN_PRESETS.iter() {
            presets.insert(preset.id.clone(), preset.clone());
        }
        Self { presets }
    }

    /// Registry built from an explicit preset list.
    pub fn from_presets(list: impl IntoIterator<Item = Preset>) -> Self {
        let mut presets = HashMap::new();
        for preset in list {
            presets.insert(preset.id.clone(), preset);
        }
        Self { presets }
    }

    /// Look up a preset, or fail with `UnknownPreset`.
    pub fn get(&self, id: &PresetId) -> Result<Preset> {
        self.presets
            .get(id)
            .cloned()
            .ok_or_else(|| Error::UnknownPreset(id.clone()))
    }

    /// Whether the preset exists.
    pub fn contains(&self, id: &PresetId) -> bool {
        self.presets.contains_key(id)
    }

    /// Whether any presets are registered. Empty is fatal at startup.
    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }

    /// Number of registered presets.
    pub fn len(&self) -> usize {
        self.presets.len()
    }
}

impl Default for PresetRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
