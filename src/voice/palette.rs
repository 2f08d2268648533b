// Palettes - Ordered duration definitions used to synthesize voices
// A permutation of 1-based palette indices turns a palette into a voice timeline

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use super::item::{ChordContent, DurationItem};
use super::timeline::VoiceTimeline;
use super::VoiceError;
use crate::events::MAX_DATA_BYTE;

/// Errors that can occur while loading a palette
#[derive(Debug, Error)]
pub enum PaletteError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Palette has no duration definitions")]
    Empty,

    #[error("Duration definition {index} is invalid: {reason}")]
    InvalidDef { index: usize, reason: String },
}

/// One palette entry: a duration with chord content, or a rest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DurationDef {
    pub duration_ms: u64,

    /// Chord content; `None` makes the definition a rest
    #[serde(default)]
    pub chord: Option<ChordContent>,
}

impl DurationDef {
    pub fn chord(content: ChordContent, duration_ms: u64) -> Self {
        DurationDef {
            duration_ms,
            chord: Some(content),
        }
    }

    pub fn rest(duration_ms: u64) -> Self {
        DurationDef {
            duration_ms,
            chord: None,
        }
    }

    /// Check that the definition can stand on its own
    pub fn validate(&self) -> Result<(), String> {
        if self.duration_ms == 0 {
            return Err("duration must be positive".to_string());
        }
        if let Some(ref content) = self.chord {
            if content.pitches.is_empty() {
                return Err("chord has no pitches".to_string());
            }
            if content.pitches.len() != content.velocities.len() {
                return Err(format!(
                    "{} pitches but {} velocities",
                    content.pitches.len(),
                    content.velocities.len()
                ));
            }
            if let Some(pitch) = content.pitches.iter().find(|&&p| p > MAX_DATA_BYTE) {
                return Err(format!("pitch {} is outside 0..=127", pitch));
            }
            if let Some(velocity) = content.velocities.iter().find(|&&v| v > MAX_DATA_BYTE) {
                return Err(format!("velocity {} is outside 0..=127", velocity));
            }
        }
        Ok(())
    }

    /// Create an unpositioned voice item from this definition
    pub fn to_item(&self) -> DurationItem {
        match self.chord {
            Some(ref content) => DurationItem::chord(content.clone(), self.duration_ms),
            None => DurationItem::rest(self.duration_ms),
        }
    }
}

/// Ordered list of duration definitions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Palette {
    #[serde(default)]
    pub name: Option<String>,

    pub defs: Vec<DurationDef>,
}

impl Palette {
    pub fn new(defs: Vec<DurationDef>) -> Self {
        Palette { name: None, defs }
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// Look up a definition by 1-based index
    pub fn get(&self, index: usize) -> Option<&DurationDef> {
        index.checked_sub(1).and_then(|i| self.defs.get(i))
    }

    /// Check every definition
    pub fn validate(&self) -> Result<(), PaletteError> {
        if self.defs.is_empty() {
            return Err(PaletteError::Empty);
        }
        for (index, def) in self.defs.iter().enumerate() {
            def.validate()
                .map_err(|reason| PaletteError::InvalidDef { index, reason })?;
        }
        Ok(())
    }

    /// Parse and validate a palette from JSON
    pub fn from_json(json: &str) -> Result<Self, PaletteError> {
        let palette: Palette = serde_json::from_str(json)?;
        palette.validate()?;
        Ok(palette)
    }

    /// Load a palette from a JSON file
    pub fn load(path: &Path) -> Result<Self, PaletteError> {
        let contents = std::fs::read_to_string(path)?;
        let palette = Self::from_json(&contents)?;
        log::debug!(
            "Loaded palette {:?} with {} definitions from {}",
            palette.name,
            palette.len(),
            path.display()
        );
        Ok(palette)
    }
}

impl VoiceTimeline {
    /// Build a voice from palette entries chosen by a 1-based permutation
    pub fn from_palette(
        palette: &Palette,
        permutation: &[usize],
        start_ms: u64,
    ) -> Result<Self, VoiceError> {
        if palette.is_empty() {
            return Err(VoiceError::EmptyPalette);
        }
        if permutation.is_empty() {
            return Err(VoiceError::EmptyPermutation);
        }

        let items = permutation
            .iter()
            .map(|&index| {
                palette
                    .get(index)
                    .map(DurationDef::to_item)
                    .ok_or(VoiceError::PermutationIndex {
                        index,
                        palette_len: palette.len(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        VoiceTimeline::from_items(start_ms, items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn palette() -> Palette {
        Palette::new(vec![
            DurationDef::chord(ChordContent::new(vec![60, 64], 90), 100),
            DurationDef::rest(50),
            DurationDef::chord(ChordContent::new(vec![55], 70), 200),
        ])
    }

    #[test]
    fn test_from_palette_follows_permutation() {
        let voice = VoiceTimeline::from_palette(&palette(), &[3, 1, 2, 1], 1000).unwrap();

        let durations: Vec<u64> = voice.iter().map(|item| item.duration_ms).collect();
        assert_eq!(durations, vec![200, 100, 50, 100]);
        assert_eq!(voice.start_ms(), 1000);
        assert_eq!(voice.end_ms(), 1450);
        assert!(voice.get(2).unwrap().is_rest());
        assert!(voice.is_contiguous());
    }

    #[test]
    fn test_from_palette_rejects_bad_indices() {
        assert_eq!(
            VoiceTimeline::from_palette(&palette(), &[1, 0], 0),
            Err(VoiceError::PermutationIndex {
                index: 0,
                palette_len: 3
            })
        );
        assert_eq!(
            VoiceTimeline::from_palette(&palette(), &[4], 0),
            Err(VoiceError::PermutationIndex {
                index: 4,
                palette_len: 3
            })
        );
        assert_eq!(
            VoiceTimeline::from_palette(&palette(), &[], 0),
            Err(VoiceError::EmptyPermutation)
        );
        assert_eq!(
            VoiceTimeline::from_palette(&Palette::default(), &[1], 0),
            Err(VoiceError::EmptyPalette)
        );
    }

    #[test]
    fn test_palette_json() {
        let json = r#"{
            "name": "krystal-a",
            "defs": [
                { "duration_ms": 120, "chord": { "pitches": [60, 67], "velocities": [80, 70] } },
                { "duration_ms": 40 }
            ]
        }"#;

        let palette = Palette::from_json(json).unwrap();
        assert_eq!(palette.name.as_deref(), Some("krystal-a"));
        assert_eq!(palette.len(), 2);
        assert!(palette.get(2).unwrap().chord.is_none());
        assert!(palette.get(0).is_none());
    }

    #[test]
    fn test_palette_validation() {
        let json = r#"{ "defs": [ { "duration_ms": 120, "chord": { "pitches": [60], "velocities": [] } } ] }"#;
        assert!(matches!(
            Palette::from_json(json),
            Err(PaletteError::InvalidDef { index: 0, .. })
        ));

        let json = r#"{ "defs": [ { "duration_ms": 0 } ] }"#;
        assert!(matches!(
            Palette::from_json(json),
            Err(PaletteError::InvalidDef { index: 0, .. })
        ));

        assert!(matches!(
            Palette::from_json(r#"{ "defs": [] }"#),
            Err(PaletteError::Empty)
        ));
    }

    #[test]
    fn test_palette_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("palette.json");
        fs::write(&path, serde_json::to_string(&palette()).unwrap()).unwrap();

        let loaded = Palette::load(&path).unwrap();
        assert_eq!(loaded, palette());
    }
}
