// Voice items
// Positioned, duration-bearing chords and rests

use serde::{Deserialize, Serialize};

use crate::aggregator::ChordEvent;
use crate::events::{ControllerSnapshot, MAX_DATA_BYTE};

/// Sounding content of a chord item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChordContent {
    /// Pitches in ascending order
    pub pitches: Vec<u8>,

    /// Velocities, parallel to `pitches`
    pub velocities: Vec<u8>,

    #[serde(default)]
    pub controllers: ControllerSnapshot,
}

impl ChordContent {
    /// Create chord content with one velocity for every pitch
    pub fn new(pitches: Vec<u8>, velocity: u8) -> Self {
        let velocities = vec![velocity; pitches.len()];
        ChordContent {
            pitches,
            velocities,
            controllers: ControllerSnapshot::default(),
        }
    }

    pub fn lowest_pitch(&self) -> Option<u8> {
        self.pitches.iter().copied().min()
    }

    /// Shift every pitch by `interval` semitones, clamping to 0..=127
    pub fn transpose(&mut self, interval: i32) {
        for pitch in &mut self.pitches {
            *pitch = (*pitch as i32 + interval).clamp(0, MAX_DATA_BYTE as i32) as u8;
        }
    }

    /// Scale every velocity by `factor`, clamping to 1..=127
    pub fn scale_velocities(&mut self, factor: f64) {
        for velocity in &mut self.velocities {
            let scaled = (*velocity as f64 * factor).round();
            *velocity = scaled.clamp(1.0, MAX_DATA_BYTE as f64) as u8;
        }
    }
}

impl From<ChordEvent> for ChordContent {
    fn from(chord: ChordEvent) -> Self {
        ChordContent {
            pitches: chord.pitches,
            velocities: chord.velocities,
            controllers: chord.controllers,
        }
    }
}

/// What a voice item holds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ItemKind {
    Chord(ChordContent),
    Rest,
}

/// A chord or rest at a position in a voice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DurationItem {
    /// Absolute position in milliseconds
    pub position_ms: u64,

    pub duration_ms: u64,

    pub kind: ItemKind,
}

impl DurationItem {
    /// Create a chord item at position 0
    pub fn chord(content: ChordContent, duration_ms: u64) -> Self {
        DurationItem {
            position_ms: 0,
            duration_ms,
            kind: ItemKind::Chord(content),
        }
    }

    /// Create a rest item at position 0
    pub fn rest(duration_ms: u64) -> Self {
        DurationItem {
            position_ms: 0,
            duration_ms,
            kind: ItemKind::Rest,
        }
    }

    /// Place the item at `position_ms`
    pub fn at(mut self, position_ms: u64) -> Self {
        self.position_ms = position_ms;
        self
    }

    pub fn is_rest(&self) -> bool {
        matches!(self.kind, ItemKind::Rest)
    }

    pub fn end_ms(&self) -> u64 {
        self.position_ms + self.duration_ms
    }

    /// Lowest pitch of a chord item; rests have none
    pub fn lowest_pitch(&self) -> Option<u8> {
        self.content().and_then(ChordContent::lowest_pitch)
    }

    pub fn content(&self) -> Option<&ChordContent> {
        match &self.kind {
            ItemKind::Chord(content) => Some(content),
            ItemKind::Rest => None,
        }
    }

    pub fn content_mut(&mut self) -> Option<&mut ChordContent> {
        match &mut self.kind {
            ItemKind::Chord(content) => Some(content),
            ItemKind::Rest => None,
        }
    }
}
