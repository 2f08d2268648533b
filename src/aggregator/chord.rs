// Chord events and channel timelines
// Output types of the event aggregator

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::events::ControllerSnapshot;

/// Reconstructed set of pitches sharing one onset and one end time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChordEvent {
    /// Onset in milliseconds
    pub onset_ms: u64,

    /// Pitches in ascending order
    pub pitches: Vec<u8>,

    /// Velocities, parallel to `pitches`
    pub velocities: Vec<u8>,

    /// Duration in milliseconds, or `None` while no note-off terminates the chord
    pub duration_ms: Option<u64>,

    /// Controller values consumed by this chord
    pub controllers: ControllerSnapshot,
}

impl ChordEvent {
    /// Create a chord from (pitch, velocity) pairs
    ///
    /// Notes are sorted by pitch so that `pitches` is ascending.
    pub fn new(onset_ms: u64, mut notes: Vec<(u8, u8)>, duration_ms: Option<u64>) -> Self {
        notes.sort_by_key(|(pitch, _)| *pitch);
        let (pitches, velocities) = notes.into_iter().unzip();
        ChordEvent {
            onset_ms,
            pitches,
            velocities,
            duration_ms,
            controllers: ControllerSnapshot::default(),
        }
    }

    /// Attach a controller snapshot
    pub fn with_controllers(mut self, controllers: ControllerSnapshot) -> Self {
        self.controllers = controllers;
        self
    }

    /// True when a note-off terminated this chord
    pub fn has_explicit_off(&self) -> bool {
        self.duration_ms.is_some()
    }

    /// End time in milliseconds, if the chord is terminated
    pub fn end_ms(&self) -> Option<u64> {
        self.duration_ms.map(|duration| self.onset_ms + duration)
    }

    pub fn lowest_pitch(&self) -> Option<u8> {
        self.pitches.first().copied()
    }

    pub fn len(&self) -> usize {
        self.pitches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pitches.is_empty()
    }
}

/// Onset-ordered chord events of one channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelTimeline {
    pub channel: u8,

    /// Onset (ms) to the chords starting there; every list is non-empty
    pub chords: BTreeMap<u64, Vec<ChordEvent>>,
}

impl ChannelTimeline {
    pub fn new(channel: u8) -> Self {
        ChannelTimeline {
            channel,
            chords: BTreeMap::new(),
        }
    }

    /// Add chords starting at `onset_ms`
    pub fn insert(&mut self, onset_ms: u64, chords: Vec<ChordEvent>) {
        if chords.is_empty() {
            return;
        }
        self.chords.entry(onset_ms).or_default().extend(chords);
    }

    pub fn first_onset_ms(&self) -> Option<u64> {
        self.chords.keys().next().copied()
    }

    pub fn last_onset_ms(&self) -> Option<u64> {
        self.chords.keys().next_back().copied()
    }

    /// Number of distinct onsets
    pub fn len(&self) -> usize {
        self.chords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chords.is_empty()
    }

    /// Number of chord events across all onsets
    pub fn chord_count(&self) -> usize {
        self.chords.values().map(Vec::len).sum()
    }

    /// Iterate onsets in ascending order
    pub fn iter(&self) -> impl Iterator<Item = (u64, &[ChordEvent])> + '_ {
        self.chords
            .iter()
            .map(|(onset, chords)| (*onset, chords.as_slice()))
    }

    /// Chords that never received a note-off
    pub fn unterminated(&self) -> impl Iterator<Item = &ChordEvent> + '_ {
        self.chords
            .values()
            .flatten()
            .filter(|chord| !chord.has_explicit_off())
    }

    /// Move every onset `offset_ms` earlier
    ///
    /// `offset_ms` must not exceed the first onset.
    pub fn shift_earlier(&mut self, offset_ms: u64) {
        if offset_ms == 0 {
            return;
        }
        let chords = std::mem::take(&mut self.chords);
        self.chords = chords
            .into_iter()
            .map(|(onset, mut list)| {
                for chord in &mut list {
                    chord.onset_ms -= offset_ms;
                }
                (onset - offset_ms, list)
            })
            .collect();
    }
}
