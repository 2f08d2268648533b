// Event Aggregator - Turns raw note/controller streams into chord events
// Groups simultaneous note-ons, matches note-offs and normalizes time to zero

pub mod chord;
pub mod track;

pub use chord::{ChannelTimeline, ChordEvent};
pub use track::{aggregate_track, MIN_EXPLICIT_DURATION_MS};

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

use crate::events::{ControllerAccumulator, TrackEvents};
use track::track_channel;

/// Errors that abort an aggregation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AggregateError {
    #[error("No note-on events in input")]
    NoNoteOns,

    #[error("Channel {channel} appears in more than one track (track {track})")]
    DuplicateChannel { channel: u8, track: usize },

    #[error("Track {track} mixes channels {expected} and {found}")]
    MixedChannels { track: usize, expected: u8, found: u8 },

    #[error("Pitch {pitch} is outside 0..=127")]
    PitchOutOfRange { pitch: u8 },

    #[error("Velocity {velocity} is outside 0..=127")]
    VelocityOutOfRange { velocity: u8 },
}

/// Per-channel chord timelines built from a set of tracks
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aggregation {
    pub channels: BTreeMap<u8, ChannelTimeline>,
}

impl Aggregation {
    pub fn channel(&self, channel: u8) -> Option<&ChannelTimeline> {
        self.channels.get(&channel)
    }

    /// Earliest onset across every channel
    pub fn first_onset_ms(&self) -> Option<u64> {
        self.channels
            .values()
            .filter_map(ChannelTimeline::first_onset_ms)
            .min()
    }

    /// Shift every channel so the earliest onset across all channels is 0
    ///
    /// Returns the offset that was subtracted.
    pub fn normalize(&mut self) -> u64 {
        let offset = self.first_onset_ms().unwrap_or(0);
        for timeline in self.channels.values_mut() {
            timeline.shift_earlier(offset);
        }
        offset
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

/// Aggregate all tracks of a source into normalized channel timelines
///
/// Every track must use a single channel, and no channel may appear in two
/// tracks. Each track gets its own controller accumulator. Any error aborts
/// the whole aggregation.
pub fn aggregate(tracks: &[TrackEvents]) -> Result<Aggregation, AggregateError> {
    if !tracks.iter().any(TrackEvents::has_note_ons) {
        return Err(AggregateError::NoNoteOns);
    }

    let mut channels = BTreeMap::new();
    let mut seen_channels = BTreeSet::new();

    for (index, track) in tracks.iter().enumerate() {
        // Every non-empty track claims its channel, even without note-ons
        let channel = match track_channel(track, index)? {
            Some(channel) => channel,
            None => continue,
        };
        if !seen_channels.insert(channel) {
            return Err(AggregateError::DuplicateChannel {
                channel,
                track: index,
            });
        }

        let mut pending = ControllerAccumulator::new();
        if let Some(timeline) = aggregate_track(track, index, &mut pending)? {
            channels.insert(timeline.channel, timeline);
        }
    }

    let mut aggregation = Aggregation { channels };
    let offset = aggregation.normalize();

    log::info!(
        "Aggregated {} tracks into {} channels (time shifted by {} ms)",
        tracks.len(),
        aggregation.len(),
        offset
    );

    Ok(aggregation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{RawControllerEvent, RawNoteEvent, ControllerKind};

    fn note_track(channel: u8, notes: &[(u8, u64, Option<u64>)]) -> TrackEvents {
        let mut track = TrackEvents::new(Vec::new());
        for &(pitch, on, off) in notes {
            track.push(RawNoteEvent::on(channel, pitch, 100, on));
            if let Some(off) = off {
                track.push(RawNoteEvent::off(channel, pitch, off));
            }
        }
        track
    }

    #[test]
    fn test_spread_chord_example() {
        let tracks = vec![note_track(0, &[(60, 100, Some(600)), (64, 100, Some(800))])];

        let aggregation = aggregate(&tracks).unwrap();
        let timeline = aggregation.channel(0).unwrap();
        let chords = &timeline.chords[&0];

        assert_eq!(chords.len(), 2);
        assert_eq!(chords[0].onset_ms, 0);
        assert_eq!(chords[0].pitches, vec![60]);
        assert_eq!(chords[0].duration_ms, Some(500));
        assert_eq!(chords[1].onset_ms, 0);
        assert_eq!(chords[1].pitches, vec![64]);
        assert_eq!(chords[1].duration_ms, Some(700));
    }

    #[test]
    fn test_normalization_uses_global_minimum() {
        let tracks = vec![
            note_track(0, &[(60, 500, Some(700)), (62, 900, Some(1000))]),
            note_track(1, &[(48, 250, Some(400))]),
        ];

        let aggregation = aggregate(&tracks).unwrap();

        assert_eq!(aggregation.first_onset_ms(), Some(0));
        assert_eq!(aggregation.channel(1).unwrap().first_onset_ms(), Some(0));
        let onsets: Vec<u64> = aggregation
            .channel(0)
            .unwrap()
            .iter()
            .map(|(onset, _)| onset)
            .collect();
        assert_eq!(onsets, vec![250, 650]);
    }

    #[test]
    fn test_unterminated_is_propagated() {
        let tracks = vec![note_track(0, &[(60, 0, None)])];

        let aggregation = aggregate(&tracks).unwrap();
        let timeline = aggregation.channel(0).unwrap();
        assert_eq!(timeline.chord_count(), 1);
        assert_eq!(timeline.unterminated().count(), 1);
    }

    #[test]
    fn test_no_note_ons_fails() {
        let mut track = TrackEvents::new(Vec::new());
        track.push(RawControllerEvent::new(0, ControllerKind::Volume, 100, 0));
        track.push(RawNoteEvent::off(0, 60, 10));

        assert_eq!(aggregate(&[track]), Err(AggregateError::NoNoteOns));
        assert_eq!(aggregate(&[]), Err(AggregateError::NoNoteOns));
    }

    #[test]
    fn test_duplicate_channel_fails() {
        let tracks = vec![
            note_track(2, &[(60, 0, Some(10))]),
            note_track(2, &[(64, 0, Some(10))]),
        ];

        assert_eq!(
            aggregate(&tracks),
            Err(AggregateError::DuplicateChannel { channel: 2, track: 1 })
        );
    }

    #[test]
    fn test_duplicate_channel_without_note_ons_fails() {
        let mut controllers = TrackEvents::new(Vec::new());
        controllers.push(RawControllerEvent::new(0, ControllerKind::Volume, 90, 0));

        let tracks = vec![note_track(0, &[(60, 0, Some(10))]), controllers];
        assert_eq!(
            aggregate(&tracks),
            Err(AggregateError::DuplicateChannel { channel: 0, track: 1 })
        );

        let mut offs_only = TrackEvents::new(Vec::new());
        offs_only.push(RawNoteEvent::off(3, 60, 5));
        let tracks = vec![offs_only, note_track(3, &[(62, 0, Some(10))])];
        assert_eq!(
            aggregate(&tracks),
            Err(AggregateError::DuplicateChannel { channel: 3, track: 1 })
        );
    }

    #[test]
    fn test_tracks_without_notes_are_skipped() {
        let tracks = vec![
            TrackEvents::default().named("conductor"),
            note_track(5, &[(60, 40, Some(90))]),
        ];

        let aggregation = aggregate(&tracks).unwrap();
        assert_eq!(aggregation.len(), 1);
        assert!(aggregation.channel(5).is_some());
    }
}
