// Voice building
// Lays out a channel timeline's chord events as a contiguous voice of chords and rests

use serde::{Deserialize, Serialize};

use super::item::{ChordContent, DurationItem};
use super::timeline::VoiceTimeline;
use super::VoiceError;
use crate::aggregator::{ChannelTimeline, ChordEvent};
use crate::events::ControllerSnapshot;

/// Settings for turning chord events into a voice
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceBuildOptions {
    /// Duration given to a final chord that never received a note-off
    pub final_duration_ms: u64,

    /// Gaps shorter than this are absorbed into the preceding chord
    /// instead of becoming rests
    pub min_rest_ms: u64,
}

impl Default for VoiceBuildOptions {
    fn default() -> Self {
        VoiceBuildOptions {
            final_duration_ms: 1000,
            min_rest_ms: 0,
        }
    }
}

impl VoiceTimeline {
    /// Build a voice with one chord item per onset of `timeline`
    ///
    /// Spread chords at one onset are merged into a single item holding every
    /// pitch and lasting as long as the longest of them. An onset holding any
    /// unterminated chord is treated as unterminated as a whole. A chord is clipped at
    /// the next onset; a gap before the next onset becomes a rest. Unterminated
    /// chords last until the next onset, or `final_duration_ms` at the end.
    pub fn from_channel_timeline(
        timeline: &ChannelTimeline,
        options: &VoiceBuildOptions,
    ) -> Result<Self, VoiceError> {
        let start_ms = timeline.first_onset_ms().ok_or(VoiceError::EmptyTimeline)?;
        let onsets: Vec<(u64, &[ChordEvent])> = timeline.iter().collect();

        let mut items = Vec::with_capacity(onsets.len());
        let mut rests = 0;
        let mut clipped = 0;

        for (index, (onset_ms, chords)) in onsets.iter().enumerate() {
            let (content, duration) = merge_chords(chords);
            let next_onset = onsets.get(index + 1).map(|(next, _)| *next);

            match (duration, next_onset) {
                (None, Some(next)) => {
                    items.push(DurationItem::chord(content, next - onset_ms));
                }
                (None, None) => {
                    items.push(DurationItem::chord(content, options.final_duration_ms));
                }
                (Some(duration), None) => {
                    items.push(DurationItem::chord(content, duration));
                }
                (Some(duration), Some(next)) => {
                    let gap = next - onset_ms;
                    if duration >= gap {
                        if duration > gap {
                            clipped += 1;
                        }
                        items.push(DurationItem::chord(content, gap));
                    } else if gap - duration < options.min_rest_ms {
                        items.push(DurationItem::chord(content, gap));
                    } else {
                        items.push(DurationItem::chord(content, duration));
                        items.push(DurationItem::rest(gap - duration));
                        rests += 1;
                    }
                }
            }
        }

        log::debug!(
            "Built voice for channel {}: {} items, {} rests, {} clipped chords",
            timeline.channel,
            items.len(),
            rests,
            clipped
        );

        VoiceTimeline::from_items(start_ms, items)
    }
}

/// Merge the chords sharing one onset
///
/// Returns the combined content and the longest explicit duration, or `None`
/// when any chord at the onset is unterminated.
fn merge_chords(chords: &[ChordEvent]) -> (ChordContent, Option<u64>) {
    let mut notes: Vec<(u8, u8)> = Vec::new();
    let mut controllers = ControllerSnapshot::default();
    let mut duration: Option<u64> = Some(0);

    for chord in chords {
        notes.extend(chord.pitches.iter().copied().zip(chord.velocities.iter().copied()));
        for (kind, value) in chord.controllers.iter() {
            controllers.set(kind, value);
        }
        duration = match (duration, chord.duration_ms) {
            (Some(longest), Some(chord_duration)) => Some(longest.max(chord_duration)),
            _ => None,
        };
    }

    notes.sort_by_key(|(pitch, _)| *pitch);
    let (pitches, velocities) = notes.into_iter().unzip();

    (
        ChordContent {
            pitches,
            velocities,
            controllers,
        },
        duration,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ControllerKind;
    use crate::voice::timeline::tests::positions;

    fn timeline(chords: Vec<ChordEvent>) -> ChannelTimeline {
        let mut timeline = ChannelTimeline::new(0);
        for chord in chords {
            timeline.insert(chord.onset_ms, vec![chord]);
        }
        timeline
    }

    #[test]
    fn test_gap_becomes_rest() {
        let source = timeline(vec![
            ChordEvent::new(0, vec![(60, 90)], Some(100)),
            ChordEvent::new(300, vec![(62, 90)], Some(200)),
        ]);

        let voice = VoiceTimeline::from_channel_timeline(&source, &VoiceBuildOptions::default())
            .unwrap();

        assert_eq!(voice.len(), 3);
        assert!(voice.get(1).unwrap().is_rest());
        assert_eq!(positions(&voice), vec![0, 100, 300]);
        assert_eq!(voice.end_ms(), 500);
    }

    #[test]
    fn test_overlap_is_clipped_to_next_onset() {
        let source = timeline(vec![
            ChordEvent::new(50, vec![(60, 90)], Some(400)),
            ChordEvent::new(150, vec![(62, 90)], Some(100)),
        ]);

        let voice = VoiceTimeline::from_channel_timeline(&source, &VoiceBuildOptions::default())
            .unwrap();

        assert_eq!(positions(&voice), vec![50, 150]);
        assert_eq!(voice.get(0).unwrap().duration_ms, 100);
    }

    #[test]
    fn test_spread_chord_is_merged() {
        let mut controllers = ControllerSnapshot::default();
        controllers.set(ControllerKind::Pan, 30);

        let mut source = ChannelTimeline::new(0);
        source.insert(
            0,
            vec![
                ChordEvent::new(0, vec![(60, 90)], Some(500)).with_controllers(controllers),
                ChordEvent::new(0, vec![(64, 70)], Some(700)),
            ],
        );

        let voice = VoiceTimeline::from_channel_timeline(&source, &VoiceBuildOptions::default())
            .unwrap();

        let item = voice.get(0).unwrap();
        let content = item.content().unwrap();
        assert_eq!(content.pitches, vec![60, 64]);
        assert_eq!(content.velocities, vec![90, 70]);
        assert_eq!(content.controllers.get(ControllerKind::Pan), Some(30));
        assert_eq!(item.duration_ms, 700);
    }

    #[test]
    fn test_unterminated_chords_resolve() {
        let source = timeline(vec![
            ChordEvent::new(0, vec![(60, 90)], None),
            ChordEvent::new(250, vec![(62, 90)], None),
        ]);

        let options = VoiceBuildOptions {
            final_duration_ms: 400,
            ..Default::default()
        };
        let voice = VoiceTimeline::from_channel_timeline(&source, &options).unwrap();

        assert_eq!(voice.get(0).unwrap().duration_ms, 250);
        assert_eq!(voice.get(1).unwrap().duration_ms, 400);
    }

    #[test]
    fn test_unterminated_pitches_outlast_terminated_ones() {
        let mut source = ChannelTimeline::new(0);
        source.insert(
            0,
            vec![
                ChordEvent::new(0, vec![(60, 90)], Some(100)),
                ChordEvent::new(0, vec![(72, 90)], None),
            ],
        );
        source.insert(1000, vec![ChordEvent::new(1000, vec![(64, 90)], Some(200))]);

        let voice = VoiceTimeline::from_channel_timeline(&source, &VoiceBuildOptions::default())
            .unwrap();

        assert_eq!(voice.len(), 2);
        assert_eq!(voice.get(0).unwrap().content().unwrap().pitches, vec![60, 72]);
        assert_eq!(voice.get(0).unwrap().duration_ms, 1000);
        assert_eq!(positions(&voice), vec![0, 1000]);

        let mut last = ChannelTimeline::new(0);
        last.insert(
            0,
            vec![
                ChordEvent::new(0, vec![(60, 90)], Some(100)),
                ChordEvent::new(0, vec![(72, 90)], None),
            ],
        );
        let options = VoiceBuildOptions {
            final_duration_ms: 750,
            ..Default::default()
        };
        let voice = VoiceTimeline::from_channel_timeline(&last, &options).unwrap();
        assert_eq!(voice.len(), 1);
        assert_eq!(voice.get(0).unwrap().duration_ms, 750);
    }

    #[test]
    fn test_short_gaps_are_absorbed() {
        let source = timeline(vec![
            ChordEvent::new(0, vec![(60, 90)], Some(95)),
            ChordEvent::new(100, vec![(62, 90)], Some(100)),
        ]);

        let options = VoiceBuildOptions {
            min_rest_ms: 10,
            ..Default::default()
        };
        let voice = VoiceTimeline::from_channel_timeline(&source, &options).unwrap();

        assert_eq!(voice.len(), 2);
        assert_eq!(voice.get(0).unwrap().duration_ms, 100);
    }

    #[test]
    fn test_empty_channel_fails() {
        let source = ChannelTimeline::new(0);
        assert_eq!(
            VoiceTimeline::from_channel_timeline(&source, &VoiceBuildOptions::default()),
            Err(VoiceError::EmptyTimeline)
        );
    }
}
