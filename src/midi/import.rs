// MIDI Import - Read Standard MIDI Files into per-track raw events using midly
// Converts ticks to milliseconds with the file's tempo map

use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::MidiError;
use crate::events::{ControllerKind, RawControllerEvent, RawEvent, RawNoteEvent, TrackEvents};

/// MIDI import options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MidiImportOptions {
    /// Tempo assumed until the first tempo event
    pub default_bpm: f64,

    /// Split tracks that use several channels into one track per channel
    /// (needed for format 0 files)
    pub split_channels: bool,
}

impl Default for MidiImportOptions {
    fn default() -> Self {
        MidiImportOptions {
            default_bpm: 120.0,
            split_channels: true,
        }
    }
}

/// Tempo segment: from `tick` on, a quarter note lasts `us_per_quarter`
#[derive(Debug, Clone, Copy)]
struct TempoSegment {
    tick: u64,
    ms: f64,
    us_per_quarter: f64,
}

/// Converts absolute ticks to milliseconds
#[derive(Debug, Clone)]
enum TickClock {
    Metrical { ppq: f64, segments: Vec<TempoSegment> },
    Timecode { ticks_per_second: f64 },
}

impl TickClock {
    /// Build a clock from the header timing and all tempo events in the file
    fn new(smf: &Smf, default_bpm: f64) -> Self {
        match smf.header.timing {
            Timing::Metrical(ppq) => {
                let mut changes: BTreeMap<u64, u32> = BTreeMap::new();
                for track in &smf.tracks {
                    let mut tick = 0u64;
                    for event in track {
                        tick += event.delta.as_int() as u64;
                        if let TrackEventKind::Meta(MetaMessage::Tempo(tempo)) = event.kind {
                            changes.insert(tick, tempo.as_int());
                        }
                    }
                }

                let ppq = ppq.as_int().max(1) as f64;
                let mut segments = vec![TempoSegment {
                    tick: 0,
                    ms: 0.0,
                    us_per_quarter: 60_000_000.0 / default_bpm,
                }];

                for (tick, us_per_quarter) in changes {
                    let last = segments[segments.len() - 1];
                    let ms = last.ms + (tick - last.tick) as f64 * last.us_per_quarter / ppq / 1000.0;
                    let segment = TempoSegment {
                        tick,
                        ms,
                        us_per_quarter: us_per_quarter as f64,
                    };
                    if tick == last.tick {
                        let end = segments.len() - 1;
                        segments[end] = segment;
                    } else {
                        segments.push(segment);
                    }
                }

                TickClock::Metrical { ppq, segments }
            }
            Timing::Timecode(fps, subframes) => TickClock::Timecode {
                ticks_per_second: fps.as_f32() as f64 * subframes.max(1) as f64,
            },
        }
    }

    fn to_ms(&self, tick: u64) -> u64 {
        let ms = match self {
            TickClock::Metrical { ppq, segments } => {
                let index = segments.partition_point(|segment| segment.tick <= tick);
                let segment = segments[index.saturating_sub(1)];
                segment.ms + (tick - segment.tick) as f64 * segment.us_per_quarter / ppq / 1000.0
            }
            TickClock::Timecode { ticks_per_second } => tick as f64 * 1000.0 / ticks_per_second,
        };
        ms.round() as u64
    }
}

/// Parse a Standard MIDI File into per-track raw events
///
/// Note-ons with velocity 0 are read as note-offs. Control changes without a
/// [`ControllerKind`] are skipped. Tracks with no channel messages are kept
/// (with their names) but hold no events.
pub fn import_smf(data: &[u8], options: &MidiImportOptions) -> Result<Vec<TrackEvents>, MidiError> {
    if !(options.default_bpm.is_finite() && options.default_bpm > 0.0) {
        return Err(MidiError::InvalidTempo(options.default_bpm));
    }

    let smf = Smf::parse(data)?;
    let clock = TickClock::new(&smf, options.default_bpm);

    let mut tracks = Vec::with_capacity(smf.tracks.len());
    let mut skipped_controllers = 0usize;

    for track in &smf.tracks {
        let mut events = TrackEvents::default();
        let mut tick = 0u64;

        for event in track {
            tick += event.delta.as_int() as u64;
            match event.kind {
                TrackEventKind::Midi { channel, message } => {
                    let channel = channel.as_int();
                    let timestamp_ms = clock.to_ms(tick);
                    match convert_message(channel, message, timestamp_ms) {
                        Some(raw) => events.events.push(raw),
                        None => skipped_controllers += 1,
                    }
                }
                TrackEventKind::Meta(MetaMessage::TrackName(name)) => {
                    events.name = Some(String::from_utf8_lossy(name).into_owned());
                }
                _ => {}
            }
        }

        if options.split_channels {
            tracks.extend(split_by_channel(events));
        } else {
            tracks.push(events);
        }
    }

    if skipped_controllers > 0 {
        log::trace!("Skipped {} unsupported channel messages", skipped_controllers);
    }
    log::debug!(
        "Imported {} tracks ({} events)",
        tracks.len(),
        tracks.iter().map(|t| t.events.len()).sum::<usize>()
    );

    Ok(tracks)
}

/// Convert a channel message, or `None` if it has no raw-event counterpart
fn convert_message(channel: u8, message: MidiMessage, timestamp_ms: u64) -> Option<RawEvent> {
    let controller = |kind: ControllerKind, value: u16| -> Option<RawEvent> {
        Some(RawEvent::Controller(RawControllerEvent::new(
            channel,
            kind,
            value,
            timestamp_ms,
        )))
    };

    match message {
        MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
            Some(RawNoteEvent::on(channel, key.as_int(), vel.as_int(), timestamp_ms).into())
        }
        MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
            Some(RawNoteEvent::off(channel, key.as_int(), timestamp_ms).into())
        }
        MidiMessage::Aftertouch { vel, .. } => {
            controller(ControllerKind::Aftertouch, vel.as_int() as u16)
        }
        MidiMessage::ChannelAftertouch { vel } => {
            controller(ControllerKind::ChannelPressure, vel.as_int() as u16)
        }
        MidiMessage::PitchBend { bend } => controller(ControllerKind::PitchWheel, bend.0.as_int()),
        MidiMessage::ProgramChange { program } => {
            controller(ControllerKind::ProgramChange, program.as_int() as u16)
        }
        MidiMessage::Controller { controller: number, value } => {
            let kind = ControllerKind::from_cc(number.as_int())?;
            controller(kind, value.as_int() as u16)
        }
    }
}

/// Split a track into one track per channel, in channel order
fn split_by_channel(track: TrackEvents) -> Vec<TrackEvents> {
    let mut by_channel: BTreeMap<u8, Vec<RawEvent>> = BTreeMap::new();
    for event in track.events {
        by_channel.entry(event.channel()).or_default().push(event);
    }

    if by_channel.len() <= 1 {
        let events = by_channel.into_values().next().unwrap_or_default();
        return vec![TrackEvents {
            name: track.name,
            events,
        }];
    }

    by_channel
        .into_iter()
        .map(|(channel, events)| TrackEvents {
            name: track
                .name
                .as_ref()
                .map(|name| format!("{} (channel {})", name, channel + 1)),
            events,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use midly::num::{u15, u28, u4, u7};
    use midly::{Format, Header, Track, TrackEvent};

    fn write_smf(tracks: Vec<Track<'static>>, ppq: u16) -> Vec<u8> {
        let smf = Smf {
            header: Header {
                format: Format::Parallel,
                timing: Timing::Metrical(u15::from(ppq)),
            },
            tracks,
        };
        let mut bytes = Vec::new();
        smf.write_std(&mut bytes).unwrap();
        bytes
    }

    fn midi(delta: u32, channel: u8, message: MidiMessage) -> TrackEvent<'static> {
        TrackEvent {
            delta: u28::from(delta),
            kind: TrackEventKind::Midi {
                channel: u4::from(channel),
                message,
            },
        }
    }

    fn end(delta: u32) -> TrackEvent<'static> {
        TrackEvent {
            delta: u28::from(delta),
            kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
        }
    }

    #[test]
    fn test_default_tempo_conversion() {
        // 480 PPQ at 120 BPM: one quarter note = 480 ticks = 500 ms
        let track = vec![
            midi(0, 0, MidiMessage::NoteOn { key: u7::from(60), vel: u7::from(100) }),
            midi(480, 0, MidiMessage::NoteOff { key: u7::from(60), vel: u7::from(0) }),
            end(0),
        ];
        let bytes = write_smf(vec![track], 480);

        let tracks = import_smf(&bytes, &MidiImportOptions::default()).unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].events.len(), 2);
        assert_eq!(tracks[0].events[1].timestamp_ms(), 500);
    }

    #[test]
    fn test_tempo_change_applies_from_its_tick() {
        let conductor = vec![
            TrackEvent {
                delta: u28::from(480),
                // 60 BPM
                kind: TrackEventKind::Meta(MetaMessage::Tempo(1_000_000.into())),
            },
            end(0),
        ];
        let notes = vec![
            midi(0, 1, MidiMessage::NoteOn { key: u7::from(60), vel: u7::from(100) }),
            midi(960, 1, MidiMessage::NoteOn { key: u7::from(60), vel: u7::from(0) }),
            end(0),
        ];
        let bytes = write_smf(vec![conductor, notes], 480);

        let tracks = import_smf(&bytes, &MidiImportOptions::default()).unwrap();
        let note_track = &tracks[1];
        // First beat at 120 BPM (500 ms), second at 60 BPM (1000 ms)
        assert_eq!(note_track.events[1].timestamp_ms(), 1500);
        assert!(matches!(
            note_track.events[1],
            RawEvent::Note(RawNoteEvent { kind: crate::events::NoteKind::Off, .. })
        ));
    }

    #[test]
    fn test_controllers_are_mapped() {
        let track = vec![
            midi(0, 2, MidiMessage::Controller { controller: u7::from(7), value: u7::from(90) }),
            midi(0, 2, MidiMessage::Controller { controller: u7::from(74), value: u7::from(10) }),
            midi(0, 2, MidiMessage::ProgramChange { program: u7::from(5) }),
            end(0),
        ];
        let bytes = write_smf(vec![track], 480);

        let tracks = import_smf(&bytes, &MidiImportOptions::default()).unwrap();
        assert_eq!(
            tracks[0].events,
            vec![
                RawControllerEvent::new(2, ControllerKind::Volume, 90, 0).into(),
                RawControllerEvent::new(2, ControllerKind::ProgramChange, 5, 0).into(),
            ]
        );
    }

    #[test]
    fn test_multi_channel_track_is_split() {
        let track = vec![
            midi(0, 0, MidiMessage::NoteOn { key: u7::from(60), vel: u7::from(100) }),
            midi(0, 3, MidiMessage::NoteOn { key: u7::from(48), vel: u7::from(100) }),
            end(0),
        ];
        let bytes = write_smf(vec![track], 480);

        let tracks = import_smf(&bytes, &MidiImportOptions::default()).unwrap();
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].events[0].channel(), 0);
        assert_eq!(tracks[1].events[0].channel(), 3);

        let options = MidiImportOptions {
            split_channels: false,
            ..Default::default()
        };
        let tracks = import_smf(&bytes, &options).unwrap();
        assert_eq!(tracks.len(), 1);
    }

    #[test]
    fn test_invalid_input() {
        assert!(matches!(
            import_smf(b"not a midi file", &MidiImportOptions::default()),
            Err(MidiError::ParseError(_))
        ));

        let options = MidiImportOptions {
            default_bpm: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            import_smf(&[], &options),
            Err(MidiError::InvalidTempo(_))
        ));
    }
}
