// MIDI Export - Convert voice timelines to MIDI files using midly crate
// Produces a meta track plus one voice track with controllers, note-ons and note-offs

use midly::num::{u14, u4, u7};
use midly::{
    Header, MetaMessage, MidiMessage, PitchBend, Smf, Timing, Track, TrackEvent, TrackEventKind,
};
use serde::{Deserialize, Serialize};

use super::MidiError;
use crate::events::{ControllerKind, MAX_DATA_BYTE};
use crate::voice::{ChordContent, VoiceTimeline};

/// Highest MIDI channel number (0-indexed)
const MAX_CHANNEL: u8 = 15;

/// MIDI export options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MidiExportOptions {
    /// Pulses per quarter note (PPQ) - typically 480 or 960
    pub ppq: u16,

    /// Tempo used to convert milliseconds to ticks
    pub bpm: f64,

    /// Include tempo metadata
    pub include_tempo: bool,

    /// Name written to the voice track, if any
    pub track_name: Option<String>,
}

impl Default for MidiExportOptions {
    fn default() -> Self {
        MidiExportOptions {
            ppq: 480,
            bpm: 120.0,
            include_tempo: true,
            track_name: None,
        }
    }
}

/// Export a voice timeline to MIDI file bytes
///
/// Each chord item sends its controller snapshot, then its note-ons, at the
/// item position and its note-offs at the item end. Rests send nothing.
pub fn export_voice(
    voice: &VoiceTimeline,
    channel: u8,
    options: &MidiExportOptions,
) -> Result<Vec<u8>, MidiError> {
    if channel > MAX_CHANNEL {
        return Err(MidiError::InvalidChannel(channel));
    }
    if !(options.bpm.is_finite() && options.bpm > 0.0) {
        return Err(MidiError::InvalidTempo(options.bpm));
    }

    let header = Header {
        format: midly::Format::Parallel,
        timing: Timing::Metrical(options.ppq.max(1).into()),
    };

    let ticks_per_ms = calculate_ticks_per_ms(options.bpm, options.ppq.max(1));

    // Track 0: tempo metadata
    let mut meta_track = Track::new();
    if options.include_tempo {
        add_tempo(&mut meta_track, 0, options.bpm);
    }
    add_end_of_track(&mut meta_track, 0);

    let voice_track = create_voice_track(voice, channel, ticks_per_ms, options);

    let smf = Smf {
        header,
        tracks: vec![meta_track, voice_track],
    };

    let mut bytes = Vec::new();
    smf.write_std(&mut bytes)?;

    log::debug!(
        "Exported voice of {} items on channel {} ({} bytes)",
        voice.len(),
        channel,
        bytes.len()
    );

    Ok(bytes)
}

/// Ordering of events sharing a tick: note-offs, then controllers, then note-ons
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Slot {
    NoteOff,
    Controller,
    NoteOn,
}

/// Create the MIDI track for a voice
fn create_voice_track<'a>(
    voice: &VoiceTimeline,
    channel: u8,
    ticks_per_ms: f64,
    options: &'a MidiExportOptions,
) -> Track<'a> {
    let channel = u4::from(channel);
    let mut events: Vec<(u32, Slot, TrackEventKind<'a>)> = Vec::new();

    if let Some(ref name) = options.track_name {
        events.push((
            0,
            Slot::Controller,
            TrackEventKind::Meta(MetaMessage::TrackName(name.as_bytes())),
        ));
    }

    for item in voice {
        let content = match item.content() {
            Some(content) => content,
            None => continue,
        };

        // Notes last at least one tick so each note-off follows its note-on
        let tick_on = (item.position_ms as f64 * ticks_per_ms).round() as u32;
        let tick_off = (item.end_ms() as f64 * ticks_per_ms).round() as u32;
        let tick_off = tick_off.max(tick_on.saturating_add(1));

        for message in controller_messages(content) {
            events.push((tick_on, Slot::Controller, TrackEventKind::Midi { channel, message }));
        }

        for (&pitch, &velocity) in content.pitches.iter().zip(content.velocities.iter()) {
            events.push((
                tick_on,
                Slot::NoteOn,
                TrackEventKind::Midi {
                    channel,
                    message: MidiMessage::NoteOn {
                        key: pitch.into(),
                        vel: velocity.clamp(1, MAX_DATA_BYTE).into(),
                    },
                },
            ));
            events.push((
                tick_off,
                Slot::NoteOff,
                TrackEventKind::Midi {
                    channel,
                    message: MidiMessage::NoteOff {
                        key: pitch.into(),
                        vel: 0.into(),
                    },
                },
            ));
        }
    }

    // Sort events by tick (absolute time), keeping the slot order within a tick
    events.sort_by_key(|(tick, slot, _)| (*tick, *slot));

    // Convert to delta times and add to track
    let mut track = Track::new();
    let mut last_tick = 0;
    for (tick, _, kind) in events {
        let delta = tick.saturating_sub(last_tick);
        track.push(TrackEvent {
            delta: delta.into(),
            kind,
        });
        last_tick = tick;
    }

    let end_tick = (voice.end_ms() as f64 * ticks_per_ms).round() as u32;
    add_end_of_track(&mut track, end_tick.saturating_sub(last_tick));

    track
}

/// Channel messages for a chord's controller snapshot
fn controller_messages(content: &ChordContent) -> Vec<MidiMessage> {
    let mut messages = Vec::new();

    for (kind, value) in content.controllers.iter() {
        let data = u7::from(value.min(MAX_DATA_BYTE as u16) as u8);
        match kind {
            ControllerKind::Aftertouch => {
                for &pitch in &content.pitches {
                    messages.push(MidiMessage::Aftertouch {
                        key: pitch.into(),
                        vel: data,
                    });
                }
            }
            ControllerKind::ChannelPressure => {
                messages.push(MidiMessage::ChannelAftertouch { vel: data });
            }
            ControllerKind::PitchWheel => {
                messages.push(MidiMessage::PitchBend {
                    bend: PitchBend(u14::from(value.min(0x3FFF))),
                });
            }
            ControllerKind::ProgramChange => {
                messages.push(MidiMessage::ProgramChange { program: data });
            }
            _ => {
                if let Some(number) = kind.cc_number() {
                    messages.push(MidiMessage::Controller {
                        controller: number.into(),
                        value: data,
                    });
                }
            }
        }
    }

    messages
}

/// Calculate ticks per millisecond
fn calculate_ticks_per_ms(bpm: f64, ppq: u16) -> f64 {
    // Milliseconds per quarter note
    let ms_per_quarter = 60_000.0 / bpm;

    ppq as f64 / ms_per_quarter
}

/// Add tempo meta message
fn add_tempo(track: &mut Track<'_>, delta: u32, bpm: f64) {
    // Convert BPM to microseconds per quarter note (24-bit)
    let us_per_quarter = ((60_000_000.0 / bpm) as u32).min(0x00FF_FFFF);

    track.push(TrackEvent {
        delta: delta.into(),
        kind: TrackEventKind::Meta(MetaMessage::Tempo(us_per_quarter.into())),
    });
}

/// Add end of track message
fn add_end_of_track(track: &mut Track<'_>, delta: u32) {
    track.push(TrackEvent {
        delta: delta.into(),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });
}
