// Track aggregation
// Groups note-ons by onset, matches note-offs and folds in pending controllers

use std::collections::BTreeMap;

use super::chord::{ChannelTimeline, ChordEvent};
use super::AggregateError;
use crate::events::{
    ControllerAccumulator, NoteKind, RawControllerEvent, RawEvent, RawNoteEvent, TrackEvents,
    MAX_DATA_BYTE,
};

/// Duration given to a note whose note-off shares its onset timestamp
pub const MIN_EXPLICIT_DURATION_MS: u64 = 1;

/// A note-off waiting to be matched
#[derive(Debug, Clone, Copy)]
struct PendingOff {
    /// Position in the time-ordered track
    position: usize,
    note: RawNoteEvent,
    consumed: bool,
}

/// Aggregate one track into a channel timeline
///
/// Algorithm:
/// 1. Order events by timestamp (stable, so equal timestamps keep stream order)
/// 2. Group note-ons sharing a timestamp into onset groups
/// 3. Match each note-on to the earliest unused note-off of the same pitch
///    that follows it, splitting the group by note-off time
/// 4. Fold controllers at or before the onset into `pending`; the first chord
///    emitted at the onset takes the accumulated snapshot
///
/// Returns `Ok(None)` for tracks without note-ons. Onsets are not normalized here.
pub fn aggregate_track(
    track: &TrackEvents,
    track_index: usize,
    pending: &mut ControllerAccumulator,
) -> Result<Option<ChannelTimeline>, AggregateError> {
    let channel = match track_channel(track, track_index)? {
        Some(channel) => channel,
        None => return Ok(None),
    };

    let mut ordered: Vec<&RawEvent> = track.events.iter().collect();
    ordered.sort_by_key(|event| event.timestamp_ms());

    let mut onset_groups: BTreeMap<u64, Vec<(usize, RawNoteEvent)>> = BTreeMap::new();
    let mut offs: Vec<PendingOff> = Vec::new();
    let mut controllers: Vec<RawControllerEvent> = Vec::new();

    for (position, event) in ordered.into_iter().enumerate() {
        match event {
            RawEvent::Note(note) => {
                validate_note(note)?;
                match note.kind {
                    NoteKind::On => onset_groups
                        .entry(note.timestamp_ms)
                        .or_default()
                        .push((position, *note)),
                    NoteKind::Off => offs.push(PendingOff {
                        position,
                        note: *note,
                        consumed: false,
                    }),
                }
            }
            RawEvent::Controller(controller) => controllers.push(*controller),
        }
    }

    if onset_groups.is_empty() {
        log::debug!(
            "Track {} (channel {}) has no note-ons, skipping",
            track_index,
            channel
        );
        return Ok(None);
    }

    let mut timeline = ChannelTimeline::new(channel);
    let mut next_controller = 0;

    for (onset_ms, group) in onset_groups {
        while let Some(controller) = controllers.get(next_controller) {
            if controller.timestamp_ms > onset_ms {
                break;
            }
            pending.fold(controller);
            next_controller += 1;
        }

        let chords = resolve_onset_group(onset_ms, &group, &mut offs, pending);
        timeline.insert(onset_ms, chords);
    }

    // Controllers after the last onset stay pending for the caller
    for controller in &controllers[next_controller..] {
        pending.fold(controller);
    }

    let orphan_offs = offs.iter().filter(|off| !off.consumed).count();
    if orphan_offs > 0 {
        log::trace!(
            "Track {}: {} note-offs without a preceding note-on",
            track_index,
            orphan_offs
        );
    }

    log::debug!(
        "Track {} (channel {}): {} onsets, {} chords",
        track_index,
        channel,
        timeline.len(),
        timeline.chord_count()
    );

    Ok(Some(timeline))
}

/// Resolve one onset group into chords, one per distinct note-off time
///
/// Chords come out ordered by end time; the unterminated chord, if any, is last.
fn resolve_onset_group(
    onset_ms: u64,
    group: &[(usize, RawNoteEvent)],
    offs: &mut [PendingOff],
    pending: &mut ControllerAccumulator,
) -> Vec<ChordEvent> {
    let mut by_off_time: BTreeMap<u64, Vec<(u8, u8)>> = BTreeMap::new();
    let mut unterminated: Vec<(u8, u8)> = Vec::new();

    for (position, on) in group {
        match take_matching_off(offs, *position, on.pitch) {
            Some(off_ms) => by_off_time
                .entry(off_ms)
                .or_default()
                .push((on.pitch, on.velocity)),
            None => unterminated.push((on.pitch, on.velocity)),
        }
    }

    let mut chords = Vec::with_capacity(by_off_time.len() + 1);

    for (off_ms, notes) in by_off_time {
        let mut duration_ms = off_ms - onset_ms;
        if duration_ms == 0 {
            log::warn!(
                "Zero-length note at {} ms, using {} ms",
                onset_ms,
                MIN_EXPLICIT_DURATION_MS
            );
            duration_ms = MIN_EXPLICIT_DURATION_MS;
        }
        chords.push(ChordEvent::new(onset_ms, notes, Some(duration_ms)));
    }

    if !unterminated.is_empty() {
        log::warn!(
            "{} note(s) at {} ms have no note-off",
            unterminated.len(),
            onset_ms
        );
        chords.push(ChordEvent::new(onset_ms, unterminated, None));
    }

    if let Some(first) = chords.first_mut() {
        first.controllers = pending.take();
    }

    chords
}

/// Consume the earliest unused note-off of `pitch` after `position`
fn take_matching_off(offs: &mut [PendingOff], position: usize, pitch: u8) -> Option<u64> {
    let off = offs
        .iter_mut()
        .find(|off| !off.consumed && off.position > position && off.note.pitch == pitch)?;
    off.consumed = true;
    Some(off.note.timestamp_ms)
}

/// The single channel used by a track, or `None` for an empty track
pub(super) fn track_channel(track: &TrackEvents, track_index: usize) -> Result<Option<u8>, AggregateError> {
    let mut events = track.events.iter();
    let expected = match events.next() {
        Some(event) => event.channel(),
        None => return Ok(None),
    };

    for event in events {
        if event.channel() != expected {
            return Err(AggregateError::MixedChannels {
                track: track_index,
                expected,
                found: event.channel(),
            });
        }
    }

    Ok(Some(expected))
}

fn validate_note(note: &RawNoteEvent) -> Result<(), AggregateError> {
    if note.pitch > MAX_DATA_BYTE {
        return Err(AggregateError::PitchOutOfRange { pitch: note.pitch });
    }
    if note.velocity > MAX_DATA_BYTE {
        return Err(AggregateError::VelocityOutOfRange {
            velocity: note.velocity,
        });
    }
    Ok(())
}
