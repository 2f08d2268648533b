// Raw event types
// Timestamped note and controller messages as delivered by an external event source

use serde::{Deserialize, Serialize};

/// Highest value a 7-bit MIDI data byte can carry
pub const MAX_DATA_BYTE: u8 = 127;

/// Whether a note message starts or stops a sounding pitch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteKind {
    On,
    Off,
}

/// A single note-on or note-off message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawNoteEvent {
    /// MIDI channel (0-15)
    pub channel: u8,

    /// MIDI pitch (0-127)
    pub pitch: u8,

    /// MIDI velocity (0-127)
    pub velocity: u8,

    /// Timestamp in milliseconds from the start of the source
    pub timestamp_ms: u64,

    pub kind: NoteKind,
}

impl RawNoteEvent {
    /// Create a note-on message
    pub fn on(channel: u8, pitch: u8, velocity: u8, timestamp_ms: u64) -> Self {
        RawNoteEvent {
            channel,
            pitch,
            velocity,
            timestamp_ms,
            kind: NoteKind::On,
        }
    }

    /// Create a note-off message
    pub fn off(channel: u8, pitch: u8, timestamp_ms: u64) -> Self {
        RawNoteEvent {
            channel,
            pitch,
            velocity: 0,
            timestamp_ms,
            kind: NoteKind::Off,
        }
    }

    pub fn is_on(&self) -> bool {
        self.kind == NoteKind::On
    }
}

/// Controller families that can be attached to a chord
///
/// Each kind owns exactly one slot in a [`ControllerSnapshot`](super::ControllerSnapshot),
/// so later values of the same kind replace earlier ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerKind {
    /// Polyphonic key pressure
    Aftertouch,
    ChannelPressure,
    /// 14-bit pitch bend, centre 8192
    PitchWheel,
    BankSelect,
    Modulation,
    Volume,
    Pan,
    Expression,
    Sustain,
    ProgramChange,
    AllSoundOff,
    AllControllersOff,
    AllNotesOff,
}

impl ControllerKind {
    /// Number of distinct controller kinds
    pub const COUNT: usize = 13;

    /// Every kind, in slot order
    pub const ALL: [ControllerKind; ControllerKind::COUNT] = [
        ControllerKind::Aftertouch,
        ControllerKind::ChannelPressure,
        ControllerKind::PitchWheel,
        ControllerKind::BankSelect,
        ControllerKind::Modulation,
        ControllerKind::Volume,
        ControllerKind::Pan,
        ControllerKind::Expression,
        ControllerKind::Sustain,
        ControllerKind::ProgramChange,
        ControllerKind::AllSoundOff,
        ControllerKind::AllControllersOff,
        ControllerKind::AllNotesOff,
    ];

    /// Dense slot index of this kind
    pub fn index(self) -> usize {
        self as usize
    }

    /// Map a MIDI control-change number to a controller kind
    ///
    /// Returns `None` for controller numbers that have no slot.
    pub fn from_cc(controller: u8) -> Option<Self> {
        match controller {
            0 => Some(ControllerKind::BankSelect),
            1 => Some(ControllerKind::Modulation),
            7 => Some(ControllerKind::Volume),
            10 => Some(ControllerKind::Pan),
            11 => Some(ControllerKind::Expression),
            64 => Some(ControllerKind::Sustain),
            120 => Some(ControllerKind::AllSoundOff),
            121 => Some(ControllerKind::AllControllersOff),
            123 => Some(ControllerKind::AllNotesOff),
            _ => None,
        }
    }

    /// The control-change number for kinds sent as control changes
    pub fn cc_number(self) -> Option<u8> {
        match self {
            ControllerKind::BankSelect => Some(0),
            ControllerKind::Modulation => Some(1),
            ControllerKind::Volume => Some(7),
            ControllerKind::Pan => Some(10),
            ControllerKind::Expression => Some(11),
            ControllerKind::Sustain => Some(64),
            ControllerKind::AllSoundOff => Some(120),
            ControllerKind::AllControllersOff => Some(121),
            ControllerKind::AllNotesOff => Some(123),
            ControllerKind::Aftertouch
            | ControllerKind::ChannelPressure
            | ControllerKind::PitchWheel
            | ControllerKind::ProgramChange => None,
        }
    }
}

/// A single controller message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawControllerEvent {
    pub channel: u8,
    pub kind: ControllerKind,

    /// Controller value (14-bit for the pitch wheel, 7-bit otherwise)
    pub value: u16,

    pub timestamp_ms: u64,
}

impl RawControllerEvent {
    pub fn new(channel: u8, kind: ControllerKind, value: u16, timestamp_ms: u64) -> Self {
        RawControllerEvent {
            channel,
            kind,
            value,
            timestamp_ms,
        }
    }
}

/// Any message the aggregator consumes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RawEvent {
    Note(RawNoteEvent),
    Controller(RawControllerEvent),
}

impl RawEvent {
    pub fn timestamp_ms(&self) -> u64 {
        match self {
            RawEvent::Note(note) => note.timestamp_ms,
            RawEvent::Controller(controller) => controller.timestamp_ms,
        }
    }

    pub fn channel(&self) -> u8 {
        match self {
            RawEvent::Note(note) => note.channel,
            RawEvent::Controller(controller) => controller.channel,
        }
    }
}

impl From<RawNoteEvent> for RawEvent {
    fn from(event: RawNoteEvent) -> Self {
        RawEvent::Note(event)
    }
}

impl From<RawControllerEvent> for RawEvent {
    fn from(event: RawControllerEvent) -> Self {
        RawEvent::Controller(event)
    }
}

/// All messages read from one source track
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackEvents {
    /// Track name, if the source provides one
    pub name: Option<String>,

    pub events: Vec<RawEvent>,
}

impl TrackEvents {
    /// Create a track from its events
    pub fn new(events: Vec<RawEvent>) -> Self {
        TrackEvents { name: None, events }
    }

    /// Attach a track name
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Add an event to the track
    pub fn push(&mut self, event: impl Into<RawEvent>) {
        self.events.push(event.into());
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Check whether the track holds at least one note-on
    pub fn has_note_ons(&self) -> bool {
        self.events
            .iter()
            .any(|event| matches!(event, RawEvent::Note(note) if note.is_on()))
    }
}
