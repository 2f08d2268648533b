// Raw event model
// Note and controller messages consumed by the aggregator

pub mod controllers;
pub mod types;

pub use controllers::{ControllerAccumulator, ControllerSnapshot};
pub use types::{
    ControllerKind, NoteKind, RawControllerEvent, RawEvent, RawNoteEvent, TrackEvents,
    MAX_DATA_BYTE,
};
