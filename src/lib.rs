// Chordline - Chord event aggregation and voice timelines
// Module declarations

pub mod aggregator;
pub mod events;
pub mod midi;
pub mod pipeline;
pub mod voice;

pub use aggregator::{aggregate, AggregateError, Aggregation, ChannelTimeline, ChordEvent};
pub use events::{ControllerKind, RawEvent, TrackEvents};
pub use midi::{export_voice, import_smf, MidiError};
pub use pipeline::{run_pipeline, PipelineConfig, PipelineError, PipelineOutput};
pub use voice::{ChordContent, DurationItem, Palette, VoiceError, VoiceTimeline};
