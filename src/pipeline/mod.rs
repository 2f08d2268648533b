// Pipeline - Orchestrates MIDI import, aggregation and voice building
// Optionally records each stage to a JSONL trace

pub mod trace;

pub use trace::{read_trace_file, Stage, TraceBuilder, TraceEntry, TraceError, TraceWriter};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::aggregator::{aggregate, AggregateError, Aggregation};
use crate::midi::{import_smf, MidiError, MidiImportOptions};
use crate::voice::{VoiceBuildOptions, VoiceError, VoiceTimeline};

/// Errors that can occur while running the pipeline
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("MIDI error: {0}")]
    Midi(#[from] MidiError),

    #[error("Aggregation error: {0}")]
    Aggregate(#[from] AggregateError),

    #[error("Voice error on channel {channel}: {source}")]
    Voice { channel: u8, source: VoiceError },

    #[error("Trace error: {0}")]
    Trace(#[from] TraceError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Config error: {0}")]
    ConfigError(#[from] serde_json::Error),
}

/// Pipeline settings, loadable from JSON
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub import: MidiImportOptions,

    pub voice: VoiceBuildOptions,

    /// JSONL trace destination; no trace is written when unset
    pub trace_path: Option<PathBuf>,
}

impl PipelineConfig {
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let contents = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&contents)?;
        log::debug!("Loaded pipeline config from {}", path.display());
        Ok(config)
    }
}

/// Result of a pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineOutput {
    /// Normalized chord timelines per channel
    pub aggregation: Aggregation,

    /// One voice per channel
    pub voices: BTreeMap<u8, VoiceTimeline>,
}

/// Writes trace entries when a trace path is configured
struct Tracer(Option<TraceWriter>);

impl Tracer {
    fn open(path: Option<&Path>) -> Result<Self, TraceError> {
        path.map(TraceWriter::create).transpose().map(Tracer)
    }

    fn record(&self, entry: TraceEntry) -> Result<(), TraceError> {
        match self.0 {
            Some(ref writer) => writer.write(&entry),
            None => Ok(()),
        }
    }
}

/// Import a Standard MIDI File, aggregate it and build one voice per channel
pub fn run_pipeline(data: &[u8], config: &PipelineConfig) -> Result<PipelineOutput, PipelineError> {
    let tracer = Tracer::open(config.trace_path.as_deref())?;

    tracer.record(TraceBuilder::stage(Stage::Import).start("Parsing MIDI file"))?;
    let tracks = import_smf(data, &config.import)?;
    let event_count: usize = tracks.iter().map(|track| track.events.len()).sum();
    tracer.record(
        TraceBuilder::stage(Stage::Import)
            .complete(format!("Imported {} tracks", tracks.len()))
            .with_data(serde_json::json!({
                "tracks": tracks.len(),
                "events": event_count,
            })),
    )?;

    tracer.record(TraceBuilder::stage(Stage::Aggregate).start("Aggregating chord events"))?;
    let aggregation = aggregate(&tracks)?;
    let chord_count: usize = aggregation
        .channels
        .values()
        .map(|timeline| timeline.chord_count())
        .sum();
    tracer.record(
        TraceBuilder::stage(Stage::Aggregate)
            .complete(format!("Aggregated {} channels", aggregation.len()))
            .with_data(serde_json::json!({
                "channels": aggregation.len(),
                "chords": chord_count,
            })),
    )?;

    tracer.record(TraceBuilder::stage(Stage::Voice).start("Building voices"))?;
    let total = aggregation.len();
    let mut voices = BTreeMap::new();
    for (done, (&channel, timeline)) in aggregation.channels.iter().enumerate() {
        let voice = VoiceTimeline::from_channel_timeline(timeline, &config.voice)
            .map_err(|source| PipelineError::Voice { channel, source })?;

        tracer.record(
            TraceBuilder::stage(Stage::Voice)
                .progress(
                    (done + 1) as f32 / total as f32,
                    format!("Built voice for channel {}", channel),
                )
                .with_data(serde_json::json!({
                    "channel": channel,
                    "items": voice.len(),
                    "duration_ms": voice.duration_ms(),
                })),
        )?;
        voices.insert(channel, voice);
    }
    tracer.record(TraceBuilder::stage(Stage::Voice).complete("Voices ready"))?;

    log::info!(
        "Pipeline produced {} voices from {} tracks",
        voices.len(),
        tracks.len()
    );

    Ok(PipelineOutput {
        aggregation,
        voices,
    })
}
