// MIDI - Standard MIDI File import and export
// Import yields per-track raw events for aggregation; export writes a voice back out

pub mod export;
pub mod import;

pub use export::{export_voice, MidiExportOptions};
pub use import::{import_smf, MidiImportOptions};

use thiserror::Error;

/// Errors that can occur while reading or writing MIDI files
#[derive(Debug, Error)]
pub enum MidiError {
    #[error("MIDI parse error: {0}")]
    ParseError(#[from] midly::Error),

    #[error("MIDI write error: {0}")]
    WriteError(#[from] std::io::Error),

    #[error("MIDI channel {0} is outside 0..=15")]
    InvalidChannel(u8),

    #[error("Tempo {0} BPM must be finite and positive")]
    InvalidTempo(f64),
}
