use std::path::PathBuf;
use thiserror::Error;

/// Failures surfaced before or around a decode pass.
///
/// Decoding a well-tokenized stream never fails by itself; everything here is a
/// boundary problem (bad header, bad arguments, unreadable or untokenizable bytes).
#[derive(Debug, Error)]
pub enum ScoreError {
    /// The header carried a zero ticks-per-quarter resolution.
    #[error("ticks per quarter must be greater than zero")]
    ZeroTicksPerQuarter,

    /// SMPTE timecode files have no quarter-note resolution to decode against.
    #[error("SMPTE timecode midi timing is not supported")]
    UnsupportedTiming,

    /// The requested time representation cannot be built through this entry point.
    #[error("cannot construct a score in '{unit}' time directly from {source_kind}")]
    UnsupportedTimeUnit {
        unit: &'static str,
        source_kind: &'static str,
    },

    #[error("failed to read MIDI file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse MIDI: {0}")]
    Parse(#[from] midly::Error),
}

pub type Result<T> = std::result::Result<T, ScoreError>;
