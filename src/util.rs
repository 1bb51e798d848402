use crate::model::time::TimeKind;
use log::info;
use midly::{MidiMessage, Smf, TrackEventKind};

pub fn parse_time_unit(s: &str) -> TimeKind {
    match s.to_lowercase().as_str() {
        "t" | "tick" | "ticks" => TimeKind::Tick,
        "q" | "quarter" | "quarters" => TimeKind::Quarter,
        "s" | "second" | "seconds" => TimeKind::Second,
        other => {
            info!("Unknown time unit '{}', defaulting to `tick`..!", other);
            TimeKind::Tick
        }
    }
}

/// Naive note count: every note-on with a nonzero velocity and a nonzero pitch.
///
/// Matches the decoded note count whenever each note-on is followed by a strictly
/// later note-off for the same channel and pitch.
pub fn count_note_ons(smf: &Smf) -> usize {
    smf.tracks
        .iter()
        .flat_map(|track| track.iter())
        .filter(|event| match event.kind {
            TrackEventKind::Midi {
                message: MidiMessage::NoteOn { key, vel },
                ..
            } => key.as_int() != 0 && vel.as_int() != 0,
            _ => false,
        })
        .count()
}
