use crate::error::{Result, ScoreError};
use midly::{Header, MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};

/// One raw MIDI track as delivered by the tokenizer, in nondecreasing tick order.
pub type RawTrack = Vec<RawEvent>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    /// Absolute tick since the start of the track.
    pub tick: u64,
    pub message: RawMessage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaKind {
    TrackName,
    TimeSignature,
    SetTempo,
    KeySignature,
    Lyric,
    Marker,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawMessage {
    NoteOn {
        channel: u8,
        pitch: u8,
        velocity: u8,
    },
    NoteOff {
        channel: u8,
        pitch: u8,
        velocity: u8,
    },
    ProgramChange {
        channel: u8,
        program: u8,
    },
    /// `program` is the message's own program slot, which is what control changes
    /// are grouped by (not the channel's running program).
    ControlChange {
        channel: u8,
        program: u8,
        controller: u8,
        value: u8,
    },
    PitchBend {
        channel: u8,
        value: i32,
    },
    /// Meta event with its raw payload bytes.
    Meta { kind: MetaKind, data: Vec<u8> },
    Other,
}

impl RawEvent {
    pub fn new(tick: u64, message: RawMessage) -> Self {
        Self { tick, message }
    }
}

/// Metrical resolution of a file; timecode files and a zero resolution are rejected.
pub fn ticks_per_quarter(header: &Header) -> Result<u16> {
    match header.timing {
        Timing::Metrical(ticks) if ticks.as_int() == 0 => Err(ScoreError::ZeroTicksPerQuarter),
        Timing::Metrical(ticks) => Ok(ticks.as_int()),
        Timing::Timecode(_fps, _subframe) => Err(ScoreError::UnsupportedTiming),
    }
}

/// Flatten every midly track into absolute-tick raw events.
pub fn raw_tracks_from_smf(smf: &Smf) -> Vec<RawTrack> {
    smf.tracks
        .iter()
        .map(|track| {
            let mut abs_tick: u64 = 0;
            track
                .iter()
                .map(|event| {
                    abs_tick = abs_tick.saturating_add(event.delta.as_int() as u64);
                    RawEvent::new(abs_tick, raw_message(&event.kind))
                })
                .collect()
        })
        .collect()
}

fn raw_message(kind: &TrackEventKind) -> RawMessage {
    match kind {
        TrackEventKind::Midi { channel, message } => {
            let channel = channel.as_int();
            match *message {
                MidiMessage::NoteOn { key, vel } => RawMessage::NoteOn {
                    channel,
                    pitch: key.as_int(),
                    velocity: vel.as_int(),
                },
                MidiMessage::NoteOff { key, vel } => RawMessage::NoteOff {
                    channel,
                    pitch: key.as_int(),
                    velocity: vel.as_int(),
                },
                MidiMessage::ProgramChange { program } => RawMessage::ProgramChange {
                    channel,
                    program: program.as_int(),
                },
                // the program slot of a controller message is its first data byte
                MidiMessage::Controller { controller, value } => RawMessage::ControlChange {
                    channel,
                    program: controller.as_int(),
                    controller: controller.as_int(),
                    value: value.as_int(),
                },
                MidiMessage::PitchBend { bend } => RawMessage::PitchBend {
                    channel,
                    value: bend.as_int() as i32,
                },
                MidiMessage::Aftertouch { .. } | MidiMessage::ChannelAftertouch { .. } => {
                    RawMessage::Other
                }
            }
        }
        TrackEventKind::Meta(meta) => match *meta {
            MetaMessage::TrackName(text) => meta_payload(MetaKind::TrackName, text.to_vec()),
            MetaMessage::Lyric(text) => meta_payload(MetaKind::Lyric, text.to_vec()),
            MetaMessage::Marker(text) => meta_payload(MetaKind::Marker, text.to_vec()),
            MetaMessage::Tempo(micros) => meta_payload(
                MetaKind::SetTempo,
                micros.as_int().to_be_bytes()[1..].to_vec(),
            ),
            MetaMessage::TimeSignature(numerator, denominator_pow, clocks, notated) => {
                meta_payload(
                    MetaKind::TimeSignature,
                    vec![numerator, denominator_pow, clocks, notated],
                )
            }
            MetaMessage::KeySignature(key, minor) => {
                meta_payload(MetaKind::KeySignature, vec![key as u8, minor as u8])
            }
            _ => meta_payload(MetaKind::Other, Vec::new()),
        },
        _ => RawMessage::Other,
    }
}

fn meta_payload(kind: MetaKind, data: Vec<u8>) -> RawMessage {
    RawMessage::Meta { kind, data }
}
