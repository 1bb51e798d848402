pub mod assembler;
pub mod builder;
pub mod demux;
pub mod message;

pub use assembler::NoteAssembler;
pub use builder::{DecodedTrack, ScoreBuilder, decode_raw_track};
pub use demux::{DRUM_CHANNEL, TrackDemuxer};
pub use message::{MetaKind, RawEvent, RawMessage, RawTrack, raw_tracks_from_smf, ticks_per_quarter};
