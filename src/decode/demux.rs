use crate::model::score::Track;
use crate::model::time::Tick;
use log::debug;
use std::collections::BTreeMap;

/// Zero-indexed percussion channel (MIDI channel 10).
pub const DRUM_CHANNEL: u8 = 9;

/// Splits one interleaved channel stream into per-(channel, program) tracks.
#[derive(Debug, Default)]
pub struct TrackDemuxer {
    tracks: BTreeMap<(u8, u8), Track<Tick>>,
}

impl TrackDemuxer {
    pub fn new() -> Self {
        Self::default()
    }

    /// The track for `(channel, program)`, created on first use. The drum flag is
    /// decided here and never revisited.
    pub fn get_or_create(&mut self, channel: u8, program: u8) -> &mut Track<Tick> {
        self.tracks.entry((channel, program)).or_insert_with(|| {
            debug!("New track for channel {} program {}", channel, program);
            Track::new(String::new(), program, channel == DRUM_CHANNEL)
        })
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Hand out the tracks that received notes, all named `name`.
    pub fn finish(self, name: &str) -> Vec<Track<Tick>> {
        self.tracks
            .into_iter()
            .filter_map(|((channel, program), mut track)| {
                if track.notes.is_empty() {
                    debug!(
                        "Dropping track without notes (channel {} program {})",
                        channel, program
                    );
                    return None;
                }

                track.name = name.to_owned();
                Some(track)
            })
            .collect()
    }
}
