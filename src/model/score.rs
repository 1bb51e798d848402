use crate::decode::builder::ScoreBuilder;
use crate::decode::message::{RawTrack, raw_tracks_from_smf, ticks_per_quarter};
use crate::error::{Result, ScoreError};
use crate::model::event::*;
use crate::model::time::{Tick, TimeBase, TimeKind, TimeUnit};
use log::debug;
use midly::Smf;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// One instrument's worth of decoded events.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(bound = "")]
pub struct Track<T: TimeUnit> {
    pub name: String,
    pub program: u8,
    pub is_drum: bool,
    pub notes: Vec<Note<T>>,
    pub controls: BTreeMap<u8, Vec<ControlChange<T>>>,
    pub pitch_bends: Vec<PitchBend<T>>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(bound = "")]
pub struct Score<T: TimeUnit> {
    pub ticks_per_quarter: u16,
    pub tracks: Vec<Track<T>>,
    pub tempos: Vec<Tempo<T>>,
    pub time_signatures: Vec<TimeSignature<T>>,
    pub key_signatures: Vec<KeySignature<T>>,
    pub lyrics: Vec<TextMeta<T>>,
    pub markers: Vec<TextMeta<T>>,
}

/// Stable sort by time; equal times keep their original relative order.
fn sort_timeline<T: TimeUnit, E: TimeStamped<T>>(items: &mut [E]) {
    items.sort_by(|a, b| T::compare(a.time(), b.time()));
}

fn shift_timeline<T: TimeUnit, E: TimeStamped<T>>(items: &mut [E], offset: T::Unit) {
    items.iter_mut().for_each(|item| item.shift_time(offset));
}

impl<T: TimeUnit> Track<T> {
    pub fn new(name: impl Into<String>, program: u8, is_drum: bool) -> Self {
        Self {
            name: name.into(),
            program,
            is_drum,
            notes: Vec::new(),
            controls: BTreeMap::new(),
            pitch_bends: Vec::new(),
        }
    }

    pub fn note_count(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Earliest note start, if the track has any notes.
    pub fn start(&self) -> Option<T::Unit> {
        self.notes
            .iter()
            .map(|note| note.start)
            .min_by(|a, b| T::compare(*a, *b))
    }

    /// Latest note end, if the track has any notes.
    pub fn end(&self) -> Option<T::Unit> {
        self.notes
            .iter()
            .map(|note| note.end())
            .max_by(|a, b| T::compare(*a, *b))
    }

    pub fn sort(&mut self) {
        sort_timeline::<T, _>(&mut self.notes);
        self.controls
            .values_mut()
            .for_each(|controls| sort_timeline::<T, _>(controls));
        sort_timeline::<T, _>(&mut self.pitch_bends);
    }

    pub fn sorted(&self) -> Self {
        let mut track = self.clone();
        track.sort();
        track
    }

    pub fn shift_time(&mut self, offset: T::Unit) {
        shift_timeline::<T, _>(&mut self.notes, offset);
        self.controls
            .values_mut()
            .for_each(|controls| shift_timeline::<T, _>(controls, offset));
        shift_timeline::<T, _>(&mut self.pitch_bends, offset);
    }

    pub fn shifted_time(&self, offset: T::Unit) -> Self {
        let mut track = self.clone();
        track.shift_time(offset);
        track
    }

    /// Wraps on 8-bit overflow.
    pub fn shift_pitch(&mut self, offset: i8) {
        self.notes
            .iter_mut()
            .for_each(|note| note.pitch = note.pitch.wrapping_add(offset));
    }

    pub fn shifted_pitch(&self, offset: i8) -> Self {
        let mut track = self.clone();
        track.shift_pitch(offset);
        track
    }

    /// Wraps on 8-bit overflow.
    pub fn shift_velocity(&mut self, offset: i8) {
        self.notes
            .iter_mut()
            .for_each(|note| note.velocity = note.velocity.wrapping_add(offset));
    }

    pub fn shifted_velocity(&self, offset: i8) -> Self {
        let mut track = self.clone();
        track.shift_velocity(offset);
        track
    }
}

impl Track<Tick> {
    pub fn to_unit<U: TimeUnit>(&self, base: &TimeBase) -> Track<U> {
        Track {
            name: self.name.clone(),
            program: self.program,
            is_drum: self.is_drum,
            notes: convert_all::<_, U>(&self.notes, base),
            controls: self
                .controls
                .iter()
                .map(|(number, controls)| (*number, convert_all::<_, U>(controls, base)))
                .collect(),
            pitch_bends: convert_all::<_, U>(&self.pitch_bends, base),
        }
    }
}

impl<T: TimeUnit> Score<T> {
    pub fn new(ticks_per_quarter: u16) -> Result<Self> {
        if ticks_per_quarter == 0 {
            return Err(ScoreError::ZeroTicksPerQuarter);
        }

        Ok(Self {
            ticks_per_quarter,
            ..Default::default()
        })
    }

    /// Read and decode a standard MIDI file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        ensure_decodable::<T>("a midi file")?;

        let bytes = fs::read(path.as_ref()).map_err(|source| ScoreError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        })?;

        debug!("Read {} bytes from '{}'", bytes.len(), path.as_ref().display());
        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ensure_decodable::<T>("midi bytes")?;

        let smf = Smf::parse(bytes)?;
        Self::from_smf(&smf)
    }

    /// Decode an already tokenized file.
    pub fn from_smf(smf: &Smf) -> Result<Self> {
        ensure_decodable::<T>("a tokenized midi file")?;

        let ticks_per_quarter = ticks_per_quarter(&smf.header)?;
        debug!(
            "MIDI format: {:?}, tracks: {}, ticks per quarter: {}",
            smf.header.format,
            smf.tracks.len(),
            ticks_per_quarter
        );

        Self::from_raw_tracks(ticks_per_quarter, &raw_tracks_from_smf(smf))
    }

    /// Decode the tokenizer's output: one ordered event sequence per raw track.
    pub fn from_raw_tracks(ticks_per_quarter: u16, raw_tracks: &[RawTrack]) -> Result<Self> {
        ensure_decodable::<T>("raw track events")?;

        ScoreBuilder::decode(ticks_per_quarter, raw_tracks)?.to_unit::<T>()
    }

    pub fn note_count(&self) -> usize {
        self.tracks.iter().map(Track::note_count).sum()
    }

    pub fn start(&self) -> Option<T::Unit> {
        self.tracks
            .iter()
            .filter_map(Track::start)
            .min_by(|a, b| T::compare(*a, *b))
    }

    pub fn end(&self) -> Option<T::Unit> {
        self.tracks
            .iter()
            .filter_map(Track::end)
            .max_by(|a, b| T::compare(*a, *b))
    }

    pub fn sort(&mut self) {
        self.tracks.iter_mut().for_each(Track::sort);
        sort_timeline::<T, _>(&mut self.tempos);
        sort_timeline::<T, _>(&mut self.time_signatures);
        sort_timeline::<T, _>(&mut self.key_signatures);
        sort_timeline::<T, _>(&mut self.lyrics);
        sort_timeline::<T, _>(&mut self.markers);
    }

    pub fn sorted(&self) -> Self {
        let mut score = self.clone();
        score.sort();
        score
    }

    pub fn shift_time(&mut self, offset: T::Unit) {
        self.tracks
            .iter_mut()
            .for_each(|track| track.shift_time(offset));
        shift_timeline::<T, _>(&mut self.tempos, offset);
        shift_timeline::<T, _>(&mut self.time_signatures, offset);
        shift_timeline::<T, _>(&mut self.key_signatures, offset);
        shift_timeline::<T, _>(&mut self.lyrics, offset);
        shift_timeline::<T, _>(&mut self.markers, offset);
    }

    pub fn shifted_time(&self, offset: T::Unit) -> Self {
        let mut score = self.clone();
        score.shift_time(offset);
        score
    }

    pub fn shift_pitch(&mut self, offset: i8) {
        self.tracks
            .iter_mut()
            .for_each(|track| track.shift_pitch(offset));
    }

    pub fn shifted_pitch(&self, offset: i8) -> Self {
        let mut score = self.clone();
        score.shift_pitch(offset);
        score
    }

    pub fn shift_velocity(&mut self, offset: i8) {
        self.tracks
            .iter_mut()
            .for_each(|track| track.shift_velocity(offset));
    }

    pub fn shifted_velocity(&self, offset: i8) -> Self {
        let mut score = self.clone();
        score.shift_velocity(offset);
        score
    }
}

impl Score<Tick> {
    /// Tick-to-representation conversion backed by this score's tempo timeline.
    pub fn time_base(&self) -> Result<TimeBase> {
        TimeBase::with_tempos(self.ticks_per_quarter, &self.tempos)
    }

    /// Re-express the whole score in another time representation, seconds included.
    pub fn to_unit<U: TimeUnit>(&self) -> Result<Score<U>> {
        let base = self.time_base()?;

        Ok(Score {
            ticks_per_quarter: self.ticks_per_quarter,
            tracks: self.tracks.iter().map(|track| track.to_unit(&base)).collect(),
            tempos: convert_all::<_, U>(&self.tempos, &base),
            time_signatures: convert_all::<_, U>(&self.time_signatures, &base),
            key_signatures: convert_all::<_, U>(&self.key_signatures, &base),
            lyrics: convert_all::<_, U>(&self.lyrics, &base),
            markers: convert_all::<_, U>(&self.markers, &base),
        })
    }
}

/// Seconds depend on the complete tempo timeline, so they are only reachable by
/// converting an already decoded tick score.
fn ensure_decodable<T: TimeUnit>(source_kind: &'static str) -> Result<()> {
    match T::KIND {
        TimeKind::Tick | TimeKind::Quarter => Ok(()),
        TimeKind::Second => Err(ScoreError::UnsupportedTimeUnit {
            unit: T::KIND.name(),
            source_kind,
        }),
    }
}
