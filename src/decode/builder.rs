use crate::decode::assembler::NoteAssembler;
use crate::decode::demux::TrackDemuxer;
use crate::decode::message::{MetaKind, RawEvent, RawMessage, RawTrack};
use crate::error::Result;
use crate::model::event::*;
use crate::model::score::{Score, Track};
use crate::model::time::{Tick, TimeUnit};
use log::{debug, info};

pub const CHANNELS: usize = 16;
pub const PITCHES: usize = 128;

/// Everything one raw track contributes to a score.
#[derive(Debug, Default)]
pub struct DecodedTrack {
    pub tracks: Vec<Track<Tick>>,
    pub tempos: Vec<Tempo<Tick>>,
    pub time_signatures: Vec<TimeSignature<Tick>>,
    pub key_signatures: Vec<KeySignature<Tick>>,
    pub lyrics: Vec<TextMeta<Tick>>,
    pub markers: Vec<TextMeta<Tick>>,
}

/// Per-raw-track decode state, built fresh for every raw track.
struct RawTrackDecoder {
    assemblers: Vec<NoteAssembler>,
    demuxer: TrackDemuxer,
    current_program: [u8; CHANNELS],
    name: String,
    decoded: DecodedTrack,
}

fn grid_index(channel: u8, pitch: u8) -> Option<usize> {
    let (channel, pitch) = (channel as usize, pitch as usize);
    (channel < CHANNELS && pitch < PITCHES).then_some(channel * PITCHES + pitch)
}

impl RawTrackDecoder {
    fn new() -> Self {
        Self {
            assemblers: (0..CHANNELS * PITCHES)
                .map(|_| NoteAssembler::new())
                .collect(),
            demuxer: TrackDemuxer::new(),
            current_program: [0; CHANNELS],
            name: String::new(),
            decoded: DecodedTrack::default(),
        }
    }

    fn push(&mut self, event: &RawEvent) {
        let tick = i64::try_from(event.tick).unwrap_or(i64::MAX);

        match &event.message {
            RawMessage::NoteOn {
                channel,
                pitch,
                velocity,
            } if *velocity != 0 => match grid_index(*channel, *pitch) {
                // pitch 0 never opens a note
                Some(_) if *pitch == 0 => debug!(
                    "Ignoring NoteOn for pitch 0 on ch{} at tick {}",
                    channel, tick
                ),
                Some(index) => self.assemblers[index].emplace(tick, *velocity as i8),
                None => debug!(
                    "Ignoring NoteOn outside the channel/pitch grid: ch{} pitch {} at tick {}",
                    channel, pitch, tick
                ),
            },
            RawMessage::NoteOn { channel, pitch, .. } | RawMessage::NoteOff { channel, pitch, .. } => {
                self.note_off(tick, *channel, *pitch);
            }
            RawMessage::ProgramChange { channel, program } => {
                match self.current_program.get_mut(*channel as usize) {
                    Some(current) => *current = *program,
                    None => debug!("Ignoring ProgramChange on channel {}", channel),
                }
            }
            RawMessage::ControlChange {
                channel,
                program,
                controller,
                value,
            } => {
                if *channel as usize >= CHANNELS {
                    debug!("Ignoring ControlChange on channel {}", channel);
                    return;
                }

                self.demuxer
                    .get_or_create(*channel, *program)
                    .controls
                    .entry(*controller)
                    .or_default()
                    .push(ControlChange {
                        time: tick,
                        number: *controller,
                        value: *value,
                    });
            }
            RawMessage::PitchBend { channel, value } => {
                let Some(program) = self.current_program.get(*channel as usize).copied() else {
                    debug!("Ignoring PitchBend on channel {}", channel);
                    return;
                };

                self.demuxer
                    .get_or_create(*channel, program)
                    .pitch_bends
                    .push(PitchBend {
                        time: tick,
                        value: *value,
                    });
            }
            RawMessage::Meta { kind, data } => self.meta(tick, *kind, data),
            RawMessage::Other => {}
        }
    }

    fn note_off(&mut self, tick: i64, channel: u8, pitch: u8) {
        let Some(index) = grid_index(channel, pitch) else {
            debug!(
                "Ignoring NoteOff outside the channel/pitch grid: ch{} pitch {} at tick {}",
                channel, pitch, tick
            );
            return;
        };

        let program = self.current_program[channel as usize];
        let track = self.demuxer.get_or_create(channel, program);
        match self.assemblers[index].on_note_off(tick, pitch as i8) {
            Some(note) => track.notes.push(note),
            None => debug!(
                "Orphaned NoteOff for {} ch{} at tick {}..!",
                pitch, channel, tick
            ),
        }
    }

    fn meta(&mut self, tick: i64, kind: MetaKind, data: &[u8]) {
        match kind {
            MetaKind::TrackName => {
                self.name = String::from_utf8_lossy(data).into_owned();
                debug!("Track name: {}", self.name);
            }
            MetaKind::TimeSignature => {
                let &[numerator, denominator_pow, ..] = data else {
                    debug!("Short TimeSignature payload at tick {}", tick);
                    return;
                };
                let Some(denominator) = 1u8.checked_shl(denominator_pow as u32) else {
                    debug!("TimeSignature denominator 2^{} out of range", denominator_pow);
                    return;
                };

                self.decoded.time_signatures.push(TimeSignature {
                    time: tick,
                    numerator,
                    denominator,
                });
            }
            MetaKind::SetTempo => {
                let &[high, mid, low, ..] = data else {
                    debug!("Short SetTempo payload at tick {}", tick);
                    return;
                };
                let micros = u32::from_be_bytes([0, high, mid, low]);
                if micros == 0 {
                    debug!("Ignoring zero-length quarter note tempo at tick {}", tick);
                    return;
                }

                let tempo = Tempo::from_micros_per_quarter(tick, micros);
                debug!("Tempo change at tick {} -> {} us/qn ({:.3} qpm)", tick, micros, tempo.qpm);
                self.decoded.tempos.push(tempo);
            }
            MetaKind::KeySignature => {
                let &[key, mode, ..] = data else {
                    debug!("Short KeySignature payload at tick {}", tick);
                    return;
                };

                self.decoded.key_signatures.push(KeySignature {
                    time: tick,
                    key: key as i8,
                    mode: if mode == 0 { KeyMode::Major } else { KeyMode::Minor },
                });
            }
            MetaKind::Lyric => self.decoded.lyrics.push(TextMeta {
                time: tick,
                text: String::from_utf8_lossy(data).into_owned(),
            }),
            MetaKind::Marker => self.decoded.markers.push(TextMeta {
                time: tick,
                text: String::from_utf8_lossy(data).into_owned(),
            }),
            MetaKind::Other => {}
        }
    }

    fn finish(mut self) -> DecodedTrack {
        let unclosed: usize = self.assemblers.iter_mut().map(NoteAssembler::clear).sum();
        if unclosed > 0 {
            debug!("Discarding {} unclosed NoteOn(s) in track '{}'", unclosed, self.name);
        }

        self.decoded.tracks = self.demuxer.finish(&self.name);
        self.decoded
    }
}

/// Decode one raw track on its own; no state is shared with other raw tracks.
pub fn decode_raw_track(events: &[RawEvent]) -> DecodedTrack {
    let mut decoder = RawTrackDecoder::new();
    for event in events {
        decoder.push(event);
    }
    decoder.finish()
}

/// Collects decoded raw tracks into a tick score.
#[derive(Debug)]
pub struct ScoreBuilder {
    score: Score<Tick>,
}

impl ScoreBuilder {
    pub fn new(ticks_per_quarter: u16) -> Result<Self> {
        Ok(Self {
            score: Score::new(ticks_per_quarter)?,
        })
    }

    pub fn push_raw_track(&mut self, events: &[RawEvent]) {
        self.push_decoded(decode_raw_track(events));
    }

    pub fn push_decoded(&mut self, decoded: DecodedTrack) {
        let score = &mut self.score;
        score.tracks.extend(decoded.tracks);
        score.tempos.extend(decoded.tempos);
        score.time_signatures.extend(decoded.time_signatures);
        score.key_signatures.extend(decoded.key_signatures);
        score.lyrics.extend(decoded.lyrics);
        score.markers.extend(decoded.markers);
    }

    /// Sort the score-wide timelines and hand the score out.
    pub fn finish(mut self) -> Score<Tick> {
        let score = &mut self.score;
        score.tempos.sort_by(|a, b| Tick::compare(a.time, b.time));
        score.time_signatures.sort_by(|a, b| Tick::compare(a.time, b.time));
        score.key_signatures.sort_by(|a, b| Tick::compare(a.time, b.time));
        score.lyrics.sort_by(|a, b| Tick::compare(a.time, b.time));
        score.markers.sort_by(|a, b| Tick::compare(a.time, b.time));

        info!(
            "Decoded {} track(s) with {} note(s)",
            self.score.tracks.len(),
            self.score.note_count()
        );
        self.score
    }

    /// Decode every raw track and merge them in raw-track order.
    pub fn decode(ticks_per_quarter: u16, raw_tracks: &[RawTrack]) -> Result<Score<Tick>> {
        let mut builder = Self::new(ticks_per_quarter)?;

        #[cfg(feature = "parallel")]
        let decoded: Vec<DecodedTrack> = {
            use rayon::prelude::*;
            raw_tracks
                .par_iter()
                .map(|events| decode_raw_track(events))
                .collect()
        };

        #[cfg(not(feature = "parallel"))]
        let decoded: Vec<DecodedTrack> = raw_tracks
            .iter()
            .map(|events| decode_raw_track(events))
            .collect();

        decoded
            .into_iter()
            .for_each(|track| builder.push_decoded(track));
        Ok(builder.finish())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::decode::demux::DRUM_CHANNEL;
    use crate::error::ScoreError;
    use pretty_assertions::assert_eq;

    fn note(start: i64, duration: i64, pitch: i8, velocity: i8) -> Note<Tick> {
        Note::new(start, duration, pitch, velocity)
    }

    fn on(tick: u64, channel: u8, pitch: u8, velocity: u8) -> RawEvent {
        RawEvent::new(
            tick,
            RawMessage::NoteOn {
                channel,
                pitch,
                velocity,
            },
        )
    }

    fn off(tick: u64, channel: u8, pitch: u8) -> RawEvent {
        RawEvent::new(
            tick,
            RawMessage::NoteOff {
                channel,
                pitch,
                velocity: 64,
            },
        )
    }

    fn program(tick: u64, channel: u8, program: u8) -> RawEvent {
        RawEvent::new(tick, RawMessage::ProgramChange { channel, program })
    }

    fn control(tick: u64, channel: u8, program: u8, controller: u8, value: u8) -> RawEvent {
        RawEvent::new(
            tick,
            RawMessage::ControlChange {
                channel,
                program,
                controller,
                value,
            },
        )
    }

    fn meta(tick: u64, kind: MetaKind, data: &[u8]) -> RawEvent {
        RawEvent::new(
            tick,
            RawMessage::Meta {
                kind,
                data: data.to_vec(),
            },
        )
    }

    fn decode(raw_tracks: Vec<RawTrack>) -> Score<Tick> {
        env_logger::try_init().unwrap_or(());
        ScoreBuilder::decode(480, &raw_tracks).unwrap()
    }

    #[test]
    fn overlapping_notes_close_oldest_first() {
        let score = decode(vec![vec![
            on(1, 0, 60, 100),
            on(2, 0, 60, 90),
            off(3, 0, 60),
            off(4, 0, 60),
        ]]);

        assert_eq!(
            score.tracks[0].notes,
            vec![note(1, 2, 60, 100), note(2, 2, 60, 90)]
        );
    }

    #[test]
    fn zero_duration_pair_waits_for_later_note_off() {
        let score = decode(vec![vec![
            on(10, 0, 60, 100),
            off(10, 0, 60),
            off(12, 0, 60),
        ]]);

        assert_eq!(score.tracks[0].notes, vec![note(10, 2, 60, 100)]);
    }

    #[test]
    fn zero_velocity_note_on_closes_note() {
        let score = decode(vec![vec![on(0, 3, 72, 64), on(96, 3, 72, 0)]]);

        assert_eq!(score.tracks[0].notes, vec![note(0, 96, 72, 64)]);
    }

    #[test]
    fn unmatched_note_ons_are_discarded() {
        let score = decode(vec![vec![on(0, 0, 60, 100), on(5, 0, 62, 100), off(9, 0, 62)]]);

        assert_eq!(score.note_count(), 1);
        assert_eq!(score.tracks[0].notes[0].pitch, 62);
    }

    #[test]
    fn note_is_attributed_to_program_active_at_close() {
        let score = decode(vec![vec![
            program(0, 0, 10),
            on(0, 0, 60, 100),
            program(5, 0, 20),
            off(10, 0, 60),
        ]]);

        assert_eq!(score.tracks.len(), 1);
        assert_eq!(score.tracks[0].program, 20);
    }

    #[test]
    fn notes_split_by_channel_and_program() {
        let score = decode(vec![vec![
            on(0, 0, 60, 100),
            on(0, 1, 60, 100),
            off(10, 0, 60),
            off(10, 1, 60),
            program(20, 0, 40),
            on(20, 0, 64, 100),
            off(30, 0, 64),
        ]]);

        let keys: Vec<(u8, usize)> = score
            .tracks
            .iter()
            .map(|track| (track.program, track.notes.len()))
            .collect();
        assert_eq!(score.tracks.len(), 3);
        assert_eq!(keys, vec![(0, 1), (40, 1), (0, 1)]);
    }

    #[test]
    fn control_changes_use_the_message_program() {
        let score = decode(vec![vec![
            program(0, 0, 5),
            control(0, 0, 5, 7, 100),
            control(0, 0, 6, 10, 64),
            on(0, 0, 60, 100),
            off(10, 0, 60),
        ]]);

        // the program 6 track only holds a control change and is pruned
        assert_eq!(score.tracks.len(), 1);
        let track = &score.tracks[0];
        assert_eq!(track.program, 5);
        assert_eq!(
            track.controls.get(&7),
            Some(&vec![ControlChange::<Tick> {
                time: 0,
                number: 7,
                value: 100
            }])
        );
        assert!(!track.controls.contains_key(&10));
    }

    #[test]
    fn pitch_bends_follow_current_program() {
        let score = decode(vec![vec![
            program(0, 2, 30),
            on(0, 2, 50, 80),
            RawEvent::new(5, RawMessage::PitchBend { channel: 2, value: -4096 }),
            off(10, 2, 50),
        ]]);

        assert_eq!(
            score.tracks[0].pitch_bends,
            vec![PitchBend::<Tick> { time: 5, value: -4096 }]
        );
    }

    #[test]
    fn drum_channel_stays_drum() {
        let score = decode(vec![vec![
            program(0, DRUM_CHANNEL, 25),
            on(0, DRUM_CHANNEL, 36, 120),
            off(5, DRUM_CHANNEL, 36),
            control(6, DRUM_CHANNEL, 25, 7, 90),
            program(7, DRUM_CHANNEL, 0),
            on(8, 0, 60, 100),
            off(9, 0, 60),
        ]]);

        let drums: Vec<&Track<Tick>> = score.tracks.iter().filter(|track| track.is_drum).collect();
        assert_eq!(drums.len(), 1);
        assert_eq!(drums[0].program, 25);
        assert_eq!(drums[0].controls[&7].len(), 1);
        assert!(score.tracks.iter().filter(|track| !track.is_drum).count() == 1);
    }

    #[test]
    fn tracks_take_the_latest_track_name() {
        let score = decode(vec![vec![
            meta(0, MetaKind::TrackName, b"first"),
            on(0, 0, 60, 100),
            off(10, 0, 60),
            meta(20, MetaKind::TrackName, b"second"),
        ]]);

        assert_eq!(score.tracks[0].name, "second");
    }

    #[test]
    fn tracks_without_notes_are_pruned() {
        let score = decode(vec![
            vec![
                meta(0, MetaKind::TrackName, b"conductor"),
                meta(0, MetaKind::SetTempo, &[0x07, 0xA1, 0x20]),
                control(0, 0, 0, 7, 100),
                off(5, 0, 60),
            ],
            vec![on(0, 0, 60, 100), off(10, 0, 60)],
        ]);

        assert_eq!(score.tracks.len(), 1);
        assert_eq!(score.tracks[0].name, "");
        assert_eq!(score.tempos.len(), 1);
    }

    #[test]
    fn timelines_are_sorted_across_tracks() {
        let score = decode(vec![
            vec![
                meta(100, MetaKind::SetTempo, &[0x0F, 0x42, 0x40]),
                meta(300, MetaKind::TimeSignature, &[3, 2, 24, 8]),
                meta(50, MetaKind::KeySignature, &[0xFD, 0]),
            ],
            vec![
                meta(0, MetaKind::SetTempo, &[0x07, 0xA1, 0x20]),
                meta(0, MetaKind::TimeSignature, &[4, 2, 24, 8]),
                meta(0, MetaKind::KeySignature, &[2, 1]),
                meta(10, MetaKind::Lyric, b"la"),
                meta(5, MetaKind::Marker, b"intro"),
            ],
        ]);

        let tempo_ticks: Vec<i64> = score.tempos.iter().map(|tempo| tempo.time).collect();
        assert_eq!(tempo_ticks, vec![0, 100]);
        assert_eq!(score.tempos[0].qpm, 120.0);
        assert_eq!(score.tempos[1].qpm, 60.0);

        assert_eq!(
            score.time_signatures,
            vec![
                TimeSignature::<Tick> {
                    time: 0,
                    numerator: 4,
                    denominator: 4
                },
                TimeSignature::<Tick> {
                    time: 300,
                    numerator: 3,
                    denominator: 4
                },
            ]
        );

        assert_eq!(score.key_signatures[0].name(), Some("b"));
        assert_eq!(score.key_signatures[1].name(), Some("Eb"));
        assert_eq!(score.lyrics[0].text, "la");
        assert_eq!(score.markers[0].text, "intro");
    }

    #[test]
    fn short_and_degenerate_meta_payloads_are_skipped() {
        let score = decode(vec![vec![
            meta(0, MetaKind::SetTempo, &[0x07]),
            meta(0, MetaKind::SetTempo, &[0, 0, 0]),
            meta(0, MetaKind::TimeSignature, &[4]),
            meta(0, MetaKind::TimeSignature, &[4, 9]),
            meta(0, MetaKind::KeySignature, &[]),
        ]]);

        assert!(score.tempos.is_empty());
        assert!(score.time_signatures.is_empty());
        assert!(score.key_signatures.is_empty());
    }

    #[test]
    fn out_of_range_channel_and_pitch_are_absorbed() {
        let score = decode(vec![vec![
            on(0, 16, 60, 100),
            on(0, 0, 128, 100),
            off(10, 16, 60),
            off(10, 0, 128),
            program(0, 20, 3),
            control(0, 17, 0, 7, 1),
        ]]);

        assert!(score.tracks.is_empty());
    }

    #[test]
    fn pitch_zero_notes_are_skipped() {
        let score = decode(vec![vec![
            on(0, 0, 0, 100),
            off(10, 0, 0),
            on(10, 0, 60, 100),
            off(20, 0, 60),
        ]]);

        assert_eq!(score.tracks.len(), 1);
        assert_eq!(score.tracks[0].notes, vec![note(10, 10, 60, 100)]);
    }

    #[test]
    fn parallel_and_sequential_decode_agree() {
        let raw_tracks = vec![
            vec![
                meta(0, MetaKind::SetTempo, &[0x07, 0xA1, 0x20]),
                meta(960, MetaKind::SetTempo, &[0x0F, 0x42, 0x40]),
                meta(480, MetaKind::Marker, b"B"),
            ],
            vec![
                meta(0, MetaKind::TrackName, b"lead"),
                program(0, 0, 40),
                on(0, 0, 60, 100),
                on(0, 9, 36, 120),
                off(240, 9, 36),
                off(480, 0, 60),
                meta(480, MetaKind::Lyric, b"la"),
            ],
            vec![
                meta(0, MetaKind::TrackName, b"bass"),
                on(0, 1, 40, 90),
                meta(0, MetaKind::SetTempo, &[0x07, 0xA1, 0x20]),
                off(960, 1, 40),
                meta(0, MetaKind::Marker, b"A"),
            ],
        ];

        let mut builder = ScoreBuilder::new(480).unwrap();
        for events in &raw_tracks {
            builder.push_decoded(decode_raw_track(events));
        }
        let sequential = builder.finish();

        assert_eq!(decode(raw_tracks), sequential);
        assert_eq!(sequential.tracks.len(), 3);
        assert_eq!(sequential.tempos.len(), 3);
    }

    #[test]
    fn zero_resolution_is_a_configuration_error() {
        assert!(matches!(
            ScoreBuilder::decode(0, &[]),
            Err(ScoreError::ZeroTicksPerQuarter)
        ));
    }
}
