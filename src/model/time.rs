use crate::error::{Result, ScoreError};
use crate::model::event::Tempo;
use log::debug;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt::Debug;
use std::ops::{Add, Sub};

pub const DEFAULT_QPM: f64 = 120.0;
const SECONDS_PER_MINUTE: f64 = 60.0;

/// Which time representation a score carries.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeKind {
    Tick,
    Quarter,
    Second,
}

impl TimeKind {
    pub fn name(self) -> &'static str {
        match self {
            TimeKind::Tick => "tick",
            TimeKind::Quarter => "quarter",
            TimeKind::Second => "second",
        }
    }
}

/// A time representation, chosen once for a whole score.
///
/// Every timestamped entity is generic over one of these markers and stores its
/// time fields as `Self::Unit`.
pub trait TimeUnit: Copy + Debug + Default + PartialEq + Send + Sync + 'static {
    type Unit: Copy
        + Debug
        + Default
        + PartialEq
        + PartialOrd
        + Add<Output = Self::Unit>
        + Sub<Output = Self::Unit>
        + Serialize
        + DeserializeOwned
        + Send
        + Sync;

    const KIND: TimeKind;

    /// Convert an absolute tick into this representation.
    fn from_tick(tick: i64, base: &TimeBase) -> Self::Unit;

    /// Total order used for sorting; floats order by `total_cmp`.
    fn compare(a: Self::Unit, b: Self::Unit) -> Ordering;
}

/// Native MIDI resolution, no conversion.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tick;

/// Quarter notes since the start of the file.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Quarter;

/// Elapsed seconds, integrated over the tempo timeline.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Second;

impl TimeUnit for Tick {
    type Unit = i64;
    const KIND: TimeKind = TimeKind::Tick;

    fn from_tick(tick: i64, base: &TimeBase) -> i64 {
        base.to_tick(tick)
    }

    fn compare(a: i64, b: i64) -> Ordering {
        a.cmp(&b)
    }
}

impl TimeUnit for Quarter {
    type Unit = f64;
    const KIND: TimeKind = TimeKind::Quarter;

    fn from_tick(tick: i64, base: &TimeBase) -> f64 {
        base.to_quarter(tick)
    }

    fn compare(a: f64, b: f64) -> Ordering {
        a.total_cmp(&b)
    }
}

impl TimeUnit for Second {
    type Unit = f64;
    const KIND: TimeKind = TimeKind::Second;

    fn from_tick(tick: i64, base: &TimeBase) -> f64 {
        base.to_second(tick)
    }

    fn compare(a: f64, b: f64) -> Ordering {
        a.total_cmp(&b)
    }
}

#[derive(Debug, Clone)]
struct TempoSegment {
    start_tick: i64,
    qpm: f64,
    seconds_at_start: f64,
}

/// Converts ticks into every supported representation for one file.
///
/// Seconds are integrated piecewise over the tempo timeline. Until the first
/// tempo event (or for the whole file when there is none) the tempo is 120 qpm.
#[derive(Debug, Clone)]
pub struct TimeBase {
    ticks_per_quarter: u16,
    segments: Vec<TempoSegment>,
}

impl TimeBase {
    pub fn new(ticks_per_quarter: u16) -> Result<Self> {
        Self::with_tempos(ticks_per_quarter, &[])
    }

    pub fn with_tempos(ticks_per_quarter: u16, tempos: &[Tempo<Tick>]) -> Result<Self> {
        if ticks_per_quarter == 0 {
            return Err(ScoreError::ZeroTicksPerQuarter);
        }

        let mut changes: Vec<(i64, f64)> = tempos
            .iter()
            .filter(|tempo| {
                let usable = tempo.qpm.is_finite() && tempo.qpm > 0.0;
                if !usable {
                    debug!("Ignoring unusable tempo {} at tick {}", tempo.qpm, tempo.time);
                }
                usable
            })
            .map(|tempo| (tempo.time, tempo.qpm))
            .collect();
        changes.sort_by_key(|(tick, _)| *tick);

        let tpq = ticks_per_quarter as f64;
        // the default tempo must start no later than the earliest change
        let origin = changes.first().map_or(0, |(tick, _)| (*tick).min(0));
        let mut segments = vec![TempoSegment {
            start_tick: origin,
            qpm: DEFAULT_QPM,
            seconds_at_start: 0.0,
        }];

        for (tick, qpm) in changes {
            let last = &segments[segments.len() - 1];
            // seconds accumulated up to this tick under the previous tempo
            let elapsed = (tick - last.start_tick) as f64 / tpq * SECONDS_PER_MINUTE / last.qpm;
            let seconds = last.seconds_at_start + elapsed;

            segments.push(TempoSegment {
                start_tick: tick,
                qpm,
                seconds_at_start: seconds,
            });
        }

        Ok(Self {
            ticks_per_quarter,
            segments,
        })
    }

    pub fn ticks_per_quarter(&self) -> u16 {
        self.ticks_per_quarter
    }

    pub fn to_tick(&self, tick: i64) -> i64 {
        tick
    }

    pub fn to_quarter(&self, tick: i64) -> f64 {
        tick as f64 / self.ticks_per_quarter as f64
    }

    pub fn to_second(&self, tick: i64) -> f64 {
        let segment = self
            .segments
            .iter()
            .rfind(|seg| seg.start_tick <= tick)
            .unwrap_or(&self.segments[0]);

        let delta_ticks = (tick - segment.start_tick) as f64;
        segment.seconds_at_start
            + delta_ticks / self.ticks_per_quarter as f64 * SECONDS_PER_MINUTE / segment.qpm
    }

    pub fn convert<T: TimeUnit>(&self, tick: i64) -> T::Unit {
        T::from_tick(tick, self)
    }

    /// Convert a `(start, duration)` pair; the duration is measured between the
    /// converted end and start so it follows tempo changes inside the span.
    pub fn convert_span<T: TimeUnit>(&self, start: i64, duration: i64) -> (T::Unit, T::Unit) {
        let converted_start = self.convert::<T>(start);
        let converted_end = self.convert::<T>(start + duration);
        (converted_start, converted_end - converted_start)
    }
}
