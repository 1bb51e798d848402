use crate::model::time::{Tick, TimeBase, TimeUnit};
use serde::{Deserialize, Serialize};

const MICROSECONDS_PER_MINUTE: f64 = 60_000_000.0;

const MAJOR_KEYS: [&str; 15] = [
    "Cb", "Gb", "Db", "Ab", "Eb", "Bb", "F", "C", "G", "D", "A", "E", "B", "F#", "C#",
];
const MINOR_KEYS: [&str; 15] = [
    "ab", "eb", "bb", "f", "c", "g", "d", "a", "e", "b", "f#", "c#", "g#", "d#", "a#",
];

/// Anything placed on the timeline of a score.
pub trait TimeStamped<T: TimeUnit> {
    fn time(&self) -> T::Unit;

    fn shift_time(&mut self, offset: T::Unit);
}

/// Re-express a tick-timed entity in another representation.
pub trait FromTicks {
    type Output<U: TimeUnit>;

    fn to_unit<U: TimeUnit>(&self, base: &TimeBase) -> Self::Output<U>;
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(bound = "")]
pub struct Note<T: TimeUnit> {
    pub start: T::Unit,
    pub duration: T::Unit,
    pub pitch: i8,
    pub velocity: i8,
}

impl<T: TimeUnit> Note<T> {
    pub fn new(start: T::Unit, duration: T::Unit, pitch: i8, velocity: i8) -> Self {
        Self {
            start,
            duration,
            pitch,
            velocity,
        }
    }

    pub fn end(&self) -> T::Unit {
        self.start + self.duration
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(bound = "")]
pub struct ControlChange<T: TimeUnit> {
    pub time: T::Unit,
    pub number: u8,
    pub value: u8,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(bound = "")]
pub struct PitchBend<T: TimeUnit> {
    pub time: T::Unit,
    pub value: i32,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(bound = "")]
pub struct TimeSignature<T: TimeUnit> {
    pub time: T::Unit,
    pub numerator: u8,
    pub denominator: u8,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyMode {
    Major,
    Minor,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(bound = "")]
pub struct KeySignature<T: TimeUnit> {
    pub time: T::Unit,
    /// Sharps (positive) or flats (negative), within `-7..=7` for a valid file.
    pub key: i8,
    pub mode: KeyMode,
}

impl<T: TimeUnit> KeySignature<T> {
    /// Textual key name, e.g. `"Eb"` for three flats major or `"f#"` for three sharps minor.
    pub fn name(&self) -> Option<&'static str> {
        let index = usize::try_from(self.key as i16 + 7).ok()?;
        match self.mode {
            KeyMode::Major => MAJOR_KEYS.get(index).copied(),
            KeyMode::Minor => MINOR_KEYS.get(index).copied(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(bound = "")]
pub struct Tempo<T: TimeUnit> {
    pub time: T::Unit,
    /// Quarter notes per minute.
    pub qpm: f64,
}

impl<T: TimeUnit> Tempo<T> {
    pub fn from_micros_per_quarter(time: T::Unit, micros_per_quarter: u32) -> Self {
        Self {
            time,
            qpm: MICROSECONDS_PER_MINUTE / micros_per_quarter as f64,
        }
    }
}

/// Free text anchored in time: lyrics, markers.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(bound = "")]
pub struct TextMeta<T: TimeUnit> {
    pub time: T::Unit,
    pub text: String,
}

impl<T: TimeUnit> TimeStamped<T> for Note<T> {
    fn time(&self) -> T::Unit {
        self.start
    }

    fn shift_time(&mut self, offset: T::Unit) {
        self.start = self.start + offset;
    }
}

macro_rules! timed_at {
    ($($entity:ident),+) => {
        $(
            impl<T: TimeUnit> TimeStamped<T> for $entity<T> {
                fn time(&self) -> T::Unit {
                    self.time
                }

                fn shift_time(&mut self, offset: T::Unit) {
                    self.time = self.time + offset;
                }
            }
        )+
    };
}

timed_at!(ControlChange, PitchBend, TimeSignature, KeySignature, Tempo, TextMeta);

impl FromTicks for Note<Tick> {
    type Output<U: TimeUnit> = Note<U>;

    fn to_unit<U: TimeUnit>(&self, base: &TimeBase) -> Note<U> {
        let (start, duration) = base.convert_span::<U>(self.start, self.duration);
        Note::new(start, duration, self.pitch, self.velocity)
    }
}

impl FromTicks for ControlChange<Tick> {
    type Output<U: TimeUnit> = ControlChange<U>;

    fn to_unit<U: TimeUnit>(&self, base: &TimeBase) -> ControlChange<U> {
        ControlChange {
            time: base.convert::<U>(self.time),
            number: self.number,
            value: self.value,
        }
    }
}

impl FromTicks for PitchBend<Tick> {
    type Output<U: TimeUnit> = PitchBend<U>;

    fn to_unit<U: TimeUnit>(&self, base: &TimeBase) -> PitchBend<U> {
        PitchBend {
            time: base.convert::<U>(self.time),
            value: self.value,
        }
    }
}

impl FromTicks for TimeSignature<Tick> {
    type Output<U: TimeUnit> = TimeSignature<U>;

    fn to_unit<U: TimeUnit>(&self, base: &TimeBase) -> TimeSignature<U> {
        TimeSignature {
            time: base.convert::<U>(self.time),
            numerator: self.numerator,
            denominator: self.denominator,
        }
    }
}

impl FromTicks for KeySignature<Tick> {
    type Output<U: TimeUnit> = KeySignature<U>;

    fn to_unit<U: TimeUnit>(&self, base: &TimeBase) -> KeySignature<U> {
        KeySignature {
            time: base.convert::<U>(self.time),
            key: self.key,
            mode: self.mode,
        }
    }
}

impl FromTicks for Tempo<Tick> {
    type Output<U: TimeUnit> = Tempo<U>;

    fn to_unit<U: TimeUnit>(&self, base: &TimeBase) -> Tempo<U> {
        Tempo {
            time: base.convert::<U>(self.time),
            qpm: self.qpm,
        }
    }
}

impl FromTicks for TextMeta<Tick> {
    type Output<U: TimeUnit> = TextMeta<U>;

    fn to_unit<U: TimeUnit>(&self, base: &TimeBase) -> TextMeta<U> {
        TextMeta {
            time: base.convert::<U>(self.time),
            text: self.text.clone(),
        }
    }
}

pub(crate) fn convert_all<E: FromTicks, U: TimeUnit>(
    items: &[E],
    base: &TimeBase,
) -> Vec<E::Output<U>> {
    items.iter().map(|item| item.to_unit::<U>(base)).collect()
}
