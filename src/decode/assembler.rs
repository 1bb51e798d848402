use crate::model::event::Note;
use crate::model::time::Tick;
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingNote {
    start: i64,
    velocity: i8,
}

/// Pairs note-ons with note-offs for a single (channel, pitch).
///
/// Pending note-ons queue in arrival order. Each note-off closes the oldest one,
/// but only if it started strictly before the note-off: a note-off on the same
/// tick as its note-on leaves that note pending.
#[derive(Debug, Clone, Default)]
pub struct NoteAssembler {
    pending: VecDeque<PendingNote>,
}

impl NoteAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn emplace(&mut self, start: i64, velocity: i8) {
        self.pending.push_back(PendingNote { start, velocity });
    }

    pub fn on_note_off(&mut self, end: i64, pitch: i8) -> Option<Note<Tick>> {
        let oldest = self.pending.front().copied()?;
        if end <= oldest.start {
            return None;
        }

        self.pending.pop_front();
        Some(Note::new(oldest.start, end - oldest.start, pitch, oldest.velocity))
    }

    /// Drop whatever is still open, returning how many notes were discarded.
    pub fn clear(&mut self) -> usize {
        let discarded = self.pending.len();
        self.pending.clear();
        discarded
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn note(start: i64, duration: i64, pitch: i8, velocity: i8) -> Note<Tick> {
        Note::new(start, duration, pitch, velocity)
    }

    #[test]
    fn single_note() {
        let mut assembler = NoteAssembler::new();

        assembler.emplace(0, 100);
        assert_eq!(assembler.on_note_off(480, 60), Some(note(0, 480, 60, 100)));
        assert!(assembler.is_empty());
    }

    #[test]
    fn overlapping_same_pitch_closes_oldest_first() {
        let mut assembler = NoteAssembler::new();

        assembler.emplace(10, 80);
        assembler.emplace(20, 90);
        assert_eq!(assembler.on_note_off(30, 64), Some(note(10, 20, 64, 80)));
        assert_eq!(assembler.pending(), 1);
        assert_eq!(assembler.on_note_off(40, 64), Some(note(20, 20, 64, 90)));
        assert!(assembler.is_empty());
    }

    #[test]
    fn note_off_on_start_tick_keeps_note_open() {
        let mut assembler = NoteAssembler::new();

        assembler.emplace(10, 100);
        assert_eq!(assembler.on_note_off(10, 60), None);
        assert_eq!(assembler.pending(), 1);
        assert_eq!(assembler.on_note_off(12, 60), Some(note(10, 2, 60, 100)));
    }

    #[test]
    fn orphaned_note_off_does_nothing() {
        let mut assembler = NoteAssembler::new();
        assert_eq!(assembler.on_note_off(100, 60), None);
    }

    #[test]
    fn clear_discards_unmatched() {
        let mut assembler = NoteAssembler::new();
        assembler.emplace(0, 1);
        assembler.emplace(3, 2);
        assert_eq!(assembler.clear(), 2);
        assert!(assembler.is_empty());
    }
}
