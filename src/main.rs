use anyhow::{Result, anyhow, bail};
use clap::Parser;
use log::{debug, info, warn};
use midi_score::{
    Args, Quarter, Score, Second, Tick, TimeKind, TimeUnit, count_note_ons, parse_time_unit,
};
use midly::Smf;
use std::fs;

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let unit = parse_time_unit(&args.unit);

    info!("Decoding MIDI file: '{}'...", args.midi.display());
    let bytes = fs::read(&args.midi).map_err(|e| {
        anyhow!("Failed to read MIDI file {}: {}", args.midi.display(), e)
    })?;
    let smf = Smf::parse(&bytes).map_err(|e| anyhow!("Failed to parse MIDI: {:?}", e))?;

    let decoded = match unit {
        TimeKind::Tick => report(&Score::<Tick>::from_smf(&smf)?, &args),
        TimeKind::Quarter => report(&Score::<Quarter>::from_smf(&smf)?, &args),
        TimeKind::Second => report(&Score::<Second>::from_smf(&smf)?, &args),
    };

    let expected = count_note_ons(&smf);
    info!("Decoded {} notes, naive note-on count is {}", decoded, expected);

    if decoded != expected {
        warn!("Unmatched or zero-length notes in the source stream..!");
        bail!(
            "note count mismatch: decoded {} but counted {} note-ons",
            decoded,
            expected
        );
    }

    Ok(())
}

/// Print what was decoded and return the total note count.
fn report<T: TimeUnit>(score: &Score<T>, args: &Args) -> usize {
    debug!(
        "Score with {} ticks per quarter, {} tracks",
        score.ticks_per_quarter,
        score.tracks.len()
    );

    if args.summary {
        for (i, track) in score.tracks.iter().enumerate() {
            info!(
                "Track {}: name='{}' program={} drum={} notes={} controllers={} pitch_bends={} end={:?}",
                i,
                track.name,
                track.program,
                track.is_drum,
                track.note_count(),
                track.controls.len(),
                track.pitch_bends.len(),
                track.end()
            );
        }
    }

    if args.verbose {
        for tempo in &score.tempos {
            info!("Tempo at {:?}: {:.3} qpm", tempo.time, tempo.qpm);
        }
        for signature in &score.time_signatures {
            info!(
                "Time signature at {:?}: {}/{}",
                signature.time, signature.numerator, signature.denominator
            );
        }
        for key in &score.key_signatures {
            info!(
                "Key signature at {:?}: {}",
                key.time,
                key.name().unwrap_or("<invalid>")
            );
        }
    }

    score.note_count()
}
