use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "midi_score",
    about = "Decode a MIDI file into tracks and cross-check the decoded note count."
)]
pub struct Args {
    /// Path to the target MIDI file.
    pub midi: PathBuf,

    /// Time representation of the decoded score: tick|quarter|second.
    #[arg(short, long, default_value = "tick")]
    pub unit: String,

    /// Print one line per decoded track.
    #[arg(short, long, default_value_t = false)]
    pub summary: bool,

    /// Also print the tempo, time signature and key signature timelines.
    #[arg(short, long)]
    pub verbose: bool,
}
