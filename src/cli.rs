use clap::Parser;
use mp4fpsmod::Options;
use mp4fpsmod_timing::FpsRange;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "mp4fpsmod")]
#[command(author, version, about = "Change the frame timing of MP4 video without re-encoding")]
#[command(override_usage = "mp4fpsmod [-r NFRAMES:FPS]... [-t TIMECODE_V2_FILE] [-x] -o DEST SRC")]
#[command(after_help = "\
NFRAMES: integer, number of frames. 0 applies FPS to all remaining frames.
FPS: integer or fraction, like 25 or 30000/1001.")]
pub struct Cli {
    /// Play NFRAMES frames at FPS. Repeat to produce a VFR movie
    #[arg(short = 'r', long = "fps", value_name = "NFRAMES:FPS")]
    pub ranges: Vec<FpsRange>,

    /// Take per-frame timestamps from a timecode v2 file
    #[arg(short = 't', long = "tcfile", value_name = "TIMECODE_V2_FILE")]
    pub timecode_file: Option<PathBuf>,

    /// Optimize the timecode file entries into exact frame rates where possible
    #[arg(short = 'x', long = "optimize")]
    pub optimize: bool,

    /// Output file
    #[arg(short, long, value_name = "DEST")]
    pub output: Option<PathBuf>,

    /// Source MP4 file
    #[arg(value_name = "SRC")]
    pub source: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl From<Cli> for Options {
    fn from(cli: Cli) -> Self {
        Options {
            source: cli.source,
            destination: cli.output,
            ranges: cli.ranges,
            timecode_file: cli.timecode_file,
            normalize: cli.optimize,
        }
    }
}
