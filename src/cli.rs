use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "beatsync", about = "Beat-synchronized video from a still image and an audio track")]
pub struct Cli {
    /// Config file (default: ./beatsync.toml, then the user config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Detect beats and estimate tempo
    Analyze(AnalyzeArgs),
    /// Render a video whose zoom and flashes follow the beats
    Render(RenderArgs),
}

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Input audio file (WAV, MP3, FLAC, OGG)
    pub input: PathBuf,

    /// Also write a render meta document pre-filled with the detected beats
    #[arg(long)]
    pub meta_out: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct RenderArgs {
    /// Still image used for every frame
    pub image: PathBuf,

    /// Audio track muxed into the video
    pub audio: PathBuf,

    /// Output video file
    #[arg(short, long, default_value = "output.mp4")]
    pub output: PathBuf,

    /// Render meta JSON (as written by `analyze --meta-out`)
    #[arg(long)]
    pub meta: Option<PathBuf>,

    /// Zoom intensity (0-100)
    #[arg(long)]
    pub intensity: Option<f64>,

    /// Frames per second (12-60)
    #[arg(long)]
    pub fps: Option<u32>,

    /// Output resolution: 720p, 1080p or 4k
    #[arg(long)]
    pub resolution: Option<String>,

    /// Prompt stored with the job
    #[arg(long)]
    pub prompt: Option<String>,

    /// Negative prompt stored with the job
    #[arg(long)]
    pub negative_prompt: Option<String>,

    /// Style strength (0-100) stored with the job
    #[arg(long)]
    pub style_strength: Option<f64>,

    /// Seed stored with the job
    #[arg(long)]
    pub seed: Option<String>,

    /// Skip beat detection when the meta carries no beats
    #[arg(long)]
    pub no_analyze: bool,
}
