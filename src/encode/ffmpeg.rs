use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::{Child, Command};

use crate::config::EncoderSettings;
use crate::render::meta::RenderParams;

/// Seconds each beat flash stays lit.
const FLASH_SECONDS: f64 = 0.08;
/// Brightness added per active flash. Overlapping flashes add up.
const FLASH_GAIN: f64 = 0.4;

/// The three video stages of the render, in order.
#[derive(Clone, Debug, PartialEq)]
pub struct FilterGraph {
    /// Scale the still to the output size and convert the pixel format
    pub scale: String,
    /// Linear zoom from 1.0 to the end factor, centered
    pub zoom: String,
    /// Brightness offset driven by per-beat indicator windows
    pub flash: String,
}

impl FilterGraph {
    pub fn new(params: &RenderParams, pix_fmt: &str) -> Self {
        let (width, height) = params.resolution.dimensions();
        let total_frames = (u64::from(params.fps) * u64::from(params.duration)).max(1);

        let scale = format!("scale={}:{},format={}", width, height, pix_fmt);

        let zoom = format!(
            "zoompan=z='1+{:.4}*min(on/{},1)':d=1:x='(iw-iw/zoom)/2':y='(ih-ih/zoom)/2':s={}x{}:fps={}",
            params.end_zoom - 1.0,
            total_frames,
            width,
            height,
            params.fps
        );

        let flash = flash_filter(&params.beats);

        Self { scale, zoom, flash }
    }

    /// Render as a `-filter_complex` argument with labelled pads; the audio
    /// stream passes through untouched.
    pub fn to_filter_complex(&self) -> String {
        format!(
            "[0:v]{}[base];[base]{}[zoomed];[zoomed]{}[v];[1:a]anull[a]",
            self.scale, self.zoom, self.flash
        )
    }
}

fn flash_filter(beats: &[f64]) -> String {
    if beats.is_empty() {
        return "eq=brightness=0".to_string();
    }

    let windows: Vec<String> = beats
        .iter()
        .map(|t| format!("between(t,{:.2},{:.2})", t, t + FLASH_SECONDS))
        .collect();

    format!(
        "eq=eval=frame:brightness='({})*{}'",
        windows.join("+"),
        FLASH_GAIN
    )
}

/// A fully-resolved encoder invocation.
#[derive(Clone, Debug)]
pub struct EncoderCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub output: PathBuf,
}

impl EncoderCommand {
    pub fn new(
        settings: &EncoderSettings,
        params: &RenderParams,
        image: &Path,
        audio: &Path,
        output: &Path,
    ) -> Self {
        let graph = FilterGraph::new(params, &settings.pix_fmt);

        let mut args = settings.global_args.clone();
        args.extend([
            "-y".to_string(),
            "-loop".into(), "1".into(),
            "-i".into(), path_arg(image),
            "-i".into(), path_arg(audio),
            "-t".into(), params.duration.to_string(),
            "-r".into(), params.fps.to_string(),
            "-filter_complex".into(), graph.to_filter_complex(),
            "-map".into(), "[v]".into(),
            "-map".into(), "[a]".into(),
            "-c:v".into(), settings.video_codec.clone(),
            "-preset".into(), settings.preset.clone(),
            "-crf".into(), settings.crf.to_string(),
            "-pix_fmt".into(), settings.pix_fmt.clone(),
            "-c:a".into(), settings.audio_codec.clone(),
            "-b:a".into(), settings.audio_bitrate.clone(),
            "-shortest".into(),
            path_arg(output),
        ]);

        Self {
            program: settings.program.clone(),
            args,
            output: output.to_path_buf(),
        }
    }

    /// Start the encoder with stderr captured for diagnostics.
    pub fn spawn(&self) -> std::io::Result<Child> {
        Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
