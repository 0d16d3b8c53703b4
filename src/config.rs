use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub encoder: EncoderSettings,
    #[serde(default)]
    pub jobs: JobsConfig,
}

/// Defaults for render parameters not given on the command line.
#[derive(Debug, Deserialize)]
pub struct RenderConfig {
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default = "default_resolution")]
    pub resolution: String,
    #[serde(default = "default_intensity")]
    pub intensity: f64,
}

/// How the external encoder is invoked. Quality settings are fixed per
/// installation, never per job.
#[derive(Clone, Debug, Deserialize)]
pub struct EncoderSettings {
    #[serde(default = "default_program")]
    pub program: PathBuf,
    /// Placed before the generated arguments (e.g. `-hide_banner`)
    #[serde(default)]
    pub global_args: Vec<String>,
    #[serde(default = "default_video_codec")]
    pub video_codec: String,
    #[serde(default = "default_preset")]
    pub preset: String,
    #[serde(default = "default_crf")]
    pub crf: u32,
    #[serde(default = "default_pix_fmt")]
    pub pix_fmt: String,
    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,
    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct JobsConfig {
    /// Root for per-job scratch directories
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,
    /// Progress ramp interval
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    /// Status polling interval used by the CLI
    #[serde(default = "default_poll_ms")]
    pub poll_ms: u64,
}

impl JobsConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_ms.max(1))
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            fps: default_fps(),
            resolution: default_resolution(),
            intensity: default_intensity(),
        }
    }
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            program: default_program(),
            global_args: Vec::new(),
            video_codec: default_video_codec(),
            preset: default_preset(),
            crf: default_crf(),
            pix_fmt: default_pix_fmt(),
            audio_codec: default_audio_codec(),
            audio_bitrate: default_audio_bitrate(),
        }
    }
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            work_dir: default_work_dir(),
            tick_ms: default_tick_ms(),
            poll_ms: default_poll_ms(),
        }
    }
}

fn default_fps() -> u32 { 24 }
fn default_resolution() -> String { "1080p".into() }
fn default_intensity() -> f64 { 60.0 }
fn default_program() -> PathBuf { PathBuf::from("ffmpeg") }
fn default_video_codec() -> String { "libx264".into() }
fn default_preset() -> String { "veryfast".into() }
fn default_crf() -> u32 { 18 }
fn default_pix_fmt() -> String { "yuv420p".into() }
fn default_audio_codec() -> String { "aac".into() }
fn default_audio_bitrate() -> String { "320k".into() }
fn default_work_dir() -> PathBuf { std::env::temp_dir().join("beatsync") }
fn default_tick_ms() -> u64 { 1000 }
fn default_poll_ms() -> u64 { 1200 }

pub fn load_config(path: &Path) -> Option<Config> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(config) => Some(config),
        Err(err) => {
            log::warn!("Invalid config {}: {}", path.display(), err);
            None
        }
    }
}

/// Explicit path, then `./beatsync.toml`, then the per-user config file.
pub fn find_config(explicit: Option<PathBuf>) -> Option<PathBuf> {
    explicit.or_else(|| {
        let local = PathBuf::from("beatsync.toml");
        if local.exists() {
            return Some(local);
        }
        if let Some(home) = dirs::home_dir() {
            let xdg = home.join(".config").join("beatsync").join("config.toml");
            if xdg.exists() {
                return Some(xdg);
            }
        }
        if let Some(config_dir) = dirs::config_dir() {
            let platform = config_dir.join("beatsync").join("config.toml");
            if platform.exists() {
                return Some(platform);
            }
        }
        None
    })
}
