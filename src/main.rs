mod cli;
mod config;
mod audio;
mod render;
mod encode;
mod jobs;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::Path;

use audio::beats::{detect_beats, BeatAnalysis};
use audio::decode::AudioData;
use cli::{AnalyzeArgs, Cli, Command, RenderArgs};
use config::Config;
use jobs::job::JobStatus;
use jobs::manager::{Asset, RenderJobManager, RenderRequest};
use render::meta::{RenderMeta, Resolution};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalysisReport<'a> {
    beats: &'a [f64],
    bpm: Option<u32>,
    duration: f64,
    sample_rate: u32,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    let config = match config::find_config(cli.config.clone()) {
        Some(path) => match config::load_config(&path) {
            Some(cfg) => {
                log::info!("Loaded config from {}", path.display());
                cfg
            }
            None => {
                log::warn!("Failed to load config from {}", path.display());
                Config::default()
            }
        },
        None => Config::default(),
    };

    match cli.command {
        Command::Analyze(args) => analyze(&args),
        Command::Render(args) => {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("Failed to start async runtime")?;
            let meta = build_meta(&args, &config)?;
            runtime.block_on(render(&args, meta, &config))
        }
    }
}

/// Decode and detect; returns the analysis alongside the decoded audio.
fn analyze_audio(path: &Path) -> Result<(BeatAnalysis, AudioData)> {
    if !path.exists() {
        anyhow::bail!("Input file not found: {}", path.display());
    }

    log::info!("Decoding audio...");
    let audio = audio::decode::decode_audio(path)?;

    log::info!("Detecting beats...");
    let analysis = detect_beats(audio.primary_channel(), audio.sample_rate);
    Ok((analysis, audio))
}

fn analyze(args: &AnalyzeArgs) -> Result<()> {
    let (analysis, audio) = analyze_audio(&args.input)?;

    let report = AnalysisReport {
        beats: &analysis.beats,
        bpm: analysis.bpm,
        duration: audio.duration(),
        sample_rate: audio.sample_rate,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    if let Some(ref meta_out) = args.meta_out {
        let mut meta = RenderMeta {
            beats: analysis.beats.clone(),
            bpm: analysis.bpm.map(f64::from),
            duration: Some(audio.duration()),
            ..Default::default()
        };
        meta.filenames.audio = file_name(&args.input);

        std::fs::write(meta_out, serde_json::to_vec_pretty(&meta)?)
            .with_context(|| format!("Failed to write {}", meta_out.display()))?;
        log::info!("Wrote render meta to {}", meta_out.display());
    }

    Ok(())
}

/// Meta file first, then explicit flags, then config defaults for anything
/// still unset. Beats and duration come from analysis when missing.
fn build_meta(args: &RenderArgs, config: &Config) -> Result<RenderMeta> {
    let mut meta = match args.meta {
        Some(ref path) => {
            let bytes = std::fs::read(path)
                .with_context(|| format!("Failed to read meta file: {}", path.display()))?;
            RenderMeta::from_json(&bytes)
                .with_context(|| format!("Invalid meta JSON: {}", path.display()))?
        }
        None => RenderMeta::default(),
    };

    if let Some(intensity) = args.intensity {
        meta.intensity = Some(intensity);
    } else if meta.intensity.is_none() {
        meta.intensity = Some(config.render.intensity);
    }

    if let Some(fps) = args.fps {
        meta.frame_rate = Some(fps as f64);
    } else if meta.frame_rate.is_none() {
        meta.frame_rate = Some(config.render.fps as f64);
    }

    if let Some(ref resolution) = args.resolution {
        meta.resolution = Some(Resolution::from_label(resolution));
    } else if meta.resolution.is_none() {
        meta.resolution = Some(Resolution::from_label(&config.render.resolution));
    }

    if args.prompt.is_some() {
        meta.prompt = args.prompt.clone();
    }
    if args.negative_prompt.is_some() {
        meta.negative_prompt = args.negative_prompt.clone();
    }
    if args.style_strength.is_some() {
        meta.style_strength = args.style_strength;
    }
    if args.seed.is_some() {
        meta.seed = args.seed.clone();
    }

    meta.filenames.image = file_name(&args.image);
    meta.filenames.audio = file_name(&args.audio);

    if !args.no_analyze && (meta.beats.is_empty() || meta.duration.is_none()) {
        let (analysis, audio) = analyze_audio(&args.audio)?;
        if meta.beats.is_empty() {
            meta.beats = analysis.beats;
            meta.bpm = analysis.bpm.map(f64::from);
        }
        if meta.duration.is_none() {
            meta.duration = Some(audio.duration());
        }
    }

    Ok(meta)
}

async fn render(args: &RenderArgs, meta: RenderMeta, config: &Config) -> Result<()> {
    log::info!("Image: {}", args.image.display());
    log::info!("Audio: {}", args.audio.display());
    log::info!("Output: {}", args.output.display());

    let image = Asset::read(&args.image)
        .await
        .with_context(|| format!("Failed to read image: {}", args.image.display()))?;
    let audio = Asset::read(&args.audio)
        .await
        .with_context(|| format!("Failed to read audio: {}", args.audio.display()))?;

    let manager = RenderJobManager::new(config.encoder.clone(), &config.jobs);
    let id = manager
        .submit(RenderRequest {
            image: Some(image),
            audio: Some(audio),
            meta: Some(meta),
        })
        .await?;
    log::info!("Submitted job {}", id);

    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}% {msg}")?
            .progress_chars("=>-"),
    );

    let poll_interval = config.jobs.poll_interval();
    let result = loop {
        let job = manager.status(&id);
        pb.set_position((job.progress * 100.0).round() as u64);

        match job.status {
            JobStatus::Completed => {
                pb.finish_with_message("Rendering complete");
                break job.url.context("Completed job has no result location")?;
            }
            JobStatus::Failed => {
                pb.abandon_with_message("Rendering failed");
                anyhow::bail!(
                    "Render job {} failed: {}",
                    id,
                    job.error.as_deref().unwrap_or("unknown error")
                );
            }
            JobStatus::Queued | JobStatus::Running => {
                tokio::time::sleep(poll_interval).await;
            }
        }
    };

    tokio::fs::copy(&result, &args.output)
        .await
        .with_context(|| format!("Failed to copy {} to {}", result, args.output.display()))?;

    log::info!("Done! Output: {}", args.output.display());
    Ok(())
}

fn file_name(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().into_owned())
}
