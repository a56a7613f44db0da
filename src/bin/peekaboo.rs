use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use peekaboo::{
    Clock, ManualClock, ScaledClock, Stage, StageConfig, StageRenderer, SystemClock,
    audio::{
        context::AudioContext,
        pcm::write_f32le_file,
        schedule::{schedule_end, schedule_song},
    },
    capture::{
        ffmpeg::{ensure_parent_dir, flatten_premul_over_bg_to_opaque_rgba8},
        format::{CodecProbe as _, FfmpegProbe, PREFERRED_FORMATS, pick_supported_format},
    },
    eval::{frame_state::FrameState, pulses::mouth_openness},
};
use tracing_subscriber::EnvFilter;

const STATUS_POLL: Duration = Duration::from_millis(40);

#[derive(Parser, Debug)]
#[command(name = "peekaboo", version)]
struct Cli {
    /// Stage config JSON. Defaults are used for anything it leaves out.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render the stage at one point of the song as a PNG.
    Frame(FrameArgs),
    /// Play the song in real time, printing lyrics as they are sung.
    Play(PlayArgs),
    /// Record the song to WebM (requires `ffmpeg` on PATH).
    Record(RecordArgs),
    /// Write the synthesized song, release tail included, as raw stereo f32le PCM.
    Audio(AudioArgs),
    /// List recording formats and whether the local ffmpeg supports them.
    Formats,
}

#[derive(Parser, Debug)]
struct FrameArgs {
    /// Seconds from song start.
    #[arg(long, default_value_t = 0.0)]
    time: f64,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct PlayArgs {
    /// Stop after this many seconds instead of at the end of the song.
    #[arg(long)]
    seconds: Option<f64>,

    /// Playback speed multiplier.
    #[arg(long, default_value_t = 1.0)]
    speed: f64,
}

#[derive(Parser, Debug)]
struct RecordArgs {
    /// Directory for the recording; overrides the config.
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Capture speed multiplier. Output timing is unaffected.
    #[arg(long, default_value_t = 1.0)]
    speed: f64,
}

#[derive(Parser, Debug)]
struct AudioArgs {
    /// Output `.f32le` path.
    #[arg(long)]
    out: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    match cli.cmd {
        Command::Frame(args) => cmd_frame(config, args),
        Command::Play(args) => cmd_play(config, args),
        Command::Record(args) => cmd_record(config, args),
        Command::Audio(args) => cmd_audio(config, args),
        Command::Formats => cmd_formats(),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<StageConfig> {
    match path {
        Some(p) => StageConfig::from_path(p)
            .with_context(|| format!("load stage config '{}'", p.display())),
        None => Ok(StageConfig::default()),
    }
}

fn clock_for(speed: f64) -> Arc<dyn Clock> {
    if speed == 1.0 {
        Arc::new(SystemClock::new())
    } else {
        Arc::new(ScaledClock::new(speed))
    }
}

fn cmd_frame(config: StageConfig, args: FrameArgs) -> anyhow::Result<()> {
    config.validate()?;
    let song = peekaboo::build_song();

    let mut ctx = AudioContext::new(Arc::new(ManualClock::new(0.0)), config.sample_rate)?;
    ctx.resume()?;
    let pulses = schedule_song(&mut ctx, 0.0, &song)?;
    let state = FrameState::evaluate(&song, args.time, mouth_openness(pulses.onsets(), args.time));

    let mut renderer = StageRenderer::new(config.canvas())?;
    let frame = renderer.render(&state)?;
    let mut rgba = vec![0u8; frame.data.len()];
    flatten_premul_over_bg_to_opaque_rgba8(&mut rgba, &frame.data, [0, 0, 0, 255])?;

    ensure_parent_dir(&args.out)?;
    image::save_buffer_with_format(
        &args.out,
        &rgba,
        frame.width,
        frame.height,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_play(config: StageConfig, args: PlayArgs) -> anyhow::Result<()> {
    let stage = Stage::new(config, clock_for(args.speed))?;
    let limit = args
        .seconds
        .map(|s| Duration::from_secs_f64(s.max(0.0) / args.speed.max(f64::EPSILON)));

    stage.start_playback()?;
    let started = Instant::now();
    let mut shown = None;
    loop {
        let status = stage.status();
        if !status.is_playing {
            break;
        }
        if status.active_line != shown {
            shown = status.active_line;
            if let Some(line) = shown.and_then(|i| stage.song().lyric_lines.get(i)) {
                println!("{}", line.text);
            }
        }
        if limit.is_some_and(|l| started.elapsed() >= l) {
            stage.stop()?;
            break;
        }
        std::thread::sleep(STATUS_POLL);
    }
    stage.wait_idle(Duration::from_secs(5));
    Ok(())
}

fn cmd_record(mut config: StageConfig, args: RecordArgs) -> anyhow::Result<()> {
    if let Some(dir) = args.out_dir {
        config.output_dir = dir;
    }
    std::fs::create_dir_all(&config.output_dir)
        .with_context(|| format!("create output dir '{}'", config.output_dir.display()))?;
    let stage = Stage::new(config, clock_for(args.speed))?;

    stage.start_recording()?;
    let budget = stage.song().total_duration / args.speed.max(f64::EPSILON) + 30.0;
    if !stage.wait_idle(Duration::from_secs_f64(budget)) {
        stage.stop()?;
    }

    let info = stage
        .status()
        .last_recording
        .context("recording finished without output")?;
    println!("{} ({}, {})", info.path.display(), info.size_label, info.format.mime);
    Ok(())
}

fn cmd_audio(config: StageConfig, args: AudioArgs) -> anyhow::Result<()> {
    config.validate()?;
    let song = peekaboo::build_song();

    let mut ctx = AudioContext::new(Arc::new(ManualClock::new(0.0)), config.sample_rate)?;
    ctx.resume()?;
    schedule_song(&mut ctx, 0.0, &song)?;
    // Includes the pad's release tail after the last beat.
    let pcm = ctx.render_destination(0.0, schedule_end(0.0, &song))?;
    write_f32le_file(&pcm, &args.out)?;

    eprintln!(
        "wrote {} ({} Hz, stereo f32le)",
        args.out.display(),
        config.sample_rate
    );
    Ok(())
}

fn cmd_formats() -> anyhow::Result<()> {
    let probe = FfmpegProbe::detect().context("probe ffmpeg (is it on PATH?)")?;
    for format in PREFERRED_FORMATS {
        let mark = if probe.is_supported(&format) { "yes" } else { "no" };
        println!("{:<32} {mark}", format.mime);
    }
    println!("selected: {}", pick_supported_format(&probe).mime);
    Ok(())
}
