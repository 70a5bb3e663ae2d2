use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "veilcut", version)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print stream properties as JSON.
    Probe(ProbeArgs),
    /// Decode one frame (optionally blurred) as a PNG.
    Frame(FrameArgs),
    /// Re-encode a video with masked regions blurred.
    Export(ExportArgs),
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum HwArg {
    Auto,
    Off,
}

impl From<HwArg> for veilcut::HwAccel {
    fn from(value: HwArg) -> Self {
        match value {
            HwArg::Auto => Self::Auto,
            HwArg::Off => Self::Off,
        }
    }
}

#[derive(Parser, Debug)]
struct ProbeArgs {
    /// Input video.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Hardware decode mode.
    #[arg(long, value_enum, default_value_t = HwArg::Auto)]
    hw: HwArg,
}

#[derive(Parser, Debug)]
struct FrameArgs {
    /// Input video.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Frame index (0-based).
    #[arg(long)]
    frame: u64,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    /// Region track JSON used to blur the frame.
    #[arg(long)]
    track: Option<PathBuf>,

    /// Grayscale PNG mask for this frame (takes precedence over the track).
    #[arg(long)]
    mask: Option<PathBuf>,

    /// Base blur radius in pixels.
    #[arg(long, default_value_t = 16)]
    blur_radius: u32,

    /// Hardware decode mode.
    #[arg(long, value_enum, default_value_t = HwArg::Auto)]
    hw: HwArg,
}

#[derive(Parser, Debug)]
struct ExportArgs {
    /// Input video.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output video; the container follows the extension.
    #[arg(long)]
    out: PathBuf,

    /// Export options JSON. Flags below override it.
    #[arg(long)]
    opts: Option<PathBuf>,

    /// Region track JSON.
    #[arg(long)]
    track: Option<PathBuf>,

    /// Directory of `<frame>.png` grayscale masks.
    #[arg(long)]
    masks_dir: Option<PathBuf>,

    /// Base blur radius in pixels.
    #[arg(long)]
    blur_radius: Option<u32>,

    /// Video encoder name to request (e.g. libx264, mpeg4).
    #[arg(long)]
    codec: Option<String>,

    /// Refuse to overwrite an existing output.
    #[arg(long, default_value_t = false)]
    no_overwrite: bool,

    /// Hardware decode mode.
    #[arg(long, value_enum)]
    hw: Option<HwArg>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.cmd {
        Command::Probe(args) => cmd_probe(args),
        Command::Frame(args) => cmd_frame(args),
        Command::Export(args) => cmd_export(args),
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn cmd_probe(args: ProbeArgs) -> anyhow::Result<()> {
    let opts = veilcut::DecodeOpts {
        hw_accel: args.hw.into(),
    };
    let session = veilcut::DecodeSession::open(&args.in_path, &opts)?;
    let json = serde_json::to_string_pretty(session.info()).context("serialize video info")?;
    println!("{json}");
    eprintln!("hardware decode: {:?}", session.hw_status());
    Ok(())
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    let opts = veilcut::DecodeOpts {
        hw_accel: args.hw.into(),
    };
    let mut session = veilcut::DecodeSession::open(&args.in_path, &opts)?;
    let index = veilcut::FrameIndex(args.frame);
    let mut frame = session
        .frame_by_index(index)
        .cloned()
        .with_context(|| format!("frame {} could not be decoded", args.frame))?;

    let mut store = match &args.track {
        Some(path) => veilcut::MaskStore::from_track(veilcut::RegionTrack::from_path(path)?),
        None => veilcut::MaskStore::new(),
    };
    if let Some(path) = &args.mask {
        store.insert_dense(index, veilcut::AlphaMask::from_image_path(path)?);
    }
    let mut compositor = veilcut::MaskCompositor::new(veilcut::BlurTuning::default())?;
    let blurred = compositor.apply_masked_blur(
        &mut frame,
        veilcut::MaskSource::mask_for(&store, index),
        args.blur_radius,
    )?;
    tracing::debug!(blurred, "composited frame");

    veilcut::export::ensure_parent_dir(&args.out)?;
    image::save_buffer_with_format(
        &args.out,
        &frame.to_packed(),
        frame.width,
        frame.height,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_export(args: ExportArgs) -> anyhow::Result<()> {
    let mut opts = match &args.opts {
        Some(path) => veilcut::ExportOpts::from_path(path)?,
        None => veilcut::ExportOpts::default(),
    };
    if let Some(r) = args.blur_radius {
        opts.blur_radius = r;
    }
    if args.codec.is_some() {
        opts.video_codec = args.codec.clone();
    }
    if args.no_overwrite {
        opts.overwrite = false;
    }
    if let Some(hw) = args.hw {
        opts.hw_accel = hw.into();
    }

    let mut store = match &args.track {
        Some(path) => veilcut::MaskStore::from_track(veilcut::RegionTrack::from_path(path)?),
        None => veilcut::MaskStore::new(),
    };
    if let Some(dir) = &args.masks_dir {
        let n = store.load_dense_dir(dir)?;
        tracing::info!(masks = n, dir = %dir.display(), "loaded dense masks");
    }

    let mut progress = |done: u64, total: u64, status: Option<&str>| {
        if let Some(msg) = status {
            eprintln!("note: {msg}");
        } else if total > 0 {
            eprintln!("{done}/{total} frames");
        } else {
            eprintln!("{done} frames");
        }
    };
    let cancel = veilcut::CancelToken::new();
    let outcome = veilcut::export(
        &args.in_path,
        &args.out,
        &opts,
        &store,
        &mut progress,
        &cancel,
    )?;

    eprintln!(
        "wrote {} ({} frames, {}, audio {:?}, {:?})",
        args.out.display(),
        outcome.frames_written,
        outcome.video_codec,
        outcome.audio,
        outcome.status
    );
    Ok(())
}
