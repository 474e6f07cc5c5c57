use std::{
    fs::File,
    io::BufWriter,
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;
use walkthrough::render::{scene::render_scene, text::discover_font};
use walkthrough::{
    CancelFlag, CpuSurface, DisplayListSurface, Guide, GuideSession, GuidanceClient, IntervalPacer, PlaybackEvent,
    Surface as _, Timeline, WalkthroughConfig,
};

#[derive(Parser, Debug)]
#[command(name = "walkthrough", version)]
struct Cli {
    /// Config JSON; defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a single scene frame as a PNG.
    Frame(FrameArgs),
    /// Record a guide's scenes into a video (requires `ffmpeg` on PATH).
    Render(RenderArgs),
    /// Narrate a guide step by step.
    Play(PlayArgs),
    /// Fetch a guide from the guidance backend and save it as JSON.
    Fetch(FetchArgs),
}

#[derive(Parser, Debug)]
struct FrameArgs {
    /// Guide JSON.
    #[arg(long)]
    guide: PathBuf,

    /// Scene index (0-based).
    #[arg(long, default_value_t = 0)]
    scene: usize,

    /// Scene progress in `[0, 1]`.
    #[arg(long, default_value_t = 0.5)]
    progress: f64,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    /// Also print the scene's draw operations to stdout.
    #[arg(long)]
    dump: bool,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Guide JSON.
    #[arg(long)]
    guide: PathBuf,

    /// Output video path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct PlayArgs {
    /// Guide JSON.
    #[arg(long)]
    guide: PathBuf,

    /// Advance on timers only.
    #[arg(long)]
    no_narration: bool,
}

#[derive(Parser, Debug)]
struct FetchArgs {
    /// Player id on the backend.
    #[arg(long)]
    player: u64,

    /// Free-text answer sent with the guidance request.
    #[arg(long)]
    answer: String,

    /// Output guide JSON path.
    #[arg(long)]
    out: PathBuf,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = WalkthroughConfig::load(cli.config.as_deref()).context("load config")?;
    match cli.cmd {
        Command::Frame(args) => cmd_frame(&cfg, args),
        Command::Render(args) => cmd_render(&cfg, args).await,
        Command::Play(args) => cmd_play(cfg, args).await,
        Command::Fetch(args) => cmd_fetch(&cfg, args).await,
    }
}

fn read_guide(path: &Path) -> anyhow::Result<Guide> {
    Guide::from_path(path).with_context(|| format!("load guide '{}'", path.display()))
}

fn create_parent_dir(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    Ok(())
}

fn make_surface(cfg: &WalkthroughConfig) -> anyhow::Result<CpuSurface> {
    let font = discover_font(cfg.font_path.as_deref());
    Ok(CpuSurface::new(cfg.encode.canvas, font.as_deref())?)
}

fn cmd_frame(cfg: &WalkthroughConfig, args: FrameArgs) -> anyhow::Result<()> {
    let guide = read_guide(&args.guide)?;
    let scenes = guide.render_scenes();
    let scene = scenes.get(args.scene).with_context(|| {
        format!(
            "scene {} out of range (guide has {})",
            args.scene,
            scenes.len()
        )
    })?;

    if args.dump {
        let mut list = DisplayListSurface::new(cfg.encode.canvas);
        render_scene(&mut list, &cfg.theme, scene, args.progress);
        for op in list.ops() {
            println!("{op:?}");
        }
    }

    let mut surface = make_surface(cfg)?;
    render_scene(&mut surface, &cfg.theme, scene, args.progress);
    let frame = surface.read_frame()?;

    create_parent_dir(&args.out)?;
    image::save_buffer_with_format(
        &args.out,
        &frame.data,
        frame.width,
        frame.height,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

async fn cmd_render(cfg: &WalkthroughConfig, args: RenderArgs) -> anyhow::Result<()> {
    let guide = read_guide(&args.guide)?;
    let mut session = GuideSession::from_config(cfg).await;
    session.replace_guide(guide)?;

    let mut surface = make_surface(cfg)?;
    let mut pacer = IntervalPacer::new(cfg.encode.fps);
    let cancel = CancelFlag::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let encoded = session
        .encode_video(&mut surface, &mut pacer, &cancel)
        .await;
    let video = match encoded {
        Ok(Some(video)) => video,
        Ok(None) => anyhow::bail!(
            "'{}' already points at a remote video; nothing to record",
            args.guide.display()
        ),
        Err(e) => {
            let status = session.pipeline().status();
            if let Some(hint) = status.fallback {
                eprintln!("{}: {hint}", status.message);
            }
            return Err(e.into());
        }
    };

    create_parent_dir(&args.out)?;
    video.write_to(&args.out)?;
    eprintln!(
        "wrote {} ({} bytes, {})",
        args.out.display(),
        video.len(),
        video.mime()
    );
    Ok(())
}

async fn cmd_play(mut cfg: WalkthroughConfig, args: PlayArgs) -> anyhow::Result<()> {
    if args.no_narration {
        cfg.narrator.enabled = false;
    }
    let guide = read_guide(&args.guide)?;
    let timeline = Timeline::from_guide(&guide);
    let mut session = GuideSession::from_config(&cfg).await;
    session.replace_guide(guide)?;

    let mut handle = session.play()?;
    eprintln!("{}", handle.snapshot().message);
    loop {
        tokio::select! {
            ev = handle.events().recv() => match ev {
                Ok(PlaybackEvent::Activated { index, .. }) => {
                    if let Some(entry) = timeline.get(index) {
                        eprintln!("[{}/{}] {}", index + 1, timeline.len(), entry.on_screen);
                    }
                }
                Ok(PlaybackEvent::Finished { .. } | PlaybackEvent::Stopped { .. }) => break,
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            },
            res = tokio::signal::ctrl_c() => {
                res.context("listen for ctrl-c")?;
                session.stop();
            }
        }
    }

    eprintln!("{}", handle.settled().await.message);
    Ok(())
}

async fn cmd_fetch(cfg: &WalkthroughConfig, args: FetchArgs) -> anyhow::Result<()> {
    let client = GuidanceClient::new(&cfg.backend)?;
    let guide = client
        .guidance(args.player, &args.answer)
        .await
        .with_context(|| format!("fetch guidance from {}", client.base_url()))?
        .into_guide()?;

    create_parent_dir(&args.out)?;
    let f = File::create(&args.out)
        .with_context(|| format!("create '{}'", args.out.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(f), &guide.to_doc())
        .with_context(|| format!("write guide '{}'", args.out.display()))?;

    eprintln!(
        "wrote {} ({} entries: {})",
        args.out.display(),
        guide.len(),
        guide.title()
    );
    Ok(())
}
