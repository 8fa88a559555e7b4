mod cli;

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Commands};
use sl_av::Transcoder;
use sl_core::config::Config;
use sl_core::{QualityPreset, VideoId};
use sl_server::orchestrator::{self, StartOutcome};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Start { host, port } => block_on(start_server(host, port, cli.config.as_deref())),
        Commands::Transcode { video_id } => {
            block_on(transcode_one(&video_id, cli.config.as_deref()))
        }
        Commands::Probe { file, json } => block_on(probe_file(&file, json, cli.config.as_deref())),
        Commands::CheckTools => check_tools(cli.config.as_deref()),
        Commands::Validate { config: path } => validate_config(path.or(cli.config).as_deref()),
        Commands::Version => {
            println!("streamladder {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Each async subcommand drives its own runtime.
fn block_on<F: std::future::Future<Output = Result<()>>>(task: F) -> Result<()> {
    tokio::runtime::Runtime::new()?.block_on(task)
}

/// RUST_LOG wins when set; otherwise the verbose flag picks a preset.
fn init_logging(verbose: bool) {
    const NORMAL: &str =
        "streamladder=debug,sl_server=debug,sl_av=debug,sl_store=info,sl_media=info,tower_http=info";
    const VERBOSE: &str =
        "streamladder=trace,sl_server=trace,sl_av=trace,sl_store=debug,sl_media=debug,sl_core=debug,tower_http=debug";

    let fallback = if verbose { VERBOSE } else { NORMAL };
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| fallback.to_string());

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn start_server(host: String, port: u16, config_path: Option<&Path>) -> Result<()> {
    let mut config = Config::load_or_default(config_path);

    // CLI flags override the file.
    config.server.host = host;
    config.server.port = port;

    tracing::info!("starting streamladder on {}:{}", config.server.host, config.server.port);

    sl_server::start(config, config_path.map(|p| p.to_path_buf())).await?;
    Ok(())
}

/// One-shot orchestration: start the job, then follow its events until
/// the job settles, printing per-rendition progress.
async fn transcode_one(raw_id: &str, config_path: Option<&Path>) -> Result<()> {
    let video_id: VideoId = raw_id
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid video id '{raw_id}': {e}"))?;

    let config = Config::load_or_default(config_path);
    let ctx = sl_server::build_context(config, config_path.map(|p| p.to_path_buf()))?;

    // Subscribe before starting so no event is missed.
    let mut events = ctx.event_bus.subscribe();

    match orchestrator::start_job(&ctx, video_id, None).await? {
        StartOutcome::Started => {}
        StartOutcome::AlreadyRunning => {
            println!("Video {video_id} is already being transcoded");
            return Ok(());
        }
    }

    println!("Transcoding {video_id}...");

    loop {
        use sl_core::events::EventPayload;
        use tokio::sync::broadcast::error::RecvError;

        let event = match events.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => anyhow::bail!("Event stream closed unexpectedly"),
        };

        match event.payload {
            EventPayload::VariantStarted { video_id: v, quality } if v == video_id => {
                println!("  {quality}: encoding...");
            }
            EventPayload::VariantSucceeded { video_id: v, quality } if v == video_id => {
                println!("  {quality}: done");
            }
            EventPayload::VariantFailed { video_id: v, quality, error } if v == video_id => {
                println!("  {quality}: failed ({error})");
            }
            EventPayload::VariantSkipped { video_id: v, quality } if v == video_id => {
                println!("  {quality}: skipped (above source height)");
            }
            EventPayload::TranscodeCompleted { video_id: v, succeeded } if v == video_id => {
                println!();
                println!("Completed: {succeeded} renditions");
                println!("Output: {}", ctx.store.video_dir(video_id).display());
                return Ok(());
            }
            EventPayload::TranscodeStopped { video_id: v } if v == video_id => {
                println!();
                println!("Stopped before completion");
                return Ok(());
            }
            EventPayload::TranscodeFailed { video_id: v, error } if v == video_id => {
                anyhow::bail!("Transcode failed: {error}");
            }
            _ => {}
        }
    }
}

async fn probe_file(file: &Path, json: bool, config_path: Option<&Path>) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {}", file.display());
    }

    let config = Config::load_or_default(config_path);
    let tools = sl_av::ToolRegistry::discover(&config.tools);
    let transcoder = sl_av::FfmpegTranscoder::new(tools);

    let timeout = timeout_from(config.transcode.probe_timeout_secs);
    let info = transcoder.probe(file, timeout).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!("File: {}", file.display());
    println!("Size: {} bytes", info.file_size);
    if let Some(duration) = info.duration_secs {
        println!("Duration: {}", hms(duration as u64));
    }
    let codec = info.video_codec.as_deref().unwrap_or("unknown");
    println!("Video: {codec} {}x{}", info.width, info.height);
    if let Some(fps) = info.frame_rate {
        println!("Frame rate: {fps:.3} fps");
    }
    match info.audio_codec {
        Some(ref codec) => println!("Audio: {codec}"),
        None => println!("Audio: none"),
    }
    println!("Ladder quality: {}", QualityPreset::original_quality_label(info.height));

    Ok(())
}

fn check_tools(config_path: Option<&Path>) -> Result<()> {
    let config = Config::load_or_default(config_path);
    let registry = sl_av::ToolRegistry::discover(&config.tools);

    println!("External tools:\n");

    let mut missing = 0;
    for tool in registry.inventory() {
        if !tool.available {
            missing += 1;
        }
        let mut line = format!("{} {}", if tool.available { "✓" } else { "✗" }, tool.name);
        if let Some(version) = &tool.version {
            line.push_str(&format!(" ({version})"));
        }
        if let Some(path) = &tool.path {
            line.push_str(&format!(" at {}", path.display()));
        }
        println!("{line}");
    }

    println!();
    if missing == 0 {
        println!("All tools are available.");
    } else {
        println!("{missing} tool(s) missing; install them to enable transcoding.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(file) => {
            println!("Validating {}", file.display());
            let config = Config::from_json(&std::fs::read_to_string(file)?)?;
            println!("✓ Config file is valid");
            config
        }
        None => {
            println!("No file given; checking built-in defaults");
            Config::default()
        }
    };

    println!("  Server: {}:{}", config.server.host, config.server.port);
    println!("  Media root: {}", config.storage.media_root.display());
    println!("  Segment length: {}s", config.transcode.segment_seconds);
    println!("  Video preset: {}", config.transcode.video_preset);
    println!("  Ladder: {} presets", QualityPreset::all().len());

    for warning in config.validate() {
        println!("  ⚠ {warning}");
    }

    Ok(())
}

fn hms(secs: u64) -> String {
    let mins = secs / 60;
    format!("{:02}:{:02}:{:02}", mins / 60, mins % 60, secs % 60)
}

fn timeout_from(secs: u64) -> Option<Duration> {
    (secs != 0).then_some(Duration::from_secs(secs))
}
