use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use wavecast_core::{
    palette, AppConfig, Decoder, EncoderSink, ExportEvent, ExportPipeline, FfmpegEncoder,
    ManifestEncoder, RenderConfig, RenderStyle, Session, WavDecoder, WavecastError,
};

fn main() -> wavecast_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };

    match cli.command {
        Commands::Frame {
            input,
            output,
            position,
            render,
        } => run_frame(config, &input, &output, position, &render),
        Commands::Export {
            input,
            output,
            render,
            dry_run,
        } => run_export(config, &input, &output, &render, dry_run),
        Commands::Presets => {
            list_presets();
            Ok(())
        }
    }
}

fn run_frame(
    config: AppConfig,
    input: &Path,
    output: &Path,
    position: f64,
    render: &RenderArgs,
) -> wavecast_core::Result<()> {
    let render_config = render.apply(&config)?;
    tracing::info!(?input, position, style = %render_config.style, "rendering frame");

    let mut session = Session::new(config, Box::new(ManifestEncoder::new()));
    session.load(&WavDecoder, &std::fs::read(input)?)?;
    let frame = session.render_frame(position, render_config)?;
    frame
        .save(output)
        .map_err(|err| WavecastError::msg(format!("writing {}: {err}", output.display())))?;

    tracing::info!(?output, "frame written");
    Ok(())
}

fn run_export(
    config: AppConfig,
    input: &Path,
    output: &Path,
    render: &RenderArgs,
    dry_run: bool,
) -> wavecast_core::Result<()> {
    let render_config = render.apply(&config)?;
    let signal = std::sync::Arc::new(WavDecoder.decode(&std::fs::read(input)?)?);

    let encoder: Box<dyn EncoderSink> = if dry_run {
        Box::new(ManifestEncoder::new())
    } else {
        let ffmpeg = FfmpegEncoder::new();
        if !ffmpeg.is_available() {
            return Err(WavecastError::msg(
                "ffmpeg was not found on PATH, install it or pass --dry-run",
            ));
        }
        Box::new(ffmpeg)
    };

    let mut pipeline = ExportPipeline::new(encoder, config.export.clone(), config.analyzer);
    let events = pipeline.subscribe();
    let handle = pipeline.spawn(signal, render_config)?;

    let mut reported = 0;
    for event in events {
        match event {
            ExportEvent::Status(status) => tracing::info!(?status, "export status"),
            ExportEvent::Progress(progress) => {
                let percent = (progress * 100.0) as u32;
                if percent >= reported + 10 || percent == 100 {
                    reported = percent;
                    tracing::info!("exported {percent}%");
                }
            }
        }
    }

    let artifact = handle.wait()?;
    let output = if output.extension().is_none() {
        output.with_extension(artifact.container().extension())
    } else {
        output.to_path_buf()
    };
    std::fs::write(&output, artifact.bytes())?;
    tracing::info!(
        ?output,
        bytes = artifact.len(),
        mime = artifact.mime_type(),
        "export written"
    );
    Ok(())
}

fn list_presets() {
    println!("colour presets:");
    for preset in palette::catalog() {
        let kind = if preset.is_solid() { "solid" } else { "gradient" };
        println!("  {:<10} {kind}, {} stops", preset.name(), preset.stops().len());
    }
    println!("styles:");
    for style in RenderStyle::ALL {
        println!("  {style}");
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Audio-synchronised visualiser and video export",
    long_about = None
)]
struct Cli {
    /// JSON configuration file. Command line flags take precedence.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Render a single frame to a PNG file.
    Frame {
        /// WAV file to visualise.
        input: PathBuf,
        /// Destination PNG.
        output: PathBuf,
        /// Playback position in seconds.
        #[arg(short, long, default_value_t = 0.0)]
        position: f64,
        #[command(flatten)]
        render: RenderArgs,
    },
    /// Export the whole file as a video.
    Export {
        /// WAV file to visualise.
        input: PathBuf,
        /// Destination file. The container extension is added when missing.
        output: PathBuf,
        #[command(flatten)]
        render: RenderArgs,
        /// Write a JSON manifest of the frames instead of invoking ffmpeg.
        #[arg(long)]
        dry_run: bool,
    },
    /// List the colour presets and render styles.
    Presets,
}

#[derive(Args, Debug)]
struct RenderArgs {
    /// Render style, e.g. `circle` or `bottom-bars`.
    #[arg(short, long)]
    style: Option<String>,
    /// Colour preset name.
    #[arg(long)]
    preset: Option<String>,
    /// Keep the background transparent.
    #[arg(long)]
    transparent: bool,
}

impl RenderArgs {
    fn apply(&self, config: &AppConfig) -> wavecast_core::Result<RenderConfig> {
        let mut settings = config.render.clone();
        if let Some(style) = &self.style {
            settings.style = style.parse()?;
        }
        if let Some(preset) = &self.preset {
            settings.preset = preset.clone();
        }
        settings.transparent_background |= self.transparent;
        settings.resolve()
    }
}
