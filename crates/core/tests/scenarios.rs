use std::{f32::consts::TAU, sync::Arc};

use image::Rgba;
use wavecast_core::{
    palette, AppConfig, Compositor, DecodedSignal, EncodeError, ExportEvent, ExportPipeline,
    ExportStatus, FreeRunTicker, FrequencySnapshot, Manifest, ManifestEncoder, RenderConfig,
    RenderStyle, Session, WavecastError, FRAME_HEIGHT, FRAME_WIDTH,
};

const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);
const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

fn sine(seconds: f64, sample_rate: u32, channels: usize) -> DecodedSignal {
    let len = (seconds * sample_rate as f64) as usize;
    let channel: Vec<f32> = (0..len)
        .map(|i| (TAU * 220.0 * i as f32 / sample_rate as f32).sin() * 0.8)
        .collect();
    DecodedSignal::new(vec![channel; channels], sample_rate).unwrap()
}

fn config(style: RenderStyle, preset: &str, transparent: bool) -> RenderConfig {
    RenderConfig {
        style,
        preset: palette::preset(preset).unwrap(),
        transparent_background: transparent,
    }
}

#[test]
fn line_frame_follows_the_playback_position() {
    let mut session = Session::new(AppConfig::default(), Box::new(ManifestEncoder::new()));
    session.load_signal(sine(2.0, 44_100, 1));
    let line = config(RenderStyle::Line, "white", false);

    let middle = session.render_frame(1.0, line.clone()).unwrap();
    assert_eq!(middle.dimensions(), (FRAME_WIDTH, FRAME_HEIGHT));
    assert!(middle.pixels().all(|pixel| *pixel == BLACK || *pixel == WHITE));
    assert!(middle.pixels().any(|pixel| *pixel == WHITE));

    let start = session.render_frame(0.0, line).unwrap();
    assert_ne!(middle, start);
}

#[test]
fn bass_heavy_pulse_reaches_maximum_radius() {
    let compositor = Compositor::default();
    let signal = sine(1.0, 44_100, 1);
    let mut bins = vec![0u8; 1024];
    bins[..200].fill(255);
    let snapshot = FrequencySnapshot::new(bins);

    let radius = compositor.pulse_radius(&snapshot, FRAME_HEIGHT);
    assert!((radius - 0.6 * FRAME_HEIGHT as f32).abs() < 1e-3);

    let pulse = config(RenderStyle::Pulse, "white", false);
    let mut first = Compositor::frame(FRAME_WIDTH, FRAME_HEIGHT);
    let mut second = Compositor::frame(FRAME_WIDTH, FRAME_HEIGHT);
    compositor.render(&mut first, &signal, 0.5, Some(&snapshot), &pulse);
    compositor.render(&mut second, &signal, 0.5, Some(&snapshot), &pulse);
    assert_eq!(first, second);

    let (cx, cy) = (FRAME_WIDTH / 2, FRAME_HEIGHT / 2);
    assert_eq!(*first.get_pixel(cx + 430, cy), WHITE);
    assert_eq!(*first.get_pixel(cx + 436, cy), BLACK);
}

#[test]
fn opaque_export_runs_to_completion() {
    let config_file = AppConfig::default();
    let mut pipeline = ExportPipeline::new(
        Box::new(ManifestEncoder::new()),
        config_file.export.clone(),
        config_file.analyzer.clone(),
    );
    let events = pipeline.subscribe();
    let monitor = pipeline.monitor();
    assert_eq!(monitor.status().unwrap(), ExportStatus::Idle);

    let signal = Arc::new(sine(3.0, 44_100, 2));
    let artifact = pipeline
        .run(
            signal.clone(),
            config(RenderStyle::Circle, "aurora", false),
            &mut FreeRunTicker,
        )
        .unwrap();
    drop(pipeline);

    assert!(!artifact.is_empty());
    assert_eq!(monitor.status().unwrap(), ExportStatus::Complete);
    assert_eq!(monitor.progress().unwrap(), 1.0);

    let events: Vec<ExportEvent> = events.try_iter().collect();
    let statuses: Vec<ExportStatus> = events
        .iter()
        .filter_map(|event| match event {
            ExportEvent::Status(status) => Some(*status),
            _ => None,
        })
        .collect();
    assert_eq!(
        statuses,
        vec![
            ExportStatus::Recording,
            ExportStatus::Finalizing,
            ExportStatus::Complete
        ]
    );
    let progress: Vec<f32> = events
        .iter()
        .filter_map(|event| match event {
            ExportEvent::Progress(value) => Some(*value),
            _ => None,
        })
        .collect();
    assert!(progress.windows(2).all(|pair| pair[0] <= pair[1]));
    assert_eq!(progress.last(), Some(&1.0));

    let manifest = Manifest::from_artifact(&artifact).unwrap();
    let fps = manifest.settings.fps as f64;
    assert_eq!(manifest.frame_count, 90);
    assert!((manifest.video_duration() - signal.duration()).abs() <= 1.0 / fps);
    assert_eq!(manifest.audio_samples, signal.frame_count() as u64 * 2);
    assert!((manifest.audio_duration() - signal.duration()).abs() < 1e-9);
}

#[test]
fn transparent_export_without_alpha_fails() {
    let mut session = Session::new(
        AppConfig::default(),
        Box::new(ManifestEncoder::without_alpha()),
    );
    session.load_signal(sine(1.0, 44_100, 1));

    let err = session
        .export(config(RenderStyle::BottomBars, "fire", true))
        .unwrap_err();
    assert!(matches!(
        err,
        WavecastError::Encode(EncodeError::AlphaUnsupported)
    ));

    let monitor = session.export_monitor();
    assert_eq!(monitor.status().unwrap(), ExportStatus::Failed);
    assert!(session.export_pipeline().artifact().unwrap().is_none());
}
