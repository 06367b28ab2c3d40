//! voicegate capture CLI.
//!
//! Opens a microphone, runs the gated engine in a worker thread, and writes
//! each delivered take to a WAV file. Canceled takes are reported with their
//! reason instead.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use voicegate::hub::{EventHub, HostEvent, HostEventKind};
use voicegate::input::{MicSource, DEFAULT_BLOCK_SAMPLES};
use voicegate::{ConfigPatch, EngineConfig, EngineEvent, SaturatePolicy};

#[derive(Debug, Parser)]
#[command(about = "Voice-activity-gated audio capture", version)]
struct CaptureCli {
    /// Preferred audio input device name
    #[arg(long)]
    input_device: Option<String>,

    /// Print detected audio input devices and exit
    #[arg(long = "list-input-devices", default_value_t = false)]
    list_input_devices: bool,

    /// Wait for speech before the take starts
    #[arg(long = "auto-start", default_value_t = false)]
    auto_start: bool,

    /// End the take automatically on trailing silence
    #[arg(long = "auto-stop", default_value_t = false)]
    auto_stop: bool,

    /// Policy for clipped takes
    #[arg(long = "on-saturate", value_enum, default_value = "none")]
    on_saturate: SaturatePolicy,

    /// Amplitude above which a sample counts as clipped
    #[arg(long = "saturation-threshold")]
    saturation_threshold: Option<f32>,

    /// Amplitude above which speech onset is detected
    #[arg(long = "start-threshold")]
    start_threshold: Option<f32>,

    /// Block peak below which a block counts as silence
    #[arg(long = "stop-threshold")]
    stop_threshold: Option<f32>,

    /// Seconds of continuous silence that end the take
    #[arg(long = "stop-duration")]
    stop_duration: Option<f32>,

    /// Seconds of audio kept before detected speech onset
    #[arg(long = "margin-before")]
    margin_before: Option<f32>,

    /// Seconds of silence kept after the detected cutoff
    #[arg(long = "margin-after")]
    margin_after: Option<f32>,

    /// Takes shorter than this many seconds are rejected
    #[arg(long = "min-duration")]
    min_duration: Option<f32>,

    /// Hard cap on take duration in seconds (0 disables)
    #[arg(long = "time-limit")]
    time_limit: Option<f32>,

    /// JSON configuration overlay, applied after the individual flags
    #[arg(long = "config-json", value_name = "JSON")]
    config_json: Option<String>,

    /// Number of takes to capture before exiting
    #[arg(long, default_value_t = 1)]
    takes: usize,

    /// Output WAV path; with multiple takes an index is appended
    #[arg(long, short, default_value = "take.wav")]
    output: PathBuf,

    /// Write a JSON trace log (VOICEGATE_TRACE_LOG overrides the path)
    #[arg(long = "logs", env = "VOICEGATE_LOGS", default_value_t = false)]
    logs: bool,
}

impl CaptureCli {
    fn engine_config(&self, sample_rate: u32) -> Result<EngineConfig> {
        let mut config = EngineConfig {
            auto_start: self.auto_start,
            auto_stop: self.auto_stop,
            on_saturate: self.on_saturate,
            sample_rate,
            ..EngineConfig::default()
        };
        config.apply(&ConfigPatch {
            saturation_threshold: self.saturation_threshold,
            start_threshold: self.start_threshold,
            stop_threshold: self.stop_threshold,
            stop_duration: self.stop_duration,
            margin_before: self.margin_before,
            margin_after: self.margin_after,
            min_duration: self.min_duration,
            time_limit: self.time_limit,
            ..ConfigPatch::default()
        });
        if let Some(json) = &self.config_json {
            let patch = ConfigPatch::from_json(json).context("invalid --config-json")?;
            config.apply(&patch);
        }
        config.validate()?;
        Ok(config)
    }

    fn output_path(&self, index: usize) -> PathBuf {
        if self.takes <= 1 {
            return self.output.clone();
        }
        let stem = self
            .output
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "take".to_string());
        let ext = self
            .output
            .extension()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "wav".to_string());
        self.output.with_file_name(format!("{stem}-{index}.{ext}"))
    }
}

fn list_input_devices() -> Result<()> {
    let names = MicSource::list_devices()?;
    if names.is_empty() {
        println!("No audio input devices detected.");
    } else {
        println!("Audio input devices:");
        for name in names {
            println!("  - {name}");
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = CaptureCli::parse();
    voicegate::telemetry::init_tracing(cli.logs);

    if cli.list_input_devices {
        return list_input_devices();
    }

    let mut hub = EventHub::new();
    hub.on(HostEventKind::Ready, |event| {
        if let HostEvent::Ready { sample_rate } = event {
            eprintln!("microphone ready at {sample_rate} Hz");
        }
    });
    hub.on(HostEventKind::ReadyFail, |event| {
        if let HostEvent::ReadyFail { message } = event {
            eprintln!("microphone unavailable: {message}");
        }
    });

    let source = match MicSource::open(cli.input_device.as_deref()) {
        Ok(source) => source,
        Err(err) => {
            hub.fire(HostEvent::ReadyFail {
                message: err.to_string(),
            });
            return Err(err);
        }
    };
    let sample_rate = source.sample_rate()?;
    let config = cli.engine_config(sample_rate)?;
    eprintln!("capturing from '{}'", source.name());

    let worker = voicegate::worker::spawn(config);
    let stream = source.stream_blocks(worker.handle.block_sender(), DEFAULT_BLOCK_SAMPLES)?;
    hub.fire(HostEvent::Ready {
        sample_rate: stream.sample_rate(),
    });

    let mut delivered = 0usize;
    let mut finished = 0usize;
    worker.handle.start();

    while finished < cli.takes {
        let event = worker
            .events
            .recv()
            .context("engine worker exited unexpectedly")?;
        match &event {
            EngineEvent::Started => eprintln!("recording"),
            EngineEvent::Recording { duration, .. } => {
                eprint!("\r  {duration:6.2}s");
            }
            EngineEvent::Saturated => eprintln!("\rwarning: input clipped"),
            EngineEvent::Stopped { take } => {
                eprintln!();
                delivered += 1;
                finished += 1;
                let path = cli.output_path(delivered);
                let bytes = take.to_wav()?;
                std::fs::write(&path, bytes)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                println!(
                    "{}: {:.2}s at {} Hz",
                    path.display(),
                    take.duration(),
                    take.sample_rate()
                );
            }
            EngineEvent::Canceled { reason } => {
                eprintln!();
                finished += 1;
                println!("take canceled: {}", reason.label());
            }
            EngineEvent::Listening { .. } | EngineEvent::Paused => {}
        }
        let terminal = matches!(
            event,
            EngineEvent::Stopped { .. } | EngineEvent::Canceled { .. }
        );
        hub.fire(HostEvent::Engine(event));
        if terminal && finished < cli.takes {
            worker.handle.start();
        }
    }

    if stream.dropped_blocks() > 0 {
        eprintln!("warning: {} audio blocks dropped", stream.dropped_blocks());
    }
    drop(stream);
    worker.shutdown();
    Ok(())
}
