use std::io::{self, BufReader};
use std::time::Duration;

use tokio::sync::broadcast;
use vigilcam_engine::config::Config;
use vigilcam_engine::logging::init_tracing;
use vigilcam_engine::proctor::clock::{ManualClock, SystemClock};
use vigilcam_engine::proctor::report::SessionReport;
use vigilcam_engine::runtime::replay::{self, RecordedFrame, ReplayError};
use vigilcam_engine::ProctorEngine;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let config = Config::from_env();
    init_tracing(&config.log_config());
    tracing::info!("Starting vigilcam-replay");

    let input = std::env::args()
        .nth(1)
        .or_else(|| config.replay.input.clone());

    let frames = match load_frames(input.as_deref()) {
        Ok(frames) => frames,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load recording");
            std::process::exit(1);
        }
    };

    let result = if config.replay.realtime {
        run_realtime(&config, frames).await
    } else {
        run_virtual(&config, &frames)
    };

    match result {
        Ok(report) => match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize report");
                std::process::exit(1);
            }
        },
        Err(e) => {
            tracing::error!(error = %e, "Replay failed");
            std::process::exit(1);
        }
    }
}

fn load_frames(input: Option<&str>) -> Result<Vec<RecordedFrame>, ReplayError> {
    match input {
        None | Some("-") => replay::parse_recording(BufReader::new(io::stdin().lock())),
        Some(path) => replay::read_recording(path),
    }
}

fn run_virtual(config: &Config, frames: &[RecordedFrame]) -> Result<SessionReport, ReplayError> {
    let clock = ManualClock::default();
    let mut engine = ProctorEngine::new(
        config.thresholds.clone(),
        Default::default(),
        clock.clone(),
    )?
    .with_subject_label(config.replay.subject_label.clone());
    replay::replay_virtual(&mut engine, &clock, frames, config.replay.calibration_ms)
}

async fn run_realtime(
    config: &Config,
    frames: Vec<RecordedFrame>,
) -> Result<SessionReport, ReplayError> {
    let engine = ProctorEngine::new(config.thresholds.clone(), Default::default(), SystemClock)?
        .with_subject_label(config.replay.subject_label.clone());

    let (shutdown_tx, _) = broadcast::channel::<()>(8);
    tokio::spawn(shutdown_signal(shutdown_tx.clone()));

    let outcome = replay::replay_realtime(
        engine,
        frames,
        config.replay.calibration_ms,
        Duration::from_millis(config.replay.driver_tick_ms),
        &shutdown_tx,
    )
    .await?;

    tracing::info!(
        streamed = outcome.streamed.len(),
        dropped_frames = outcome.dropped_frames,
        interrupted = outcome.interrupted,
        "Realtime replay finished"
    );
    Ok(outcome.report)
}

async fn shutdown_signal(shutdown_tx: broadcast::Sender<()>) {
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(sigterm) => sigterm,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                    let _ = tokio::signal::ctrl_c().await;
                    let _ = shutdown_tx.send(());
                    return;
                }
            };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = sigterm.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    tracing::info!("Shutdown signal received");
    let _ = shutdown_tx.send(());
}
