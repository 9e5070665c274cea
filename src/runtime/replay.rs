//! 录制回放
//!
//! 录制格式为 JSON-lines，每行一帧：
//! `{"timestampMs": 1700000000000, "faces": [[{"x":0.5,"y":0.5}, ...]], "audioRms": 0.01}`
//!
//! 录制开头 `calibration_ms` 内的帧用于标定，其余帧进入监控。

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::Duration;

use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;

use crate::error::EngineError;
use crate::proctor::clock::{Clock, ManualClock};
use crate::proctor::engine::{EnginePhase, ProctorEngine};
use crate::proctor::report::SessionReport;
use crate::proctor::types::{LandmarkFrame, ViolationEvent};
use crate::runtime::driver::{DriverHandle, FrameDriver, FrameSender};

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("failed to read recording: {0}")]
    Io(#[from] std::io::Error),
    #[error("line {line}: invalid frame: {source}")]
    Decode {
        line: usize,
        source: serde_json::Error,
    },
    #[error("line {line}: timestamp {timestamp_ms} is earlier than the previous frame")]
    OutOfOrder { line: usize, timestamp_ms: i64 },
    #[error("recording contains no frames")]
    Empty,
    #[error("frame driver task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordedFrame {
    pub timestamp_ms: i64,
    #[serde(flatten)]
    pub frame: LandmarkFrame,
}

/// 逐行解析录制，空行跳过，错误带 1 起始的行号
pub fn parse_recording<R: BufRead>(reader: R) -> Result<Vec<RecordedFrame>, ReplayError> {
    let mut frames: Vec<RecordedFrame> = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: RecordedFrame = serde_json::from_str(&line).map_err(|source| ReplayError::Decode {
            line: idx + 1,
            source,
        })?;
        if let Some(prev) = frames.last() {
            if record.timestamp_ms < prev.timestamp_ms {
                return Err(ReplayError::OutOfOrder {
                    line: idx + 1,
                    timestamp_ms: record.timestamp_ms,
                });
            }
        }
        frames.push(record);
    }
    if frames.is_empty() {
        return Err(ReplayError::Empty);
    }
    Ok(frames)
}

pub fn read_recording(path: impl AsRef<Path>) -> Result<Vec<RecordedFrame>, ReplayError> {
    let file = File::open(path.as_ref())?;
    let frames = parse_recording(BufReader::new(file))?;
    tracing::info!(path = %path.as_ref().display(), frames = frames.len(), "Recording loaded");
    Ok(frames)
}

/// 虚拟时钟回放：时钟按录制时间戳跳进，结果与运行速度无关
pub fn replay_virtual(
    engine: &mut ProctorEngine<ManualClock>,
    clock: &ManualClock,
    frames: &[RecordedFrame],
    calibration_ms: i64,
) -> Result<SessionReport, ReplayError> {
    let first = frames.first().ok_or(ReplayError::Empty)?;
    let start = first.timestamp_ms;

    clock.set_millis(start);
    engine.begin_calibration()?;
    for record in frames {
        clock.set_millis(record.timestamp_ms);
        if engine.phase() == EnginePhase::Calibrating && record.timestamp_ms - start >= calibration_ms {
            engine.finish_calibration()?;
            engine.start_monitoring()?;
        }
        engine.process_frame(&record.frame);
    }
    if engine.phase() != EnginePhase::Monitoring {
        engine.finish_calibration()?;
        engine.start_monitoring()?;
    }

    Ok(engine.stop_monitoring()?)
}

/// 按录制间隔节奏产出帧
pub fn frame_stream(frames: Vec<RecordedFrame>) -> impl Stream<Item = RecordedFrame> {
    async_stream::stream! {
        let mut previous: Option<i64> = None;
        for record in frames {
            if let Some(prev) = previous {
                let delta = (record.timestamp_ms - prev).max(0) as u64;
                tokio::time::sleep(Duration::from_millis(delta)).await;
            }
            previous = Some(record.timestamp_ms);
            yield record;
        }
    }
}

/// 实时回放结果
#[derive(Debug)]
pub struct RealtimeOutcome {
    pub report: SessionReport,
    /// 驱动器实时推送的违规；中断后在引擎上补发的事件只出现在报告中
    pub streamed: Vec<ViolationEvent>,
    pub dropped_frames: u64,
    /// 收到关闭信号而提前结束
    pub interrupted: bool,
}

/// 经由 `FrameDriver` 实时回放，收到关闭信号时提前停止并仍然产出报告
pub async fn replay_realtime<C: Clock + 'static>(
    engine: ProctorEngine<C>,
    frames: Vec<RecordedFrame>,
    calibration_ms: i64,
    tick: Duration,
    shutdown_tx: &broadcast::Sender<()>,
) -> Result<RealtimeOutcome, ReplayError> {
    if frames.is_empty() {
        return Err(ReplayError::Empty);
    }
    let mut shutdown_rx = shutdown_tx.subscribe();
    let driver = FrameDriver::spawn(engine, tick, shutdown_tx.subscribe());
    let collector = tokio::spawn(driver.violations.collect::<Vec<_>>());
    let handle = driver.handle;
    let frames_tx = driver.frames;

    // 命令途中驱动器已退出，说明关闭信号先到
    let mut interrupted =
        match drive_frames(&handle, &frames_tx, frames, calibration_ms, &mut shutdown_rx).await {
            Ok(interrupted) => interrupted,
            Err(EngineError::DriverClosed) => true,
            Err(e) => return Err(e.into()),
        };
    let dropped_frames = frames_tx.dropped();

    let mut report = None;
    if !interrupted {
        match handle.stop_monitoring().await {
            Ok(stopped) => report = Some(stopped),
            Err(EngineError::DriverClosed) => interrupted = true,
            Err(e) => return Err(e.into()),
        }
    }

    // 两个通道都关闭后驱动器自行退出
    drop(handle);
    drop(frames_tx);
    let mut engine = driver.task.await?;
    let report = match report {
        Some(report) => report,
        None => conclude(&mut engine)?,
    };

    let streamed = collector.await?;

    Ok(RealtimeOutcome {
        report,
        streamed,
        dropped_frames,
        interrupted,
    })
}

/// 按录制节奏投递帧，返回是否被关闭信号打断
async fn drive_frames(
    handle: &DriverHandle,
    frames_tx: &FrameSender,
    frames: Vec<RecordedFrame>,
    calibration_ms: i64,
    shutdown_rx: &mut broadcast::Receiver<()>,
) -> Result<bool, EngineError> {
    let Some(start) = frames.first().map(|r| r.timestamp_ms) else {
        return Ok(false);
    };
    handle.begin_calibration().await?;
    let mut calibrating = true;

    let stream = frame_stream(frames);
    futures::pin_mut!(stream);
    loop {
        let record = tokio::select! {
            _ = shutdown_rx.recv() => return Ok(true),
            next = stream.next() => match next {
                Some(record) => record,
                None => break,
            },
        };
        if calibrating && record.timestamp_ms - start >= calibration_ms {
            begin_monitoring(handle).await?;
            calibrating = false;
        }
        frames_tx.offer(record.frame);
    }

    if calibrating {
        begin_monitoring(handle).await?;
    }
    Ok(false)
}

async fn begin_monitoring(handle: &DriverHandle) -> Result<(), EngineError> {
    let baseline = handle.finish_calibration().await?;
    tracing::info!(
        baseline_x = baseline.x,
        baseline_y = baseline.y,
        samples = baseline.sample_count,
        "Replay calibration window closed"
    );
    handle.start_monitoring().await?;
    Ok(())
}

/// 驱动器提前退出后，在交还的引擎上把会话补完
fn conclude<C: Clock>(engine: &mut ProctorEngine<C>) -> Result<SessionReport, EngineError> {
    tracing::info!(phase = %engine.phase(), "Concluding interrupted replay session");
    match engine.phase() {
        EnginePhase::Stopped => {
            return engine.report().cloned().ok_or(EngineError::NotMonitoring);
        }
        EnginePhase::Calibrating => {
            engine.finish_calibration()?;
        }
        _ => {}
    }
    if engine.phase() != EnginePhase::Monitoring {
        engine.start_monitoring()?;
    }
    engine.stop_monitoring()
}
