//! 帧驱动器
//!
//! 引擎只在一个任务上运行，帧、命令、计时器推进由同一个 `select!` 循环串行处理，
//! 计时器触发与帧分析不会交错。
//!
//! 帧通道容量为 1：上一帧尚未被取走时新帧直接丢弃并计数，不排队。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_stream::wrappers::UnboundedReceiverStream;
use uuid::Uuid;

use crate::error::EngineError;
use crate::proctor::calibration::Baseline;
use crate::proctor::clock::Clock;
use crate::proctor::engine::{ProctorEngine, StatsSnapshot};
use crate::proctor::report::SessionReport;
use crate::proctor::types::{LandmarkFrame, ViolationEvent};

const COMMAND_BUFFER: usize = 8;

/// 计时器推进的最小间隔，`tokio::time::interval` 不接受零
const MIN_TICK: Duration = Duration::from_millis(1);

pub enum DriverCommand {
    BeginCalibration(oneshot::Sender<Result<(), EngineError>>),
    FinishCalibration(oneshot::Sender<Result<Baseline, EngineError>>),
    StartMonitoring(oneshot::Sender<Result<Uuid, EngineError>>),
    StopMonitoring(oneshot::Sender<Result<SessionReport, EngineError>>),
    Snapshot(oneshot::Sender<StatsSnapshot>),
}

/// 帧生产方持有的发送端
#[derive(Clone)]
pub struct FrameSender {
    tx: mpsc::Sender<LandmarkFrame>,
    dropped: Arc<AtomicU64>,
}

impl FrameSender {
    /// 投递一帧，驱动器仍在处理上一帧时丢弃并返回 `false`
    pub fn offer(&self, frame: LandmarkFrame) -> bool {
        match self.tx.try_send(frame) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::debug!(dropped, "Frame dropped, driver busy");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!("Frame offered after driver shutdown");
                false
            }
        }
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// 生命周期命令的异步入口，驱动器退出后返回 `EngineError::DriverClosed`
#[derive(Clone)]
pub struct DriverHandle {
    commands: mpsc::Sender<DriverCommand>,
}

impl DriverHandle {
    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> DriverCommand,
    ) -> Result<T, EngineError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(make(tx))
            .await
            .map_err(|_| EngineError::DriverClosed)?;
        rx.await.map_err(|_| EngineError::DriverClosed)
    }

    pub async fn begin_calibration(&self) -> Result<(), EngineError> {
        self.request(DriverCommand::BeginCalibration).await?
    }

    pub async fn finish_calibration(&self) -> Result<Baseline, EngineError> {
        self.request(DriverCommand::FinishCalibration).await?
    }

    pub async fn start_monitoring(&self) -> Result<Uuid, EngineError> {
        self.request(DriverCommand::StartMonitoring).await?
    }

    pub async fn stop_monitoring(&self) -> Result<SessionReport, EngineError> {
        self.request(DriverCommand::StopMonitoring).await?
    }

    pub async fn snapshot(&self) -> Result<StatsSnapshot, EngineError> {
        self.request(DriverCommand::Snapshot).await
    }
}

pub struct FrameDriver<C: Clock> {
    engine: ProctorEngine<C>,
    frames_rx: mpsc::Receiver<LandmarkFrame>,
    commands_rx: mpsc::Receiver<DriverCommand>,
    shutdown_rx: broadcast::Receiver<()>,
    tick: Duration,
}

/// `FrameDriver::spawn` 的产物
pub struct SpawnedDriver<C: Clock> {
    pub frames: FrameSender,
    pub handle: DriverHandle,
    /// 按发出顺序的违规流，驱动器退出后结束
    pub violations: UnboundedReceiverStream<ViolationEvent>,
    /// 驱动器退出后交还引擎，可继续查询已停止的会话
    pub task: JoinHandle<ProctorEngine<C>>,
}

impl<C: Clock + 'static> FrameDriver<C> {
    pub fn spawn(
        mut engine: ProctorEngine<C>,
        tick: Duration,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> SpawnedDriver<C> {
        let (frames_tx, frames_rx) = mpsc::channel(1);
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_BUFFER);
        let (violations_tx, violations_rx) = mpsc::unbounded_channel();
        engine.set_sink(violations_tx);

        let driver = FrameDriver {
            engine,
            frames_rx,
            commands_rx,
            shutdown_rx,
            tick: tick.max(MIN_TICK),
        };
        let task = tokio::spawn(driver.run());

        SpawnedDriver {
            frames: FrameSender {
                tx: frames_tx,
                dropped: Arc::new(AtomicU64::new(0)),
            },
            handle: DriverHandle {
                commands: commands_tx,
            },
            violations: UnboundedReceiverStream::new(violations_rx),
            task,
        }
    }

    async fn run(mut self) -> ProctorEngine<C> {
        let mut interval = tokio::time::interval(self.tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut frames_open = true;

        tracing::info!(tick_ms = self.tick.as_millis() as u64, "Frame driver started");
        loop {
            tokio::select! {
                biased;
                _ = self.shutdown_rx.recv() => {
                    tracing::info!("Frame driver received shutdown");
                    break;
                }
                frame = self.frames_rx.recv(), if frames_open => match frame {
                    Some(frame) => {
                        self.engine.process_frame(&frame);
                    }
                    None => frames_open = false,
                },
                command = self.commands_rx.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },
                _ = interval.tick() => {
                    self.engine.advance();
                }
            }
        }

        self.engine.clear_sink();
        tracing::info!("Frame driver stopped");
        self.engine
    }

    fn handle(&mut self, command: DriverCommand) {
        // 请求方已放弃等待时回复失败无妨
        match command {
            DriverCommand::BeginCalibration(reply) => {
                let _ = reply.send(self.engine.begin_calibration());
            }
            DriverCommand::FinishCalibration(reply) => {
                let _ = reply.send(self.engine.finish_calibration());
            }
            DriverCommand::StartMonitoring(reply) => {
                let _ = reply.send(self.engine.start_monitoring());
            }
            DriverCommand::StopMonitoring(reply) => {
                let _ = reply.send(self.engine.stop_monitoring());
            }
            DriverCommand::Snapshot(reply) => {
                let _ = reply.send(self.engine.snapshot());
            }
        }
    }
}
