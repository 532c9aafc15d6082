/// Per-device collection orchestrator.
///
/// Owns the session state and the three loops: metrics every second,
/// screenshots every two, and the streaming log classifier. Each loop runs as
/// its own task under a shared CancellationToken; loops fail independently
/// and only a lost transport escalates, into the metrics loop's reconnect
/// cycle.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use perf_protocol::events::{Event, Sample};
use perf_protocol::{MONITOR_INTERVAL_MS, SCREENSHOT_INTERVAL_MS};

use crate::frames::FrameEngine;
use crate::gpu::GpuSampler;
use crate::network::NetworkTracker;
use crate::session::Session;
use crate::shell::{ShellChannel, ShellError};
use crate::{battery, cpu, foreground, logcat, meminfo, network, now_ms, screenshot};

/// Consecutive failed ticks tolerated before the metrics loop reconnects.
const RECONNECT_FAILURE_THRESHOLD: u32 = 3;

/// Failure count assigned on a lost transport: forces reconnect on the next tick.
const FORCE_RECONNECT_COUNT: u32 = 10;

/// Pause between reconnect attempts.
const RECONNECT_RETRY_DELAY: Duration = Duration::from_secs(2);

pub struct Collector<S: ShellChannel> {
    inner: Arc<CollectorInner<S>>,
}

// Manual impl: a derived Clone would demand S: Clone for no reason.
impl<S: ShellChannel> Clone for Collector<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct CollectorInner<S> {
    shell: S,
    session: Session,
    sink: mpsc::Sender<Event>,
    /// Per-device artifact directory (`<root>/<serial>`)
    screenshot_dir: PathBuf,
    /// URL prefix the server mounts artifacts under
    screenshot_mount: String,
    cancel: Mutex<CancellationToken>,
}

impl<S: ShellChannel> Collector<S> {
    pub fn new(
        serial: impl Into<String>,
        shell: S,
        sink: mpsc::Sender<Event>,
        screenshot_root: &Path,
        screenshot_mount: impl Into<String>,
    ) -> Self {
        let serial = serial.into();
        Self {
            inner: Arc::new(CollectorInner {
                shell,
                screenshot_dir: screenshot_root.join(&serial),
                session: Session::new(serial),
                sink,
                screenshot_mount: screenshot_mount.into(),
                cancel: Mutex::new(CancellationToken::new()),
            }),
        }
    }

    pub fn session(&self) -> &Session {
        &self.inner.session
    }

    pub fn is_running(&self) -> bool {
        self.inner.session.is_running()
    }

    /// Replace the target application. Picked up by the next metrics tick;
    /// the log classifier sees it on its next line.
    pub async fn set_target(&self, package: impl Into<String>) {
        self.inner.session.set_target(Some(package.into())).await;
    }

    /// Start the three loops. Idempotent: a running collector is untouched.
    /// A restart begins from a clean slate: PID set, layer cache, network
    /// baseline and failure counters all reset.
    pub async fn start(&self) {
        if self.inner.session.set_running(true) {
            return;
        }
        self.inner.session.clear_pids().await;

        let cancel = CancellationToken::new();
        *self.inner.cancel.lock().unwrap() = cancel.clone();

        info!(serial = %self.inner.session.serial(), "collection started");

        let this = self.clone();
        let c = cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = this.metrics_loop() => {}
                _ = c.cancelled() => {}
            }
        });

        let this = self.clone();
        let c = cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = this.screenshot_loop() => {}
                _ = c.cancelled() => {}
            }
        });

        let this = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = this.log_loop() => {}
                _ = cancel.cancelled() => {}
            }
        });
    }

    /// Stop all loops. Idempotent and race-safe: loops observe the flag at
    /// their wait boundaries and the token cancels pending I/O.
    pub fn stop(&self) {
        if !self.inner.session.set_running(false) {
            return;
        }
        self.inner.cancel.lock().unwrap().cancel();
        info!(serial = %self.inner.session.serial(), "collection stopped");
    }

    // ── metrics loop: 1 s cadence, reconnect supervision ──

    async fn metrics_loop(&self) {
        let serial = self.inner.session.serial().to_string();

        // Per-run sampler state. Living here (not on the collector) is what
        // guarantees a stop/start cycle carries nothing over.
        let mut frame_engine = FrameEngine::new();
        let mut gpu_sampler = GpuSampler::new();
        let mut network_tracker = NetworkTracker::new();
        let mut fail_count: u32 = 0;

        let mut interval = tokio::time::interval(Duration::from_millis(MONITOR_INTERVAL_MS));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            if !self.inner.session.is_running() {
                break;
            }

            if fail_count > RECONNECT_FAILURE_THRESHOLD {
                info!(serial = %serial, "attempting device reconnect");
                match self.inner.shell.reconnect().await {
                    Ok(()) => {
                        fail_count = 0;
                        info!(serial = %serial, "device reconnected");
                    }
                    Err(e) => {
                        debug!(serial = %serial, error = %e, "reconnect failed");
                        tokio::time::sleep(RECONNECT_RETRY_DELAY).await;
                        continue;
                    }
                }
            }

            match self
                .collect_once(&mut frame_engine, &mut gpu_sampler, &mut network_tracker)
                .await
            {
                Ok(sample) => {
                    fail_count = 0;
                    if self.inner.sink.send(Event::Monitor(sample)).await.is_err() {
                        break; // sink gone: session is over
                    }
                }
                Err(e) => {
                    fail_count += 1;
                    error!(serial = %serial, error = %e, count = fail_count, "metrics tick failed");
                    if e.is_transport_lost() {
                        fail_count = FORCE_RECONNECT_COUNT;
                    }
                }
            }
        }
    }

    /// Assemble one monitor sample. Individual samplers degrade to neutral
    /// values on their own; only a lost transport reaches this level.
    async fn collect_once(
        &self,
        frame_engine: &mut FrameEngine,
        gpu_sampler: &mut GpuSampler,
        network_tracker: &mut NetworkTracker,
    ) -> Result<Sample, ShellError> {
        let timestamp = now_ms();
        let shell = &self.inner.shell;
        let session = &self.inner.session;

        if session.target().await.is_none() {
            if let Some(package) = foreground::discover(shell).await? {
                session.set_target(Some(package)).await;
            }
        }
        let Some(package) = session.target().await else {
            return Ok(Sample::empty(timestamp, None));
        };

        let cpu = cpu::sample(shell, session, &package).await?;
        let memory_detail = meminfo::sample(shell, &package).await?;
        let frame_stats = frame_engine.tick(shell, &package).await?;
        let gpu = gpu_sampler.sample(shell).await?;
        let battery = battery::sample(shell).await?;
        let network = network::sample(shell, &package, network_tracker).await?;

        Ok(Sample {
            timestamp,
            package: Some(package),
            cpu,
            memory: memory_detail.total,
            memory_detail,
            fps: frame_stats.fps,
            jank: frame_stats.jank,
            stutter: frame_stats.stutter,
            gpu,
            battery,
            network,
        })
    }

    // ── screenshot loop: 2 s cadence, log-and-continue ──

    async fn screenshot_loop(&self) {
        let serial = self.inner.session.serial().to_string();

        if let Err(e) = tokio::fs::create_dir_all(&self.inner.screenshot_dir).await {
            error!(serial = %serial, error = %e, "cannot create screenshot directory");
            return;
        }

        let mut interval = tokio::time::interval(Duration::from_millis(SCREENSHOT_INTERVAL_MS));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            if !self.inner.session.is_running() {
                break;
            }

            match screenshot::capture_once(
                &self.inner.shell,
                &self.inner.screenshot_dir,
                &serial,
                &self.inner.screenshot_mount,
            )
            .await
            {
                Ok(event) => {
                    if self.inner.sink.send(Event::Screenshot(event)).await.is_err() {
                        break;
                    }
                }
                Err(e) => error!(serial = %serial, error = %e, "screenshot capture failed"),
            }
        }
    }

    // ── log loop: stream until EOF or cancellation ──

    async fn log_loop(&self) {
        if let Err(e) = logcat::run(&self.inner.shell, &self.inner.session, &self.inner.sink).await
        {
            error!(
                serial = %self.inner.session.serial(),
                error = %e,
                "log stream ended with error"
            );
        }
    }
}
