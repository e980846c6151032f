//! Fixed-cadence capture, tracking and dispatch worker.
//!
//! A [`CaptureLoop`] owns one background worker thread. Each tick reads a
//! frame, runs the vision adapter, feeds the [`GestureSession`] and hands
//! the resulting commands to the dispatcher. Ticks never overlap; a tick
//! that overruns the period makes the worker skip to the next scheduled
//! tick rather than queue a backlog.
//!
//! The UI side only ever reads: the latest [`FrameReport`] through a
//! [`LatestSlot`], and calibration outcomes and camera faults through
//! channels. Calibration itself is requested with a one-shot flag consumed
//! at the start of the next tick that has a frame.
//!
//! A camera that reports itself closed, or that yields nothing for
//! [`MAX_CONSECUTIVE_READ_FAILURES`] ticks in a row, ends the worker: the
//! fault is published, the camera released, and `start` may be retried.

use crate::{
    config::Config,
    constants::{CALIBRATION_EVENT_CAPACITY, CAMERA_FAULT_CAPACITY, MAX_CONSECUTIVE_READ_FAILURES},
    dispatcher::{ActionCommand, ActionDispatcher},
    error::{Error, Result},
    geometry::Resolution,
    gesture::GestureState,
    hand_pose::HandPose,
    session::{CalibrationOutcome, CalibrationRequest, GestureSession},
    vision::{FrameSource, VisionAdapter},
};
use crossbeam_channel::{bounded, select, tick, Receiver, Sender, TryRecvError};
use log::{debug, error, info, trace, warn};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Single-writer/single-reader "latest value" handoff.
///
/// The lock only guards a pointer swap; readers get an `Arc` and never hold
/// the lock while using the value.
#[derive(Debug)]
pub struct LatestSlot<T> {
    inner: Mutex<Option<Arc<T>>>,
}

impl<T> Default for LatestSlot<T> {
    fn default() -> Self {
        Self {
            inner: Mutex::new(None),
        }
    }
}

impl<T> LatestSlot<T> {
    /// Create an empty slot
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored value
    pub fn publish(&self, value: T) {
        let value = Arc::new(value);
        *lock(&self.inner) = Some(value);
    }

    /// Most recently published value
    #[must_use]
    pub fn latest(&self) -> Option<Arc<T>> {
        lock(&self.inner).clone()
    }
}

/// Take a lock even if a previous holder panicked
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Snapshot published after every processed tick
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    /// Tick counter since the loop started
    pub tick: u64,
    /// Gesture state after this tick
    pub state: GestureState,
    /// Pose seen this tick
    pub pose: Option<HandPose>,
    /// Commands dispatched this tick
    pub commands: Vec<ActionCommand>,
    /// Whether a calibration reference is in effect
    pub calibrated: bool,
    /// Active segmentation settings
    pub hsv_summary: String,
    /// Time spent processing the tick
    pub processing_time: Duration,
}

/// State shared between the handle and the worker
#[derive(Debug, Default)]
struct Shared {
    calibrate: AtomicBool,
    ticks: AtomicU64,
    latest: LatestSlot<FrameReport>,
}

/// Components driven by the worker
struct Pipeline<S, V, D> {
    source: S,
    vision: V,
    dispatcher: D,
}

/// Handle to one worker thread. The stop flag belongs to this worker alone,
/// so a later `start` never revives a worker that was told to stop.
struct Worker {
    handle: JoinHandle<()>,
    stop: Arc<AtomicBool>,
    stop_tx: Sender<()>,
    done_rx: Receiver<()>,
}

impl Worker {
    fn join(self) {
        if self.handle.join().is_err() {
            error!("Capture worker panicked during shutdown");
        }
    }
}

/// Periodic capture → vision → gesture → dispatch driver
pub struct CaptureLoop<S, V, D>
where
    S: FrameSource + 'static,
    V: VisionAdapter<Frame = S::Frame> + 'static,
    D: ActionDispatcher + 'static,
{
    config: Config,
    pipeline: Arc<Mutex<Pipeline<S, V, D>>>,
    shared: Arc<Shared>,
    calibration_tx: Sender<CalibrationOutcome>,
    calibration_rx: Receiver<CalibrationOutcome>,
    fault_tx: Sender<String>,
    fault_rx: Receiver<String>,
    worker: Option<Worker>,
    /// Worker that outlived its stop timeout while holding the pipeline
    lingering: Option<Worker>,
}

impl<S, V, D> CaptureLoop<S, V, D>
where
    S: FrameSource + 'static,
    V: VisionAdapter<Frame = S::Frame> + 'static,
    D: ActionDispatcher + 'static,
{
    /// Create an idle loop
    pub fn new(config: Config, source: S, vision: V, dispatcher: D) -> Self {
        let (calibration_tx, calibration_rx) = bounded(CALIBRATION_EVENT_CAPACITY);
        let (fault_tx, fault_rx) = bounded(CAMERA_FAULT_CAPACITY);
        Self {
            config,
            pipeline: Arc::new(Mutex::new(Pipeline {
                source,
                vision,
                dispatcher,
            })),
            shared: Arc::new(Shared::default()),
            calibration_tx,
            calibration_rx,
            fault_tx,
            fault_rx,
            worker: None,
            lingering: None,
        }
    }

    /// Open the camera and start ticking. A no-op while already running.
    ///
    /// A worker that stopped on its own after losing the camera is reaped
    /// here, so `start` doubles as the retry after a camera fault.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CameraUnavailable`] when the camera cannot be opened;
    /// the loop then stays idle until `start` is retried.
    pub fn start(&mut self) -> Result<()> {
        if self.is_running() {
            debug!("Capture loop already running");
            return Ok(());
        }
        if let Some(finished) = self.worker.take() {
            debug!("Reaping capture worker that stopped on its own");
            finished.join();
        }
        if let Some(lingering) = self.lingering.take() {
            info!("Waiting for the previous capture worker to finish its tick");
            lingering.join();
        }

        let request = {
            let mut pipeline = lock(&self.pipeline);
            pipeline.source.open().map_err(|e| match e {
                Error::CameraUnavailable(_) => e,
                other => Error::CameraUnavailable(other.to_string()),
            })?;
            let capture = &self.config.capture;
            CalibrationRequest {
                camera: pipeline
                    .source
                    .resolution()
                    .unwrap_or_else(|| Resolution::new(capture.frame_width, capture.frame_height)),
                screen: pipeline
                    .dispatcher
                    .screen_size()
                    .unwrap_or_else(|| self.config.screen.resolution()),
            }
        };

        let session = match GestureSession::new(&self.config, Instant::now()) {
            Ok(session) => session,
            Err(e) => {
                lock(&self.pipeline).source.release();
                return Err(e);
            }
        };

        while self.fault_rx.try_recv().is_ok() {}
        self.shared.ticks.store(0, Ordering::Release);
        let stop = Arc::new(AtomicBool::new(false));
        let (stop_tx, stop_rx) = bounded(1);
        let (done_tx, done_rx) = bounded(1);
        let context = WorkerContext {
            pipeline: Arc::clone(&self.pipeline),
            shared: Arc::clone(&self.shared),
            stop: Arc::clone(&stop),
            calibration_tx: self.calibration_tx.clone(),
            fault_tx: self.fault_tx.clone(),
            request,
            period: self.config.capture.frame_interval(),
        };

        let handle = thread::Builder::new()
            .name("capture-loop".to_string())
            .spawn(move || {
                context.run(session, &stop_rx);
                let _ = done_tx.send(());
            })
            .map_err(|e| {
                lock(&self.pipeline).source.release();
                Error::Io(e)
            })?;

        info!(
            "Capture loop started ({:?} period, camera {}x{}, screen {}x{})",
            self.config.capture.frame_interval(),
            request.camera.width,
            request.camera.height,
            request.screen.width,
            request.screen.height
        );
        self.worker = Some(Worker {
            handle,
            stop,
            stop_tx,
            done_rx,
        });
        Ok(())
    }

    /// Stop ticking, wait (bounded) for the in-flight tick and release the
    /// camera. A no-op when not running.
    pub fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };

        info!("Stopping capture loop");
        worker.stop.store(true, Ordering::Release);
        let _ = worker.stop_tx.try_send(());

        let timeout = self.config.capture.stop_timeout();
        match worker.done_rx.recv_timeout(timeout) {
            Ok(()) => {
                worker.join();
                info!("Capture loop stopped");
            }
            Err(_) if worker.handle.is_finished() => worker.join(),
            Err(_) => {
                if let Some(mut pipeline) = try_lock(&self.pipeline) {
                    pipeline.source.release();
                    warn!("Capture worker slow to exit after {:?}; camera released without it", timeout);
                } else {
                    warn!(
                        "Capture worker still busy after {:?}; it will release the camera when its tick completes",
                        timeout
                    );
                }
                self.lingering = Some(worker);
            }
        }
    }

    /// Whether the worker is ticking. Turns false on its own when the
    /// camera is lost.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|worker| !worker.handle.is_finished())
    }

    /// Ask for calibration on the next tick with a frame
    pub fn request_calibration(&self) {
        debug!("Calibration requested");
        self.shared.calibrate.store(true, Ordering::Release);
    }

    /// Whether a calibration request is still waiting for a tick
    #[must_use]
    pub fn calibration_pending(&self) -> bool {
        self.shared.calibrate.load(Ordering::Acquire)
    }

    /// Latest published frame report
    #[must_use]
    pub fn latest_report(&self) -> Option<Arc<FrameReport>> {
        self.shared.latest.latest()
    }

    /// Next calibration outcome, if one arrived
    #[must_use]
    pub fn try_calibration_outcome(&self) -> Option<CalibrationOutcome> {
        match self.calibration_rx.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Receiver of calibration outcomes, for `select!` in a UI loop
    #[must_use]
    pub fn calibration_outcomes(&self) -> Receiver<CalibrationOutcome> {
        self.calibration_rx.clone()
    }

    /// Reason the worker gave up on the camera, if it did
    #[must_use]
    pub fn try_camera_fault(&self) -> Option<String> {
        self.fault_rx.try_recv().ok()
    }

    /// Receiver of camera faults, for `select!` in a UI loop
    #[must_use]
    pub fn camera_faults(&self) -> Receiver<String> {
        self.fault_rx.clone()
    }

    /// Ticks that processed a frame since the last start
    #[must_use]
    pub fn processed_ticks(&self) -> u64 {
        self.shared.ticks.load(Ordering::Acquire)
    }
}

impl<S, V, D> Drop for CaptureLoop<S, V, D>
where
    S: FrameSource + 'static,
    V: VisionAdapter<Frame = S::Frame> + 'static,
    D: ActionDispatcher + 'static,
{
    fn drop(&mut self) {
        self.stop();
    }
}

/// Take a lock only if nobody holds it
fn try_lock<T>(mutex: &Mutex<T>) -> Option<MutexGuard<'_, T>> {
    match mutex.try_lock() {
        Ok(guard) => Some(guard),
        Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner()),
        Err(TryLockError::WouldBlock) => None,
    }
}

/// What a single tick did with the camera
enum TickOutcome {
    Processed,
    /// Empty or failed read, tolerated until it repeats too often
    Missed,
    /// The camera is gone for good
    Lost(String),
}

/// Everything the worker thread needs
struct WorkerContext<S, V, D> {
    pipeline: Arc<Mutex<Pipeline<S, V, D>>>,
    shared: Arc<Shared>,
    stop: Arc<AtomicBool>,
    calibration_tx: Sender<CalibrationOutcome>,
    fault_tx: Sender<String>,
    request: CalibrationRequest,
    period: Duration,
}

impl<S, V, D> WorkerContext<S, V, D>
where
    S: FrameSource,
    V: VisionAdapter<Frame = S::Frame>,
    D: ActionDispatcher,
{
    fn run(&self, mut session: GestureSession, stop_rx: &Receiver<()>) {
        let ticker = tick(self.period);
        let mut missed = 0u32;

        loop {
            select! {
                recv(stop_rx) -> _ => break,
                recv(ticker) -> _ => {}
            }
            if self.stop.load(Ordering::Acquire) {
                break;
            }

            let outcome = match catch_unwind(AssertUnwindSafe(|| self.tick(&mut session))) {
                Ok(outcome) => outcome,
                Err(_) => {
                    error!("Capture tick panicked; continuing with the next tick");
                    continue;
                }
            };
            let fault = match outcome {
                TickOutcome::Processed => {
                    missed = 0;
                    None
                }
                TickOutcome::Missed => {
                    missed += 1;
                    (missed >= MAX_CONSECUTIVE_READ_FAILURES)
                        .then(|| format!("no frame from the camera in {missed} consecutive ticks"))
                }
                TickOutcome::Lost(reason) => Some(reason),
            };
            if let Some(reason) = fault {
                if self.stop.load(Ordering::Acquire) {
                    break;
                }
                error!("Camera lost: {}; stopping capture", reason);
                if self.fault_tx.try_send(reason).is_err() {
                    warn!("Camera fault dropped, nobody is reading them");
                }
                break;
            }
        }

        let mut pipeline = lock(&self.pipeline);
        for command in session.dispose() {
            if let Err(e) = pipeline.dispatcher.dispatch(command) {
                warn!("Failed to dispatch {} on shutdown: {}", command.as_str(), e);
            }
        }
        pipeline.source.release();
    }

    fn tick(&self, session: &mut GestureSession) -> TickOutcome {
        let started = Instant::now();
        let mut pipeline = lock(&self.pipeline);

        let frame = match pipeline.source.read() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                trace!("No frame available this tick");
                return TickOutcome::Missed;
            }
            Err(Error::CameraUnavailable(reason)) => return TickOutcome::Lost(reason),
            Err(e) => {
                warn!("Frame acquisition failed: {}", e);
                return TickOutcome::Missed;
            }
        };

        let calibration = self
            .shared
            .calibrate
            .swap(false, Ordering::AcqRel)
            .then_some(self.request);

        let geometry = match pipeline.vision.analyze(&frame) {
            Ok(geometry) => geometry,
            Err(e) => {
                debug!("Vision failed on this frame: {}", e);
                None
            }
        };

        let outcome = session.process_frame(geometry.as_ref(), calibration, started);

        for command in &outcome.commands {
            if let Err(e) = pipeline.dispatcher.dispatch(*command) {
                warn!("Failed to dispatch {}: {}", command.as_str(), e);
            }
        }
        let hsv_summary = pipeline.vision.status();
        drop(pipeline);

        if let Some(calibration) = outcome.calibration {
            if self.calibration_tx.try_send(calibration).is_err() {
                warn!("Calibration outcome dropped, nobody is reading them");
            }
        }

        let tick = self.shared.ticks.fetch_add(1, Ordering::AcqRel) + 1;
        let processing_time = started.elapsed();
        if processing_time > self.period {
            debug!("Tick {} took {:?}, longer than the {:?} period", tick, processing_time, self.period);
        }

        self.shared.latest.publish(FrameReport {
            tick,
            state: outcome.state,
            pose: outcome.pose,
            commands: outcome.commands,
            calibrated: session.calibration().is_some(),
            hsv_summary,
            processing_time,
        });
        TickOutcome::Processed
    }
}
