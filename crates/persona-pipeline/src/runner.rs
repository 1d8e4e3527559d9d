//! Pipeline lifecycle: state machine and per-frame dispatch loop.
//!
//! The runner is composed over any [`FramePipeline`] implementer; the
//! hooks replace inheritance. Cancellation is a [`LoopSignal`] return
//! value checked at the top of each iteration and after the debug
//! present step — never mid-frame.

use crate::fps::FpsCounter;
use crate::gallery_build::GalleryError;
use crate::overlay::OverlayPlan;
use crate::view::{DebugView, ViewError};
use persona_infer::{BackendError, GatewayError, InferenceBackend};
use persona_source::{open_source, Frame, FrameSource, SourceError, SourceSelect};
use thiserror::Error;

const WINDOW_TITLE: &str = "persona";

/// Cooperative cancellation, returned from the per-frame hook and the
/// debug presenter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopSignal {
    #[default]
    Continue,
    Stop,
}

/// Lifecycle states. The source handle only exists between
/// `DeviceStarted` and `Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Constructing,
    PipelineBuilt,
    DeviceStarted,
    Running,
    Stopped,
}

/// Why the loop ended. None of these are errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// File source exhausted.
    EndOfStream,
    /// Quit key pressed in the debug view.
    UserInterrupt,
    /// The pipeline's per-frame hook asked to stop.
    PipelineStop,
    /// The device reported a transient condition during startup; the
    /// run shut down before processing any frame.
    StartupAborted,
}

#[derive(Debug)]
pub struct RunReport {
    pub frames: u64,
    pub fps: f64,
    pub reason: StopReason,
}

/// Failures surfaced by pipeline hooks. Per-face degradation happens
/// inside `on_frame`; an error escaping a hook is treated as fatal to
/// the run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Build(#[from] BackendError),
    #[error(transparent)]
    Stage(#[from] crate::face::FaceStageError),
    #[error(transparent)]
    Gallery(#[from] GalleryError),
    #[error("stage graph not built")]
    NotBuilt,
}

impl From<GatewayError> for PipelineError {
    fn from(e: GatewayError) -> Self {
        PipelineError::Stage(e.into())
    }
}

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("pipeline construction failed: {0}")]
    Build(PipelineError),
    #[error("device not found: {0}")]
    DeviceNotFound(String),
    #[error("frame source failed: {0}")]
    Source(#[from] SourceError),
    #[error("startup hook failed: {0}")]
    Start(PipelineError),
    #[error("frame loop failed: {0}")]
    Frame(PipelineError),
    #[error("debug view failed: {0}")]
    View(#[from] ViewError),
}

/// What the per-frame hook hands back to the loop driver.
#[derive(Debug, Default)]
pub struct FrameOutput {
    pub overlay: OverlayPlan,
    pub signal: LoopSignal,
}

/// Extension points for a concrete multi-stage pipeline.
pub trait FramePipeline {
    /// Wire the stage graph. Failure is fatal and reported before any
    /// device is touched.
    fn build_stages(&mut self, backend: &mut dyn InferenceBackend) -> Result<(), PipelineError>;

    /// Runs once after the source is acquired, before the first frame.
    fn on_start(&mut self) -> Result<(), PipelineError> {
        Ok(())
    }

    /// Process one frame. Per-face failures are handled inside; an
    /// error escaping this hook stops the loop.
    fn on_frame(&mut self, frame: &Frame) -> Result<FrameOutput, PipelineError>;

    /// Runs once on the way to `Stopped`, on every exit path.
    fn on_stop(&mut self) {}
}

/// Run settings, threaded explicitly to every consumer.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub source: SourceSelect,
    pub debug: bool,
}

/// Owns the per-frame loop, the throughput counter, and the debug view
/// for one run of a pipeline.
pub struct Runner {
    config: RunConfig,
    state: RunState,
    fps: FpsCounter,
}

impl Runner {
    pub fn new(config: RunConfig) -> Self {
        Self {
            config,
            state: RunState::Constructing,
            fps: FpsCounter::new(),
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Full lifecycle: build the stage graph, acquire the configured
    /// source, drive the loop until a stop condition.
    pub fn run(
        &mut self,
        backend: &mut dyn InferenceBackend,
        pipeline: &mut dyn FramePipeline,
    ) -> Result<RunReport, RunnerError> {
        self.build(backend, pipeline)?;

        let source = match open_source(&self.config.source) {
            Ok(source) => source,
            Err(SourceError::NotFound(device)) => {
                return Err(RunnerError::DeviceNotFound(device));
            }
            Err(SourceError::Busy(device)) => {
                tracing::warn!(device = %device, "source busy; aborting startup");
                self.state = RunState::Stopped;
                return Ok(RunReport {
                    frames: 0,
                    fps: 0.0,
                    reason: StopReason::StartupAborted,
                });
            }
            Err(e) => return Err(RunnerError::Source(e)),
        };

        self.drive(source, pipeline)
    }

    /// Same lifecycle over an already-open source. Used by embedders
    /// and tests that bring their own frame sequence.
    pub fn run_with_source(
        &mut self,
        backend: &mut dyn InferenceBackend,
        pipeline: &mut dyn FramePipeline,
        source: Box<dyn FrameSource>,
    ) -> Result<RunReport, RunnerError> {
        self.build(backend, pipeline)?;
        self.drive(source, pipeline)
    }

    fn build(
        &mut self,
        backend: &mut dyn InferenceBackend,
        pipeline: &mut dyn FramePipeline,
    ) -> Result<(), RunnerError> {
        tracing::info!("building pipeline stages");
        pipeline.build_stages(backend).map_err(RunnerError::Build)?;
        self.state = RunState::PipelineBuilt;
        Ok(())
    }

    fn drive(
        &mut self,
        mut source: Box<dyn FrameSource>,
        pipeline: &mut dyn FramePipeline,
    ) -> Result<RunReport, RunnerError> {
        self.state = RunState::DeviceStarted;
        tracing::info!("frame source acquired");

        let outcome = self.start_and_loop(source.as_mut(), pipeline);

        self.state = RunState::Stopped;
        pipeline.on_stop();
        drop(source); // released exactly once, on every exit path

        let reason = outcome?;
        let report = RunReport {
            frames: self.fps.frames(),
            fps: self.fps.fps(),
            reason,
        };
        tracing::info!(
            frames = report.frames,
            fps = format_args!("{:.2}", report.fps),
            reason = ?report.reason,
            "run stopped"
        );
        Ok(report)
    }

    /// Startup hook, debug view, then the loop. The caller transitions
    /// to `Stopped` and runs `on_stop` whatever happens in here.
    fn start_and_loop(
        &mut self,
        source: &mut dyn FrameSource,
        pipeline: &mut dyn FramePipeline,
    ) -> Result<StopReason, RunnerError> {
        pipeline.on_start().map_err(RunnerError::Start)?;

        let view = if self.config.debug {
            Some(DebugView::open(WINDOW_TITLE)?)
        } else {
            None
        };

        self.state = RunState::Running;
        self.fps.start();
        self.frame_loop(source, pipeline, view.as_ref())
    }

    fn frame_loop(
        &mut self,
        source: &mut dyn FrameSource,
        pipeline: &mut dyn FramePipeline,
        view: Option<&DebugView>,
    ) -> Result<StopReason, RunnerError> {
        loop {
            let frame = match source.next_frame()? {
                Some(frame) => frame,
                None => return Ok(StopReason::EndOfStream),
            };

            let output = pipeline.on_frame(&frame).map_err(RunnerError::Frame)?;

            if let Some(view) = view {
                if view.present(&frame, &output.overlay, self.fps.fps())? == LoopSignal::Stop {
                    return Ok(StopReason::UserInterrupt);
                }
            }

            if output.signal == LoopSignal::Stop {
                return Ok(StopReason::PipelineStop);
            }

            self.fps.tick();
        }
    }
}
