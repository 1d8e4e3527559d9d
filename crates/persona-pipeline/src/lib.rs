//! persona-pipeline — the pipeline lifecycle runner and the concrete
//! face identification pipeline built on top of it.
//!
//! The [`Runner`] owns the frame loop and the lifecycle state machine;
//! a [`FramePipeline`] implementer supplies the per-frame work.
//! [`FaceIdentifier`] is the shipped implementation: detection →
//! landmarks → alignment → embedding → gallery match.

pub mod face;
pub mod fps;
pub mod gallery_build;
pub mod overlay;
pub mod runner;
pub mod view;

pub use face::{FaceIdentifier, ModelPaths};
pub use overlay::{BoxAnnotation, OverlayPlan};
pub use runner::{
    FrameOutput, FramePipeline, LoopSignal, PipelineError, RunConfig, RunReport, RunState, Runner,
    RunnerError, StopReason,
};
