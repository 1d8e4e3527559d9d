//! The boundary to the opaque inference engine.
//!
//! A backend loads one model artifact per named stage and hands back the
//! stage's open input/output channel pair. Everything past the channels
//! (threads, sessions, devices) is the backend's business.

use crate::tensor::NamedTensor;
use std::path::PathBuf;
use std::sync::mpsc::{Receiver, SendError, Sender};
use thiserror::Error;

/// What a backend needs to bring one named stage up.
#[derive(Debug, Clone)]
pub struct StageSpec {
    /// Stage name ("face", "landmark", "reid"); also names the worker.
    pub name: String,
    /// Inference artifact for this stage.
    pub model_path: PathBuf,
}

/// Worker-side inference failure, reported through the output channel.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct StageFault(pub String);

/// The open channel pair for one stage — all the state the gateway
/// holds besides its name and timeout.
#[derive(Debug)]
pub struct StageHandle {
    input: Sender<NamedTensor>,
    output: Receiver<Result<Vec<f32>, StageFault>>,
}

impl StageHandle {
    pub fn from_channels(
        input: Sender<NamedTensor>,
        output: Receiver<Result<Vec<f32>, StageFault>>,
    ) -> Self {
        Self { input, output }
    }

    pub(crate) fn send(&self, tensor: NamedTensor) -> Result<(), SendError<NamedTensor>> {
        self.input.send(tensor)
    }

    pub(crate) fn output(&self) -> &Receiver<Result<Vec<f32>, StageFault>> {
        &self.output
    }
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    #[error("stage {stage}: session init failed: {message}")]
    Session { stage: String, message: String },
}

/// Load an artifact, get back the submit/poll surface for that stage.
pub trait InferenceBackend {
    fn open_stage(&mut self, spec: &StageSpec) -> Result<StageHandle, BackendError>;
}
