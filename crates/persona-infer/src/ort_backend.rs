//! ONNX Runtime backend — one session and one worker thread per stage.
//!
//! The worker owns its session and answers the stage's channels for as
//! long as the gateway holds the handle; dropping the handle closes the
//! input channel and winds the worker down.

use crate::backend::{BackendError, InferenceBackend, StageFault, StageHandle, StageSpec};
use crate::tensor::NamedTensor;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use std::sync::mpsc;

pub struct OrtBackend {
    intra_threads: usize,
}

impl OrtBackend {
    pub fn new() -> Self {
        Self { intra_threads: 2 }
    }
}

impl Default for OrtBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InferenceBackend for OrtBackend {
    fn open_stage(&mut self, spec: &StageSpec) -> Result<StageHandle, BackendError> {
        if !spec.model_path.exists() {
            return Err(BackendError::ModelNotFound(
                spec.model_path.display().to_string(),
            ));
        }

        let mut session =
            build_session(&spec.model_path, self.intra_threads).map_err(|e| {
                BackendError::Session {
                    stage: spec.name.clone(),
                    message: e.to_string(),
                }
            })?;

        tracing::info!(
            stage = %spec.name,
            path = %spec.model_path.display(),
            inputs = ?session.inputs().iter().map(|i| i.name().to_string()).collect::<Vec<_>>(),
            outputs = ?session.outputs().iter().map(|o| o.name().to_string()).collect::<Vec<_>>(),
            "stage session loaded"
        );

        let (in_tx, in_rx) = mpsc::channel::<NamedTensor>();
        let (out_tx, out_rx) = mpsc::channel::<Result<Vec<f32>, StageFault>>();
        let stage = spec.name.clone();

        std::thread::Builder::new()
            .name(format!("{}-stage", spec.name))
            .spawn(move || {
                while let Ok(request) = in_rx.recv() {
                    let result =
                        run_inference(&mut session, &request).map_err(|e| StageFault(e.to_string()));
                    if out_tx.send(result).is_err() {
                        break; // gateway dropped
                    }
                }
                tracing::debug!(stage = %stage, "stage worker exiting");
            })
            .map_err(|e| BackendError::Session {
                stage: spec.name.clone(),
                message: format!("worker spawn: {e}"),
            })?;

        Ok(StageHandle::from_channels(in_tx, out_rx))
    }
}

fn build_session(path: &Path, intra_threads: usize) -> Result<Session, ort::Error> {
    Session::builder()?
        .with_intra_threads(intra_threads)?
        .commit_from_file(path)
}

/// One blocking round trip through the session. The input layer name is
/// logged; binding is positional since every stage model here has
/// exactly one input.
fn run_inference(session: &mut Session, request: &NamedTensor) -> Result<Vec<f32>, ort::Error> {
    tracing::trace!(layer = %request.name, "running stage inference");
    let outputs = session.run(ort::inputs![TensorRef::from_array_view(request.data.view())?])?;
    let (_, raw) = outputs[0].try_extract_tensor::<f32>()?;
    Ok(raw.to_vec())
}
