//! Face identification pipeline: detection → landmarks → alignment →
//! embedding → gallery match, per frame, with no cross-frame state.

use crate::gallery_build;
use crate::overlay::{BoxAnnotation, OverlayPlan};
use crate::runner::{FrameOutput, FramePipeline, LoopSignal, PipelineError};
use persona_core::gallery::{Gallery, Identity};
use persona_core::landmarks::{self, LandmarkError};
use persona_core::{alignment, detect, DetectionBox, Embedding, LandmarkSet};
use persona_infer::{
    to_planar, GatewayError, InferenceBackend, StageGateway, StageSpec,
};
use persona_source::Frame;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Detector input edge (square).
pub const FACE_INPUT_SIZE: u32 = 300;
/// Landmark-regression input edge.
pub const LANDMARK_INPUT_SIZE: u32 = 48;
/// Input layer name shared by all three stage models.
const INPUT_LAYER: &str = "data";

/// Model artifacts for the three stages.
#[derive(Debug, Clone)]
pub struct ModelPaths {
    pub face: PathBuf,
    pub landmark: PathBuf,
    pub reid: PathBuf,
}

/// Failure of one per-face stage call.
#[derive(Debug, Error)]
pub enum FaceStageError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Landmarks(#[from] LandmarkError),
}

impl FaceStageError {
    /// A recoverable failure costs one face (or one frame for
    /// detection); anything else ends the run.
    pub fn is_recoverable(&self) -> bool {
        match self {
            FaceStageError::Gateway(e) => e.is_recoverable(),
            FaceStageError::Landmarks(_) => true,
        }
    }
}

/// The three wired stage gateways and the per-stage operations over
/// them. Shared by the frame loop and the gallery builder.
pub(crate) struct FaceStages {
    pub(crate) face: StageGateway,
    pub(crate) landmark: StageGateway,
    pub(crate) reid: StageGateway,
}

impl FaceStages {
    /// Detect faces in a frame. Zero boxes is a valid, non-error result.
    pub(crate) fn detect(&self, frame: &Frame) -> Result<Vec<DetectionBox>, FaceStageError> {
        let resized = frame.resize(FACE_INPUT_SIZE, FACE_INPUT_SIZE);
        let input = to_planar(
            &resized.data,
            FACE_INPUT_SIZE as usize,
            FACE_INPUT_SIZE as usize,
        );
        let raw = self.face.submit(INPUT_LAYER, input)?;
        Ok(detect::parse_detections(&raw, frame.width, frame.height))
    }

    /// Regress the five landmarks for one detected face.
    pub(crate) fn landmarks(
        &self,
        frame: &Frame,
        bbox: &DetectionBox,
    ) -> Result<LandmarkSet, FaceStageError> {
        let crop = frame.crop(bbox.x_min, bbox.y_min, bbox.x_max, bbox.y_max);
        let resized = crop.resize(LANDMARK_INPUT_SIZE, LANDMARK_INPUT_SIZE);
        let input = to_planar(
            &resized.data,
            LANDMARK_INPUT_SIZE as usize,
            LANDMARK_INPUT_SIZE as usize,
        );
        let raw = self.landmark.submit(INPUT_LAYER, input)?;
        Ok(landmarks::parse_landmarks(&raw, crop.width, crop.height, bbox)?)
    }

    /// Align the face to the canonical pose and extract its embedding.
    pub(crate) fn embed(
        &self,
        frame: &Frame,
        landmarks: &LandmarkSet,
    ) -> Result<Embedding, FaceStageError> {
        let aligned = alignment::align_face(&frame.data, frame.width, frame.height, landmarks);
        let input = to_planar(&aligned, alignment::ALIGNED_SIZE, alignment::ALIGNED_SIZE);
        let raw = self.reid.submit(INPUT_LAYER, input)?;
        Ok(Embedding { values: raw })
    }
}

/// Concrete pipeline: per frame, detect every face and try to put a
/// name on each one against the reference gallery.
pub struct FaceIdentifier {
    models: ModelPaths,
    gallery_dir: PathBuf,
    stage_timeout: Duration,
    stages: Option<FaceStages>,
    gallery: Gallery,
}

impl FaceIdentifier {
    pub fn new(models: ModelPaths, gallery_dir: PathBuf, stage_timeout: Duration) -> Self {
        Self {
            models,
            gallery_dir,
            stage_timeout,
            stages: None,
            gallery: Gallery::new(),
        }
    }

    fn open_gateway(
        &self,
        backend: &mut dyn InferenceBackend,
        name: &str,
        model_path: &PathBuf,
    ) -> Result<StageGateway, PipelineError> {
        let handle = backend.open_stage(&StageSpec {
            name: name.to_string(),
            model_path: model_path.clone(),
        })?;
        Ok(StageGateway::new(name, handle, self.stage_timeout))
    }

    fn annotate(&self, embedding: &Embedding) -> String {
        let matched = self.gallery.identify(embedding);
        match matched.identity {
            Identity::Known(label) => format!("{label} ({:.2})", matched.distance),
            Identity::Unknown => "unknown".to_string(),
        }
    }
}

impl FramePipeline for FaceIdentifier {
    fn build_stages(&mut self, backend: &mut dyn InferenceBackend) -> Result<(), PipelineError> {
        self.stages = Some(FaceStages {
            face: self.open_gateway(backend, "face", &self.models.face)?,
            landmark: self.open_gateway(backend, "landmark", &self.models.landmark)?,
            reid: self.open_gateway(backend, "reid", &self.models.reid)?,
        });
        Ok(())
    }

    fn on_start(&mut self) -> Result<(), PipelineError> {
        let stages = self.stages.as_ref().ok_or(PipelineError::NotBuilt)?;
        self.gallery = gallery_build::build_gallery(&self.gallery_dir, stages)?;
        tracing::info!(
            identities = self.gallery.label_count(),
            entries = self.gallery.len(),
            "identity gallery ready"
        );
        Ok(())
    }

    fn on_frame(&mut self, frame: &Frame) -> Result<FrameOutput, PipelineError> {
        let stages = self.stages.as_ref().ok_or(PipelineError::NotBuilt)?;
        let mut plan = OverlayPlan::default();

        let boxes = match stages.detect(frame) {
            Ok(boxes) => boxes,
            Err(e) if e.is_recoverable() => {
                tracing::warn!(error = %e, "detection failed; skipping frame");
                return Ok(FrameOutput::default());
            }
            Err(e) => return Err(e.into()),
        };

        for bbox in boxes {
            let landmarks = match stages.landmarks(frame, &bbox) {
                Ok(set) => set,
                Err(e) if e.is_recoverable() => {
                    tracing::warn!(error = %e, "landmark stage failed; skipping face");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            plan.dots.extend(landmarks.points());

            let caption = match stages.embed(frame, &landmarks) {
                Ok(embedding) => Some(self.annotate(&embedding)),
                Err(e) if e.is_recoverable() => {
                    tracing::warn!(error = %e, "embedding stage failed; face left unlabelled");
                    None
                }
                Err(e) => return Err(e.into()),
            };

            plan.boxes.push(BoxAnnotation { bbox, caption });
        }

        Ok(FrameOutput {
            overlay: plan,
            signal: LoopSignal::Continue,
        })
    }

    fn on_stop(&mut self) {
        tracing::debug!("face pipeline stopped");
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use persona_infer::{NamedTensor, StageFault, StageGateway, StageHandle};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc::{self, Receiver};
    use std::sync::Arc;
    use std::time::Duration;

    /// A stage that answers every request with the same canned tensor
    /// and counts how often it was asked.
    pub(crate) fn scripted_stage(
        name: &str,
        reply: Vec<f32>,
        timeout: Duration,
    ) -> (StageGateway, Arc<AtomicUsize>) {
        let (in_tx, in_rx) = mpsc::channel::<NamedTensor>();
        let (out_tx, out_rx) = mpsc::channel::<Result<Vec<f32>, StageFault>>();
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&calls);
        std::thread::spawn(move || {
            while in_rx.recv().is_ok() {
                counter.fetch_add(1, Ordering::SeqCst);
                if out_tx.send(Ok(reply.clone())).is_err() {
                    break;
                }
            }
        });

        (
            StageGateway::new(name, StageHandle::from_channels(in_tx, out_rx), timeout),
            calls,
        )
    }

    /// Keeps a silent stage's far channel ends alive so the gateway
    /// times out instead of observing a disconnect.
    pub(crate) struct SilentStageGuard {
        _input: Receiver<NamedTensor>,
        _output: mpsc::Sender<Result<Vec<f32>, StageFault>>,
    }

    /// A stage that never answers.
    pub(crate) fn silent_stage(name: &str, timeout: Duration) -> (StageGateway, SilentStageGuard) {
        let (in_tx, in_rx) = mpsc::channel::<NamedTensor>();
        let (out_tx, out_rx) = mpsc::channel::<Result<Vec<f32>, StageFault>>();
        let gateway = StageGateway::new(name, StageHandle::from_channels(in_tx, out_rx), timeout);
        (
            gateway,
            SilentStageGuard {
                _input: in_rx,
                _output: out_tx,
            },
        )
    }

    /// One qualifying detection record plus the sentinel.
    pub(crate) fn detection_reply(
        confidence: f32,
        x_min: f32,
        y_min: f32,
        x_max: f32,
        y_max: f32,
    ) -> Vec<f32> {
        vec![0.0, 1.0, confidence, x_min, y_min, x_max, y_max, -1.0]
    }

    pub(crate) fn landmark_reply() -> Vec<f32> {
        vec![0.3, 0.35, 0.7, 0.35, 0.5, 0.55, 0.35, 0.75, 0.65, 0.75]
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use std::sync::atomic::Ordering;

    const TIMEOUT: Duration = Duration::from_millis(100);

    fn frame() -> Frame {
        Frame {
            data: vec![120; 200 * 200 * 3],
            width: 200,
            height: 200,
        }
    }

    fn identifier_with(stages: FaceStages, gallery: Gallery) -> FaceIdentifier {
        FaceIdentifier {
            models: ModelPaths {
                face: PathBuf::new(),
                landmark: PathBuf::new(),
                reid: PathBuf::new(),
            },
            gallery_dir: PathBuf::new(),
            stage_timeout: TIMEOUT,
            stages: Some(stages),
            gallery,
        }
    }

    #[test]
    fn no_qualifying_faces_skips_downstream_stages() {
        let (face, _) = scripted_stage("face", detection_reply(0.2, 0.1, 0.1, 0.5, 0.5), TIMEOUT);
        let (landmark, landmark_calls) = scripted_stage("landmark", landmark_reply(), TIMEOUT);
        let (reid, reid_calls) = scripted_stage("reid", vec![1.0; 256], TIMEOUT);

        let mut pipeline = identifier_with(
            FaceStages {
                face,
                landmark,
                reid,
            },
            Gallery::new(),
        );

        let output = pipeline.on_frame(&frame()).unwrap();
        assert!(output.overlay.is_empty());
        assert_eq!(output.signal, LoopSignal::Continue);
        assert_eq!(landmark_calls.load(Ordering::SeqCst), 0);
        assert_eq!(reid_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn detection_timeout_skips_the_frame_quietly() {
        let (face, _face_rx) = silent_stage("face", Duration::from_millis(30));
        let (landmark, landmark_calls) = scripted_stage("landmark", landmark_reply(), TIMEOUT);
        let (reid, _) = scripted_stage("reid", vec![1.0; 256], TIMEOUT);

        let mut pipeline = identifier_with(
            FaceStages {
                face,
                landmark,
                reid,
            },
            Gallery::new(),
        );

        let output = pipeline.on_frame(&frame()).unwrap();
        assert!(output.overlay.is_empty());
        assert_eq!(landmark_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn matched_face_is_annotated_with_its_label() {
        let (face, _) = scripted_stage("face", detection_reply(0.9, 0.25, 0.25, 0.75, 0.75), TIMEOUT);
        let (landmark, _) = scripted_stage("landmark", landmark_reply(), TIMEOUT);
        let embedding = vec![1.0, 0.0, 0.0, 0.0];
        let (reid, _) = scripted_stage("reid", embedding.clone(), TIMEOUT);

        let mut gallery = Gallery::new();
        gallery.push("alice", Embedding { values: embedding });

        let mut pipeline = identifier_with(
            FaceStages {
                face,
                landmark,
                reid,
            },
            gallery,
        );

        let output = pipeline.on_frame(&frame()).unwrap();
        assert_eq!(output.overlay.boxes.len(), 1);
        assert_eq!(output.overlay.dots.len(), 5);
        let caption = output.overlay.boxes[0].caption.as_deref().unwrap();
        assert!(caption.starts_with("alice"), "caption: {caption}");
    }

    #[test]
    fn unmatched_face_is_annotated_unknown() {
        let (face, _) = scripted_stage("face", detection_reply(0.9, 0.25, 0.25, 0.75, 0.75), TIMEOUT);
        let (landmark, _) = scripted_stage("landmark", landmark_reply(), TIMEOUT);
        let (reid, _) = scripted_stage("reid", vec![1.0, 0.0], TIMEOUT);

        let mut gallery = Gallery::new();
        gallery.push("alice", Embedding { values: vec![0.0, 1.0] });

        let mut pipeline = identifier_with(
            FaceStages {
                face,
                landmark,
                reid,
            },
            gallery,
        );

        let output = pipeline.on_frame(&frame()).unwrap();
        assert_eq!(
            output.overlay.boxes[0].caption.as_deref(),
            Some("unknown")
        );
    }

    #[test]
    fn landmark_timeout_skips_only_that_face() {
        let (face, _) = scripted_stage("face", detection_reply(0.9, 0.25, 0.25, 0.75, 0.75), TIMEOUT);
        let (landmark, _landmark_rx) = silent_stage("landmark", Duration::from_millis(30));
        let (reid, reid_calls) = scripted_stage("reid", vec![1.0; 256], TIMEOUT);

        let mut pipeline = identifier_with(
            FaceStages {
                face,
                landmark,
                reid,
            },
            Gallery::new(),
        );

        let output = pipeline.on_frame(&frame()).unwrap();
        // The face was dropped, but the frame itself succeeded.
        assert!(output.overlay.boxes.is_empty());
        assert_eq!(reid_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn embedding_timeout_leaves_face_unlabelled() {
        let (face, _) = scripted_stage("face", detection_reply(0.9, 0.25, 0.25, 0.75, 0.75), TIMEOUT);
        let (landmark, _) = scripted_stage("landmark", landmark_reply(), TIMEOUT);
        let (reid, _reid_rx) = silent_stage("reid", Duration::from_millis(30));

        let mut pipeline = identifier_with(
            FaceStages {
                face,
                landmark,
                reid,
            },
            Gallery::new(),
        );

        let output = pipeline.on_frame(&frame()).unwrap();
        assert_eq!(output.overlay.boxes.len(), 1);
        assert!(output.overlay.boxes[0].caption.is_none());
        assert_eq!(output.overlay.dots.len(), 5);
    }
}
