//! persona-infer — synchronous request/response access to the opaque
//! inference engine.
//!
//! Each named stage ("face", "landmark", "reid") is a channel pair
//! obtained from an [`InferenceBackend`]; the [`StageGateway`] blocks on
//! that pair with a fixed wall-clock timeout. The bundled
//! [`OrtBackend`] answers the channels from one ONNX Runtime session
//! per stage.

pub mod backend;
pub mod gateway;
pub mod ort_backend;
pub mod tensor;

pub use backend::{BackendError, InferenceBackend, StageFault, StageHandle, StageSpec};
pub use gateway::{GatewayError, StageGateway, DEFAULT_STAGE_TIMEOUT};
pub use ort_backend::OrtBackend;
pub use tensor::{to_planar, InputTensor, NamedTensor};
