//! Blocking request/response wrapper around one named stage.

use crate::backend::StageHandle;
use crate::tensor::{InputTensor, NamedTensor};
use std::sync::mpsc::RecvTimeoutError;
use std::time::Duration;
use thiserror::Error;

/// Wall-clock budget for one submit/poll round trip.
pub const DEFAULT_STAGE_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("stage {stage}: no result within {timeout_ms} ms")]
    StageTimeout { stage: String, timeout_ms: u64 },
    #[error("stage {stage}: {message}")]
    Stage { stage: String, message: String },
    #[error("stage {stage}: channel closed")]
    Disconnected { stage: String },
}

impl GatewayError {
    /// Timeouts and worker faults are localized: the caller skips the
    /// current face (or frame) and carries on. A closed channel means
    /// the engine is gone for good.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, GatewayError::Disconnected { .. })
    }
}

/// One named stage, submit-then-poll, strictly synchronous.
pub struct StageGateway {
    name: String,
    handle: StageHandle,
    timeout: Duration,
}

impl StageGateway {
    pub fn new(name: impl Into<String>, handle: StageHandle, timeout: Duration) -> Self {
        Self {
            name: name.into(),
            handle,
            timeout,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Push one named input tensor and block until the stage answers or
    /// the timeout window elapses.
    pub fn submit(&self, input_name: &str, tensor: InputTensor) -> Result<Vec<f32>, GatewayError> {
        self.handle
            .send(NamedTensor {
                name: input_name.to_string(),
                data: tensor,
            })
            .map_err(|_| GatewayError::Disconnected {
                stage: self.name.clone(),
            })?;

        match self.handle.output().recv_timeout(self.timeout) {
            Ok(Ok(values)) => Ok(values),
            Ok(Err(fault)) => Err(GatewayError::Stage {
                stage: self.name.clone(),
                message: fault.to_string(),
            }),
            Err(RecvTimeoutError::Timeout) => Err(GatewayError::StageTimeout {
                stage: self.name.clone(),
                timeout_ms: self.timeout.as_millis() as u64,
            }),
            Err(RecvTimeoutError::Disconnected) => Err(GatewayError::Disconnected {
                stage: self.name.clone(),
            }),
        }
    }
}
