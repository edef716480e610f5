use thiserror::Error;

use tg_tensor::{Device, Shape};

#[derive(Error, Debug)]
pub enum OpError {
    #[error("{op}: invalid value '{value}' for parameter '{key}': {reason}")]
    Config {
        op: String,
        key: String,
        value: String,
        reason: String,
    },
    #[error("{op}: unknown parameter '{key}'")]
    UnknownParam { op: String, key: String },
    #[error("{op}: required parameter '{key}' was never set")]
    MissingParam { op: String, key: String },
    #[error("{op}: inconsistent shape for {role} '{name}': expected {expected}, got {got}")]
    ShapeInconsistency {
        op: String,
        role: String,
        name: String,
        expected: Shape,
        got: Shape,
    },
    #[error("{op}: expected {expected} {role} slot(s), got {got}")]
    ArityMismatch {
        op: String,
        role: String,
        expected: usize,
        got: usize,
    },
    #[error("{op}: compute failure: {reason}")]
    Compute { op: String, reason: String },
    #[error("{op}: device {device} is not supported")]
    UnsupportedDevice { op: String, device: Device },
    #[error("operator '{0}' is not registered")]
    RegistryMiss(String),
    #[error("operator '{0}' is already registered")]
    DuplicateOperator(String),
    #[error("{op}: backward dependency index {index} is outside the index space of size {len}")]
    InvalidDependency { op: String, index: usize, len: usize },
    #[error("{op}: in-place option ({output} <- {input}) is invalid: {reason}")]
    InvalidInplace {
        op: String,
        output: usize,
        input: usize,
        reason: String,
    },
    #[error("{op}: write mode {mode} is not allowed for slot {slot} in {pass}")]
    InvalidWriteMode {
        op: String,
        pass: &'static str,
        slot: usize,
        mode: crate::WriteMode,
    },
    #[error("{op}: requested resource {index} is missing or not a {expected}")]
    ResourceMismatch {
        op: String,
        index: usize,
        expected: crate::ResourceKind,
    },
    #[error("resource pool: {0}")]
    ResourceUnavailable(String),
    #[error("tensor error: {0}")]
    Tensor(#[from] tg_tensor::TensorError),
}

impl OpError {
    pub fn compute(op: &str, reason: impl Into<String>) -> Self {
        OpError::Compute {
            op: op.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, OpError>;
