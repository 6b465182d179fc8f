//! Bedrock model families, parameter validation and access checks

pub mod access;
pub mod family;

pub use access::{validate_models_access, InvokeError, ModelInvoker};
pub use family::{validate_inference_parameters, CommonParameter, ModelFamily};
