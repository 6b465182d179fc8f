//! Model access checks
//!
//! Each model is probed with the smallest native request its family
//! accepts. An access-denied reply marks the model as inaccessible; any
//! other failure aborts the check.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{McpAgentError, Result};
use crate::models::family::ModelFamily;

/// Failure of a single `InvokeModel` call.
#[derive(Debug, thiserror::Error)]
pub enum InvokeError {
    /// The caller is not allowed to use the model
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// Any other provider failure
    #[error("{0}")]
    Other(String),
}

/// Raw model invocation, implemented by the Bedrock provider.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ModelInvoker: Send + Sync {
    /// Sends `body` to `model_id` and discards the reply.
    async fn invoke(&self, model_id: &str, body: Value) -> std::result::Result<(), InvokeError>;
}

/// Returns the subset of `model_ids` the caller cannot access, in input
/// order.
///
/// # Errors
///
/// - [`McpAgentError::UnsupportedModel`] when an identifier matches no family.
/// - [`McpAgentError::Provider`] for any failure other than access denied.
pub async fn validate_models_access(
    invoker: &dyn ModelInvoker,
    model_ids: &[String],
) -> Result<Vec<String>> {
    let mut inaccessible = Vec::new();

    for model_id in model_ids {
        let family = ModelFamily::from_model_id(model_id)?;
        tracing::debug!(model = %model_id, family = %family, "Probing model access");

        match invoker.invoke(model_id, family.access_probe_body()).await {
            Ok(()) => {}
            Err(InvokeError::AccessDenied(detail)) => {
                tracing::debug!(model = %model_id, %detail, "Model access denied");
                inaccessible.push(model_id.clone());
            }
            Err(InvokeError::Other(detail)) => {
                return Err(McpAgentError::Provider(format!(
                    "access check for '{}' failed: {}",
                    model_id, detail
                ))
                .into());
            }
        }
    }

    Ok(inaccessible)
}
