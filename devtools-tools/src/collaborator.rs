//! Wrapping external introspection sources as tools.
//!
//! A collaborator is any function that returns a serializable value or fails.
//! The wrapper never lets a collaborator failure reach the dispatcher: the
//! failure is replaced with a descriptive `{"error": ...}` value, the same way
//! for every collaborator.

use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::warn;

use crate::context::CallContext;
use crate::registry::{Arguments, ToolDefinition, ToolError};
use crate::schema::ParameterSchema;

/// Failure reported by an external introspection source.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CollectorError {
    /// The source does not exist on this host.
    #[error("{0} is not available")]
    Unavailable(String),
    /// The source exists but could not be read.
    #[error("{0}")]
    Failed(String),
}

impl CollectorError {
    /// Creates a [`CollectorError::Failed`] from any displayable error.
    #[must_use]
    pub fn failed(reason: impl ToString) -> Self {
        Self::Failed(reason.to_string())
    }
}

/// Converts a collaborator result into a value, substituting an error payload.
#[must_use]
pub fn best_effort<T: Serialize>(what: &str, result: Result<T, CollectorError>) -> Value {
    let outcome = result
        .map_err(|err| err.to_string())
        .and_then(|value| serde_json::to_value(value).map_err(|err| err.to_string()));
    match outcome {
        Ok(value) => value,
        Err(reason) => {
            warn!(source = what, %reason, "collaborator failed; returning error value");
            json!({ "error": format!("Failed to retrieve {what}: {reason}") })
        }
    }
}

/// Builds a tool from a collaborator function.
///
/// The function runs on the blocking pool. `what` names the retrieved facts in
/// the substituted error message ("dependency information", ...).
pub fn wrap<F, T>(
    name: impl Into<String>,
    description: impl Into<String>,
    parameters: impl Into<ParameterSchema>,
    what: impl Into<String>,
    collect: F,
) -> ToolDefinition
where
    F: Fn(&Arguments, &CallContext) -> Result<T, CollectorError> + Send + Sync + 'static,
    T: Serialize,
{
    let what = what.into();
    ToolDefinition::blocking(name, description, parameters, move |args, ctx| {
        Ok::<_, ToolError>(best_effort(&what, collect(&args, &ctx)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::BTreeMap;

    #[test]
    fn passes_values_through() {
        let value = best_effort(
            "profiles",
            Ok::<_, CollectorError>(vec!["dev".to_owned()]),
        );
        assert_eq!(value, json!(["dev"]));
    }

    #[test]
    fn substitutes_error_payload() {
        let value = best_effort::<BTreeMap<String, String>>(
            "dependency information",
            Err(CollectorError::failed("catalog unreadable")),
        );
        assert_eq!(
            value,
            json!({"error": "Failed to retrieve dependency information: catalog unreadable"})
        );
    }

    #[tokio::test]
    async fn wrapped_tool_never_fails() {
        let descriptor = wrap(
            "get_routes",
            "Lists routes",
            ParameterSchema::empty(),
            "routes",
            |_args, _ctx| -> Result<Vec<String>, CollectorError> {
                Err(CollectorError::Unavailable("route table".into()))
            },
        )
        .extract("routes")
        .unwrap();

        let value = descriptor
            .handler()
            .call(Arguments::default(), CallContext::detached("get_routes"))
            .await
            .unwrap();
        assert_eq!(
            value["error"],
            "Failed to retrieve routes: route table is not available"
        );
    }
}
