//! Model catalog lookup and model selection policy.

use tracing::debug;

use crate::backend::ChatBackend;
use crate::obs::emit_catalog_listed;

/// Installed models, sorted. Empty when the server is down or has none.
///
/// An unreachable server and an empty server lead to the same remediation
/// (ask for a model name), so the failure is logged and dropped here.
pub async fn list_models<B: ChatBackend + ?Sized>(backend: &B) -> Vec<String> {
    match backend.try_list_models().await {
        Ok(mut models) => {
            models.sort();
            models.dedup();
            emit_catalog_listed(&backend.describe(), models.len(), true);
            models
        }
        Err(err) => {
            debug!(backend = %backend.describe(), error = %err, "model catalog unavailable");
            emit_catalog_listed(&backend.describe(), 0, false);
            Vec::new()
        }
    }
}

/// Resolve what the user typed at the model prompt.
///
/// * empty catalog: the input, or `default` when the input is blank
/// * a number in `1..=models.len()`: that catalog entry
/// * any other non-blank text: taken as a custom model name
/// * blank input with a non-empty catalog: `None`, ask again
pub fn choose_model(models: &[String], input: &str, default: &str) -> Option<String> {
    let input = input.trim();

    if models.is_empty() {
        return Some(if input.is_empty() {
            default.to_string()
        } else {
            input.to_string()
        });
    }

    if let Ok(index) = input.parse::<usize>() {
        if (1..=models.len()).contains(&index) {
            return Some(models[index - 1].clone());
        }
    }

    if input.is_empty() {
        None
    } else {
        Some(input.to_string())
    }
}
