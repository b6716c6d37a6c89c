//! JSON parsing helpers for AI backend responses
//!
//! Models sometimes wrap the JSON payload in prose or code fences, so the
//! outermost object is cut out before parsing.

use serde_json::Value;

use crate::error::{Error, Result};

const RAW_PREVIEW_LEN: usize = 200;

/// Shorten a raw response for error messages, on a char boundary
fn preview(raw: &str) -> String {
    if raw.chars().count() > RAW_PREVIEW_LEN {
        let cut: String = raw.chars().take(RAW_PREVIEW_LEN).collect();
        format!("{}...", cut)
    } else {
        raw.to_string()
    }
}

/// Extract and parse the outermost JSON object of a model response
pub fn extract_json_object(response: &str) -> Result<Value> {
    let response = response.trim();
    let start = response.find('{');
    let end = response.rfind('}');

    match (start, end) {
        (Some(s), Some(e)) if s < e => {
            let json_str = &response[s..=e];
            let value: Value = serde_json::from_str(json_str).map_err(|e| {
                Error::Gateway(format!(
                    "Invalid JSON from classifier: {} | Raw: {}",
                    e,
                    preview(json_str)
                ))
            })?;
            if value.is_object() {
                Ok(value)
            } else {
                Err(Error::Gateway(format!(
                    "Classifier did not return an object | Raw: {}",
                    preview(json_str)
                )))
            }
        }
        _ => Err(Error::Gateway(format!(
            "No JSON found in classifier response | Raw: {}",
            preview(response)
        ))),
    }
}
