//! Stream payload parser for agent events

use serde_json::Value;

use crate::error::{ConsoleError, Result};
use crate::types::events::StreamEvent;

/// Event kinds decoded into typed variants
const KNOWN_KINDS: &[&str] = &[
    "connected",
    "status",
    "step",
    "error",
    "warning",
    "screenshot",
    "pong",
];

/// Parse a raw text frame into a typed event
///
/// # Arguments
/// * `text` - Raw JSON text received over the stream
///
/// # Returns
/// The decoded event. Kinds outside the known set decode to
/// [`StreamEvent::Unknown`] instead of failing.
///
/// # Errors
/// Returns `ConsoleError::Protocol` carrying the raw payload if the text is
/// not a JSON object with a string `type`, or if a known kind has malformed
/// fields.
pub fn parse_event(text: &str) -> Result<StreamEvent> {
    let value: Value = serde_json::from_str(text).map_err(|e| {
        ConsoleError::protocol(format!("Invalid JSON: {e}"), Some(text.to_string()))
    })?;
    parse_event_value(value).map_err(|e| match e {
        ConsoleError::Protocol { message, .. } => {
            ConsoleError::protocol(message, Some(text.to_string()))
        }
        other => other,
    })
}

/// Parse an already-decoded JSON value into a typed event
///
/// # Errors
/// Returns `ConsoleError::Protocol` if the value is not a well-formed event.
pub fn parse_event_value(value: Value) -> Result<StreamEvent> {
    let kind = match value.get("type") {
        Some(Value::String(kind)) => kind.clone(),
        Some(_) => {
            return Err(ConsoleError::protocol(
                "Event 'type' is not a string",
                Some(value.to_string()),
            ));
        }
        None => {
            return Err(ConsoleError::protocol(
                "Event has no 'type' field",
                Some(value.to_string()),
            ));
        }
    };

    if !KNOWN_KINDS.contains(&kind.as_str()) {
        return Ok(StreamEvent::Unknown { kind });
    }

    serde_json::from_value(value.clone()).map_err(|e| {
        ConsoleError::protocol(
            format!("Failed to parse '{kind}' event: {e}"),
            Some(value.to_string()),
        )
    })
}
