// Pulls one JSON object out of whatever the oracle wrote around it.
use serde_json::{Map, Value};

use crate::error::CoerceError;

/// Extract the first well-formed JSON object from `raw`.
///
/// A fenced block (```` ```json ```` or plain ```` ``` ````) is preferred when
/// present; otherwise the text is scanned for the first balanced `{...}` that
/// parses as an object. Prose before or after the object is ignored.
pub fn extract_object(raw: &str) -> Result<Map<String, Value>, CoerceError> {
    match fenced_block(raw) {
        Some(block) => scan_objects(block).or_else(|_| scan_objects(raw)),
        None => scan_objects(raw),
    }
}

/// Extract an object and hand it to an operation's contract.
pub fn coerce<T>(
    raw: &str,
    validate: impl FnOnce(&Map<String, Value>) -> Result<T, CoerceError>,
) -> Result<T, CoerceError> {
    let object = extract_object(raw)?;
    validate(&object)
}

fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after = &text[start + 3..];
    let end = after.find("```")?;
    let block = &after[..end];

    // Skip a language tag such as `json` on the opening fence line.
    match block.find('\n') {
        Some(newline) if !block[..newline].trim_start().starts_with('{') => {
            Some(block[newline + 1..].trim())
        }
        _ => Some(block.trim()),
    }
}

fn scan_objects(text: &str) -> Result<Map<String, Value>, CoerceError> {
    let mut first_error = None;
    for (start, _) in text.match_indices('{') {
        let Some(len) = balanced_len(&text[start..]) else {
            continue;
        };
        match serde_json::from_str::<Map<String, Value>>(&text[start..start + len]) {
            Ok(object) => return Ok(object),
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }
    }
    Err(first_error.map_or(CoerceError::NoJson, CoerceError::Parse))
}

// Byte length of the object starting at text[0] == '{', string and escape aware.
fn balanced_len(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}
