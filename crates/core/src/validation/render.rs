//! Rendering of a category's check script for one record.
//!
//! The operator's script must define `validate(payload) -> (used, banned)`.
//! Rendering prepends an inline script metadata header (so an ephemeral
//! interpreter can resolve it) and appends a trailer that calls
//! `validate` with the record's payload and prints both booleans.

/// Inline metadata block understood by `uv run`.
const SCRIPT_HEADER: &str = "# /// script\n# requires-python = \">=3.11\"\n# ///\n";

/// Prefix of the trailer line that invokes `validate`.
const CALL_PREFIX: &str = "used, banned = validate(";

/// Render the full script executed for a single record.
pub fn render_check_script(script: &str, payload: &str) -> String {
    let mut rendered = String::with_capacity(SCRIPT_HEADER.len() + script.len() + payload.len() + 64);
    rendered.push_str(SCRIPT_HEADER);
    rendered.push_str(script);
    if !script.ends_with('\n') {
        rendered.push('\n');
    }
    rendered.push_str(CALL_PREFIX);
    rendered.push_str(&payload_literal(payload));
    rendered.push_str(")\nprint(used)\nprint(banned)\n");
    rendered
}

/// Quote `payload` as a string literal.
///
/// JSON string escapes (`\"`, `\\`, `\n`, `\uXXXX`) are all valid in
/// Python string literals, so the JSON encoding is used verbatim.
pub fn payload_literal(payload: &str) -> String {
    serde_json::Value::String(payload.to_owned()).to_string()
}

/// Recover the payload from a script produced by [`render_check_script`].
///
/// Returns `None` if the trailer is missing or malformed.
pub fn rendered_payload(rendered: &str) -> Option<String> {
    let line = rendered
        .lines()
        .rev()
        .find(|line| line.starts_with(CALL_PREFIX))?;
    let literal = line.strip_prefix(CALL_PREFIX)?.strip_suffix(')')?;
    serde_json::from_str::<String>(literal).ok()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
