//! Post-processing: strip an enclosing code fence from a model reply.
//!
//! Vision models regularly wrap their whole answer in ` ```markdown … ``` `
//! even when told not to. A reply that starts with a fence marker loses the
//! opening marker line and the last closing marker, keeping only the interior;
//! any other reply is returned byte-for-byte. No Markdown validation happens
//! here.

const FENCE: &str = "```";

/// Remove an enclosing fenced block, if the reply starts with one.
///
/// * opening line (`` ``` `` or `` ```markdown ``) is dropped up to and
///   including its newline; a reply that is only a marker line becomes empty
/// * everything from the last `` ``` `` onward is dropped, if present
/// * the remaining interior is trimmed of surrounding whitespace
pub fn strip_code_fence(input: &str) -> String {
    if !input.starts_with(FENCE) {
        return input.to_string();
    }

    let body = input.split_once('\n').map_or("", |(_, rest)| rest);
    let body = body.rsplit_once(FENCE).map_or(body, |(inner, _)| inner);
    body.trim().to_string()
}
