//! Pulling a JSON payload out of free-form model output.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

static FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)```(?:json)?(.*?)```").expect("fence pattern is valid"));

#[derive(Debug, thiserror::Error)]
pub enum JsonExtractError {
    #[error("empty response")]
    Empty,

    #[error("no JSON payload found: {0}")]
    Invalid(#[from] serde_json::Error),
}

/// Extract a JSON value from `text`.
///
/// The first fenced block (```` ``` ```` or ```` ```json ````) narrows the
/// search when present. Within it, the outermost `{..}` wins over the
/// outermost `[..]` unless the array opens first (a bare list of objects).
/// A candidate that does not parse yields to the other one; with neither,
/// the trimmed text is parsed as is.
pub fn extract_json(text: &str) -> Result<Value, JsonExtractError> {
    if text.trim().is_empty() {
        return Err(JsonExtractError::Empty);
    }

    let body = FENCE
        .captures(text)
        .and_then(|c| c.get(1))
        .map_or(text, |inner| inner.as_str())
        .trim();

    let object = outermost(body, '{', '}');
    let array = outermost(body, '[', ']');
    let array_first = match (body.find('['), body.find('{')) {
        (Some(a), Some(o)) => a < o,
        (Some(_), None) => true,
        _ => false,
    };
    let candidates = if array_first {
        [array, object]
    } else {
        [object, array]
    };

    let mut last_err = None;
    for candidate in candidates.into_iter().flatten() {
        match serde_json::from_str(candidate) {
            Ok(value) => return Ok(value),
            Err(e) => last_err = Some(e),
        }
    }
    match serde_json::from_str(body) {
        Ok(value) => Ok(value),
        Err(e) => Err(last_err.unwrap_or(e).into()),
    }
}

fn outermost(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}
