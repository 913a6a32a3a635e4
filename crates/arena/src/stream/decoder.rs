use serde_json::{Map, Value};

pub type JsonObject = Map<String, Value>;

/// Splits a newline-delimited JSON body into objects, across arbitrary read boundaries.
///
/// Bytes after the last `\n` are held back until a later fragment completes the
/// line. Lines are only decoded once complete, so a UTF-8 sequence split between
/// two reads survives. A line that is not a JSON object is logged and dropped.
#[derive(Debug, Default)]
pub struct ChunkDecoder {
    residual: Vec<u8>,
}

impl ChunkDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one transport fragment, returning every object completed by it
    pub fn push(&mut self, fragment: &[u8]) -> Vec<JsonObject> {
        let Some(newline_in_fragment) = fragment.iter().rposition(|b| *b == b'\n') else {
            self.residual.extend_from_slice(fragment);
            return Vec::new();
        };
        let last_newline = self.residual.len() + newline_in_fragment;
        self.residual.extend_from_slice(fragment);

        let rest = self.residual.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.residual, rest);

        complete
            .split(|b| *b == b'\n')
            .filter_map(parse_line)
            .collect()
    }

    /// Bytes currently waiting for a terminating newline
    pub fn pending(&self) -> &[u8] {
        &self.residual
    }

    /// End of input. An unterminated trailing line is never parsed.
    pub fn finish(&mut self) {
        if self.residual.iter().any(|b| !b.is_ascii_whitespace()) {
            tracing::warn!(
                bytes = self.residual.len(),
                "Discarding unterminated trailing line at end of stream"
            );
        }
        self.residual.clear();
    }
}

fn parse_line(raw: &[u8]) -> Option<JsonObject> {
    let line = match std::str::from_utf8(raw) {
        Ok(line) => line.trim_end_matches('\r'),
        Err(e) => {
            tracing::warn!("Dropping stream line with invalid UTF-8: {}", e);
            return None;
        }
    };

    if line.trim().is_empty() {
        return None;
    }

    match serde_json::from_str::<Value>(line) {
        Ok(Value::Object(object)) => Some(object),
        Ok(other) => {
            tracing::warn!(line, "Dropping stream line that is not a JSON object: {}", other);
            None
        }
        Err(e) => {
            tracing::warn!(line, "Error parsing stream line as JSON: {}", e);
            None
        }
    }
}
