//! Event feeds
//!
//! Event files come either as JSON Lines (one object per line) or as a single
//! JSON array. Malformed lines are skipped so one bad record does not cost the
//! rest of the file.

use log::{debug, warn};
use serde_json::Value;
use std::io::Read;
use std::path::Path;

use crate::error::{Result, RunnerError};

/// Read every event from `reader`.
///
/// A document whose first non-blank character is `[` is parsed as one array
/// and must be valid as a whole. Anything else is read line by line.
pub fn read_events<R: Read>(mut reader: R, source: &str) -> Result<Vec<Value>> {
    let mut content = String::new();
    reader
        .read_to_string(&mut content)
        .map_err(|e| RunnerError::io(source, e))?;

    if content.trim_start().starts_with('[') {
        let events: Vec<Value> = serde_json::from_str(&content).map_err(|e| RunnerError::Parse {
            path: source.to_string(),
            reason: e.to_string(),
        })?;
        debug!("Read {} events from JSON array in {}", events.len(), source);
        return Ok(events);
    }

    let mut events = Vec::new();
    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(line) {
            Ok(event) => events.push(event),
            Err(e) => warn!("Skipping malformed line {} in {}: {}", index + 1, source, e),
        }
    }
    debug!("Read {} events from JSONL in {}", events.len(), source);
    Ok(events)
}

/// Read events from a file, or from stdin when `path` is `-`
pub fn read_events_from(path: impl AsRef<Path>) -> Result<Vec<Value>> {
    let path = path.as_ref();
    if path == Path::new("-") {
        return read_events(std::io::stdin().lock(), "<stdin>");
    }
    let source = path.display().to_string();
    let file = std::fs::File::open(path).map_err(|e| RunnerError::io(source.clone(), e))?;
    read_events(file, &source)
}
