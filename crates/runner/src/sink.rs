//! File-backed outputs
//!
//! - [`FileEvidenceSink`]: one pretty-printed JSON file per evidence pack
//! - [`AlertLog`]: append-only JSON Lines alert log
//! - [`AlertRecorder`]: persists a raised alert's evidence, then logs the alert
//! - [`write_subgraph`]: JSON and DOT views of an account's neighborhood

use log::{debug, warn};
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use vigil_core::{Alert, EvidencePack, NodeId};
use vigil_detector::RaisedAlert;
use vigil_graph::RelationshipGraph;
use vigil_ports::{EvidenceSink, SinkError, SinkResult};

use crate::error::{Result, RunnerError};

/// Writes `<dir>/<evidence_id>.json`.
///
/// Evidence ids restart with every process, so an id already on disk gets a
/// numeric suffix (`EV-0001-1.json`) instead of replacing the older pack.
#[derive(Debug, Clone)]
pub struct FileEvidenceSink {
    dir: PathBuf,
}

impl FileEvidenceSink {
    /// Create the sink, creating `dir` if needed
    pub fn new(dir: impl Into<PathBuf>) -> SinkResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn create_unique(&self, evidence_id: &str) -> std::io::Result<(PathBuf, File)> {
        let mut attempt = 0u32;
        loop {
            let name = match attempt {
                0 => format!("{}.json", evidence_id),
                n => format!("{}-{}.json", evidence_id, n),
            };
            let path = self.dir.join(name);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => return Ok((path, file)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => attempt += 1,
                Err(e) => return Err(e),
            }
        }
    }
}

impl EvidenceSink for FileEvidenceSink {
    fn persist(&mut self, pack: &EvidencePack) -> SinkResult<String> {
        let json = serde_json::to_string_pretty(pack).map_err(|e| SinkError::Serialize {
            evidence_id: pack.evidence_id.clone(),
            reason: e.to_string(),
        })?;
        let (path, mut file) = self.create_unique(&pack.evidence_id)?;
        file.write_all(json.as_bytes())?;
        debug!("Evidence {} written to {}", pack.evidence_id, path.display());
        Ok(path.display().to_string())
    }
}

/// Appends one alert per line; existing content is never truncated
pub struct AlertLog {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl AlertLog {
    pub fn open(path: impl Into<PathBuf>) -> std::io::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    pub fn append(&mut self, alert: &Alert) -> std::io::Result<()> {
        serde_json::to_writer(&mut self.writer, alert)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Evidence first, so the logged alert points at the stored pack
pub struct AlertRecorder<S: EvidenceSink> {
    sink: S,
    log: AlertLog,
    recorded: usize,
}

impl<S: EvidenceSink> AlertRecorder<S> {
    pub fn new(sink: S, log: AlertLog) -> Self {
        Self {
            sink,
            log,
            recorded: 0,
        }
    }

    /// Persist the evidence and append the alert.
    ///
    /// Evidence that cannot be written is logged and the alert keeps the
    /// evidence id as its reference. Failing to append the alert is an error.
    pub fn record(&mut self, raised: RaisedAlert) -> Result<Alert> {
        let RaisedAlert { alert, evidence } = raised;
        let alert = match self.sink.persist(&evidence) {
            Ok(path) => alert.with_evidence_path(path),
            Err(e) => {
                warn!("Could not persist evidence {}: {}", evidence.evidence_id, e);
                alert
            }
        };

        self.log
            .append(&alert)
            .map_err(|e| RunnerError::io(self.log.path().display().to_string(), e))?;
        self.recorded += 1;
        Ok(alert)
    }

    pub fn recorded(&self) -> usize {
        self.recorded
    }
}

/// Write the neighborhood of account `seed` as `graph-<seed>.json` and
/// `graph-<seed>.dot` under `dir`. Returns both paths.
pub fn write_subgraph(
    graph: &RelationshipGraph,
    seed: &str,
    depth: usize,
    max_nodes: usize,
    dir: &Path,
) -> Result<(PathBuf, PathBuf)> {
    let subgraph = graph.export_subgraph(&NodeId::account(seed), depth, max_nodes);
    fs::create_dir_all(dir).map_err(|e| RunnerError::io(dir.display().to_string(), e))?;

    let stem: String = seed
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    let json_path = dir.join(format!("graph-{}.json", stem));
    let dot_path = dir.join(format!("graph-{}.dot", stem));

    let json = serde_json::to_string_pretty(&subgraph)
        .map_err(|e| RunnerError::Service(format!("graph export failed: {}", e)))?;
    fs::write(&json_path, json).map_err(|e| RunnerError::io(json_path.display().to_string(), e))?;
    fs::write(&dot_path, subgraph.to_dot(1))
        .map_err(|e| RunnerError::io(dot_path.display().to_string(), e))?;

    debug!(
        "Exported {} nodes around {} to {}",
        subgraph.nodes.len(),
        seed,
        json_path.display()
    );
    Ok((json_path, dot_path))
}
