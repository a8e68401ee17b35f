//! JSON snapshot exporter — one file per chunk and export step.
//!
//! Files are named `<body>_c<chunk>_s<step>.json` and hold a
//! [`ChunkSnapshot`]. Chunks write to distinct files, so every worker can
//! export concurrently without coordination.

use std::path::{Path, PathBuf};

use peridyn_solver::{BodyChunk, ChunkSnapshot, Exporter, RunSummary};
use peridyn_types::{PeridynError, PeridynResult};

/// Writes chunk snapshots as JSON files into a directory.
#[derive(Debug, Clone)]
pub struct JsonExporter {
    dir: PathBuf,
    pretty: bool,
}

impl JsonExporter {
    /// Creates the exporter and its output directory.
    pub fn new(dir: impl Into<PathBuf>) -> PeridynResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir, pretty: false })
    }

    /// Indents the written JSON.
    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// Output directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the snapshot of `chunk` of `body` at `step`.
    pub fn snapshot_path(&self, body: &str, chunk: u32, step: u32) -> PathBuf {
        self.dir.join(format!("{body}_c{chunk:04}_s{step:07}.json"))
    }

    /// Writes the run summary to `summary.json`.
    pub fn write_summary(&self, summary: &RunSummary) -> PeridynResult<PathBuf> {
        let path = self.dir.join("summary.json");
        let json = serde_json::to_string_pretty(summary)
            .map_err(|e| PeridynError::Serialization(format!("run summary: {e}")))?;
        std::fs::write(&path, json)?;
        Ok(path)
    }

    /// Reads a snapshot written by this exporter.
    pub fn read_snapshot(path: impl AsRef<Path>) -> PeridynResult<ChunkSnapshot> {
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|e| PeridynError::Serialization(format!("snapshot: {e}")))
    }
}

impl Exporter for JsonExporter {
    fn export_results(&self, chunk: &BodyChunk, step: u32, t: f64) -> PeridynResult<()> {
        let snapshot = ChunkSnapshot::capture(chunk, step, t);
        let json = if self.pretty {
            serde_json::to_string_pretty(&snapshot)
        } else {
            serde_json::to_string(&snapshot)
        }
        .map_err(|e| PeridynError::Export(format!("JSON serialization failed: {e}")))?;

        let path = self.snapshot_path(&snapshot.body, snapshot.chunk, step);
        std::fs::write(&path, json)
            .map_err(|e| PeridynError::Export(format!("{}: {e}", path.display())))
    }
}
