//! Properties for output files, saved as `valohai.metadata.jsonl` in the outputs root.

use crate::error::ValohaiResult;
use crate::paths::Paths;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub const METADATA_FILE_NAME: &str = "valohai.metadata.jsonl";
const DATASET_VERSIONS_KEY: &str = "valohai.dataset-versions";

/// Accumulates per-file properties and writes them out in one go.
///
/// Files are kept in the order they were first set; setting a file again
/// replaces its properties in place.
#[derive(Debug, Clone)]
pub struct OutputProperties {
    properties_file: PathBuf,
    entries: Vec<(String, Map<String, Value>)>,
    index: HashMap<String, usize>,
}

impl OutputProperties {
    pub fn new(paths: &Paths) -> Self {
        Self::with_file(paths.outputs_dir().join(METADATA_FILE_NAME))
    }

    pub fn with_file(properties_file: PathBuf) -> Self {
        Self { properties_file, entries: Vec::new(), index: HashMap::new() }
    }

    pub fn properties_file(&self) -> &Path {
        &self.properties_file
    }

    /// `dataset://<dataset>/<version>`.
    pub fn dataset_uri(dataset: &str, version: &str) -> String {
        format!("dataset://{dataset}/{version}")
    }

    /// Set the properties of `file`, a path relative to the outputs root.
    pub fn set(&mut self, file: impl AsRef<Path>, properties: Map<String, Value>) {
        let key = file.as_ref().to_string_lossy().into_owned();
        match self.index.get(&key) {
            Some(&i) => self.entries[i].1 = properties,
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, properties));
            }
        }
    }

    /// Like [`set`](Self::set), also adding the file to dataset versions.
    pub fn set_with_datasets(&mut self, file: impl AsRef<Path>, mut properties: Map<String, Value>, datasets: &[String]) {
        if !datasets.is_empty() {
            properties.insert(DATASET_VERSIONS_KEY.to_string(), json!(datasets));
        }
        self.set(file, properties);
    }

    pub fn get(&self, file: impl AsRef<Path>) -> Option<&Map<String, Value>> {
        let key = file.as_ref().to_string_lossy();
        self.index.get(key.as_ref()).map(|&i| &self.entries[i].1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rewrite the properties file with everything set so far.
    pub fn save(&self) -> ValohaiResult<()> {
        if let Some(parent) = self.properties_file.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut writer = BufWriter::new(std::fs::File::create(&self.properties_file)?);
        for (file, metadata) in &self.entries {
            writer.write_all(format_line(file, metadata)?.as_bytes())?;
        }
        writer.flush()?;
        tracing::debug!(entries = self.entries.len(), path = %self.properties_file.display(), "saved output properties");
        Ok(())
    }
}

/// One metadata line, newline included.
pub fn format_line(file: &str, metadata: &Map<String, Value>) -> ValohaiResult<String> {
    let mut line = serde_json::to_string(&json!({ "file": file, "metadata": metadata }))?;
    line.push('\n');
    Ok(line)
}
