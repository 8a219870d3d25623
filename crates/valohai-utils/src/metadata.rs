//! Execution metadata printed as JSON lines.
//!
//! Valohai picks up every stdout line that is a JSON object as a metadata
//! batch. A [`Logger`] collects name/value pairs and prints them together, so
//! one training iteration shows up as one row.

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;
use std::io::{self, Stdout, Write};

pub struct Logger<W: Write = Stdout> {
    writer: W,
    entries: Vec<(String, Value)>,
}

impl Logger<Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl Default for Logger<Stdout> {
    fn default() -> Self {
        Self::stdout()
    }
}

impl<W: Write> Logger<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, entries: Vec::new() }
    }

    /// Queue a value for the next batch. Logging a name again replaces its value.
    ///
    /// Only numbers, strings and booleans are accepted; anything else is skipped
    /// with a warning.
    pub fn log(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        let name = name.into();
        let value = value.into();
        if !matches!(value, Value::Number(_) | Value::String(_) | Value::Bool(_)) {
            tracing::warn!("Value of the logged item ({name}) is not of the expected type (number, string, bool).");
            return self;
        }
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Print the queued values as a single JSON object line. Nothing is printed when empty.
    pub fn flush(&mut self) -> io::Result<()> {
        if self.entries.is_empty() {
            return Ok(());
        }
        let line = serde_json::to_string(&Batch(&self.entries))?;
        self.entries.clear();
        writeln!(self.writer, "{line}")?;
        self.writer.flush()
    }

    pub fn into_inner(mut self) -> io::Result<W>
    where
        W: Default,
    {
        self.flush()?;
        Ok(std::mem::take(&mut self.writer))
    }
}

impl<W: Write> Drop for Logger<W> {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            tracing::warn!(error = %e, "failed to flush metadata");
        }
    }
}

/// Serializes entries as one object, in logging order.
struct Batch<'a>(&'a [(String, Value)]);

impl Serialize for Batch<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, value) in self.0 {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}
