//! Metadata command implementation.

use serde_json::Value;
use valohai_utils::Logger;

/// Print `name=value` pairs as a single metadata line.
///
/// Values that parse as JSON keep their type; anything else is a string.
pub fn execute(pairs: &[String]) -> anyhow::Result<()> {
    let mut logger = Logger::stdout();
    for pair in pairs {
        let (name, raw) = pair.split_once('=').ok_or_else(|| anyhow::anyhow!("expected name=value, got {pair}"))?;
        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        logger.log(name, value);
    }
    logger.flush()?;
    Ok(())
}
