//! Parameters command implementation.

use serde_json::{Map, Value};

pub fn execute(name: Option<String>, overrides: Vec<String>) -> anyhow::Result<()> {
    let context = super::context(overrides)?;
    match name {
        Some(name) => {
            let value = context.parameter(&name)?.ok_or_else(|| anyhow::anyhow!("No parameter named {name}"))?;
            super::print_json(&value.to_json())
        }
        None => {
            let all: Map<String, Value> =
                context.parameters()?.into_iter().map(|(name, value)| (name, value.to_json())).collect();
            super::print_json(&Value::Object(all))
        }
    }
}
