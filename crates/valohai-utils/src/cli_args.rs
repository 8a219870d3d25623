//! Command-line overrides for declared inputs and parameters.
//!
//! Flag names come from the declared names at runtime, so this is a single
//! pass over the raw arguments rather than a fixed clap schema. Anything
//! unrecognized is warned about and skipped.

use crate::parameters::{parse_bool, ParameterType, ParameterValue};
use std::collections::HashMap;

/// How a declared name consumes its command-line values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagKind {
    /// One or more values up to the next flag; plural inputs also split on commas.
    Input { plural: bool },
    /// A single value coerced to the declared type. Booleans may be given bare.
    Parameter(ParameterType),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CliOverrides {
    pub inputs: HashMap<String, Vec<String>>,
    pub parameters: HashMap<String, ParameterValue>,
}

impl CliOverrides {
    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty() && self.parameters.is_empty()
    }
}

/// Parse `args` (without the program name). The last occurrence of a flag wins.
pub fn parse_overrides(args: &[String], flags: &HashMap<String, FlagKind>) -> CliOverrides {
    let mut overrides = CliOverrides::default();
    let mut i = 0;
    while i < args.len() {
        let arg = &args[i];
        i += 1;

        if arg == "--" {
            for rest in &args[i..] {
                warn_unexpected(rest);
            }
            break;
        }
        let Some(flag) = arg.strip_prefix("--") else {
            warn_unexpected(arg);
            continue;
        };
        let (name, inline) = match flag.split_once('=') {
            Some((name, value)) => (name, Some(value)),
            None => (flag, None),
        };
        let Some(kind) = flags.get(name) else {
            warn_unexpected(arg);
            continue;
        };

        match *kind {
            FlagKind::Input { plural } => {
                let mut raw = Vec::new();
                if let Some(value) = inline {
                    raw.push(value.to_string());
                } else {
                    while i < args.len() && !args[i].starts_with("--") {
                        raw.push(args[i].clone());
                        i += 1;
                    }
                }
                let values = split_input_values(raw, plural);
                if values.is_empty() {
                    tracing::warn!(flag = %arg, "expected at least one value for input");
                } else {
                    overrides.inputs.insert(name.to_string(), values);
                }
            }
            FlagKind::Parameter(ParameterType::Bool) => {
                let value = match inline {
                    Some(value) => Some(value),
                    None => match args.get(i) {
                        Some(next) if parse_bool(next).is_some() => {
                            i += 1;
                            Some(next.as_str())
                        }
                        _ => None,
                    },
                };
                let parsed = value.map_or(ParameterValue::Bool(true), |v| coerce_or_string(name, v, ParameterType::Bool));
                overrides.parameters.insert(name.to_string(), parsed);
            }
            FlagKind::Parameter(ty) => {
                let value = match inline {
                    Some(value) => Some(value),
                    None => match args.get(i) {
                        Some(next) if !next.starts_with("--") => {
                            i += 1;
                            Some(next.as_str())
                        }
                        _ => None,
                    },
                };
                match value {
                    Some(value) => {
                        overrides.parameters.insert(name.to_string(), coerce_or_string(name, value, ty));
                    }
                    None => tracing::warn!(flag = %arg, "expected a value for parameter"),
                }
            }
        }
    }
    overrides
}

/// Coerce to the declared type; on failure keep the raw text as a string.
fn coerce_or_string(name: &str, raw: &str, ty: ParameterType) -> ParameterValue {
    ParameterValue::coerce(raw, ty).unwrap_or_else(|| {
        tracing::warn!(parameter = name, value = raw, expected = ?ty, "could not parse command-line value, using it as a string");
        ParameterValue::Str(raw.to_string())
    })
}

fn split_input_values(raw: Vec<String>, plural: bool) -> Vec<String> {
    if !plural {
        return raw.into_iter().filter(|v| !v.is_empty()).collect();
    }
    raw.iter()
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

fn warn_unexpected(arg: &str) {
    tracing::warn!("Unexpected command-line argument {arg} found.");
}
