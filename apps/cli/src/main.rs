//! Valohai Utils CLI
//!
//! The `vhu` command resolves inputs, parameters and execution details the
//! same way a training script does, so they can be inspected from a shell.
//! Anything after `--` is handed to the resolver as the script's own
//! arguments, e.g. `vhu parameters -- --learning_rate=0.1`.

mod commands;

use clap::{CommandFactory, Parser, Subcommand};
use std::ffi::OsString;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use commands::{distributed, execution, inputs, metadata, output_path, parameters, status};

/// Valohai Utils - inspect an execution's inputs, parameters and outputs
#[derive(Parser, Debug)]
#[command(name = "vhu", author, version, about = "Inspect Valohai execution inputs, parameters and outputs")]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "warn", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the local paths of an input's files, one per line
    ///
    /// Missing files are downloaded first. Without a name, lists the known inputs.
    Inputs {
        /// Input name
        name: Option<String>,

        /// Only files whose name matches this glob
        #[arg(long)]
        filter: Option<String>,

        /// List archives as files instead of their contents
        #[arg(long)]
        no_archives: bool,

        /// Download again even when cached
        #[arg(long)]
        force_download: bool,
    },

    /// Print resolved parameters as JSON
    Parameters {
        /// Only this parameter
        name: Option<String>,
    },

    /// Describe the distributed worker group as JSON
    Distributed {
        /// Only print whether this is a distributed execution
        #[arg(long)]
        probe: bool,
    },

    /// Print the execution details as JSON
    Execution,

    /// Print (and create the parent of) the path an output file should be written to
    OutputPath {
        /// File path inside the output directory
        fragment: String,

        /// Named output directory
        #[arg(long, default_value = "")]
        output: String,
    },

    /// Set the execution's status detail
    Status {
        /// Status detail text
        detail: String,
    },

    /// Print name=value pairs as one metadata line
    Metadata {
        /// Pairs such as `epoch=3` or `loss=0.25`
        #[arg(required = true)]
        pairs: Vec<String>,
    },
}

fn main() -> anyhow::Result<()> {
    let (own, overrides) = split_overrides(std::env::args_os());
    let args = Args::parse_from(own);

    let level = match args.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .without_time()
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let Some(command) = args.command else {
        Args::command().print_help()?;
        return Ok(());
    };

    match command {
        Command::Inputs { name, filter, no_archives, force_download } => {
            inputs::execute(name, filter, no_archives, force_download, overrides)?;
        }
        Command::Parameters { name } => {
            parameters::execute(name, overrides)?;
        }
        Command::Distributed { probe } => {
            distributed::execute(probe)?;
        }
        Command::Execution => {
            execution::execute()?;
        }
        Command::OutputPath { fragment, output } => {
            output_path::execute(&fragment, &output)?;
        }
        Command::Status { detail } => {
            status::execute(&detail)?;
        }
        Command::Metadata { pairs } => {
            metadata::execute(&pairs)?;
        }
    }

    Ok(())
}

/// Split at the first `--`: our own arguments, then the script's.
fn split_overrides(args: impl Iterator<Item = OsString>) -> (Vec<OsString>, Vec<String>) {
    let mut own = Vec::new();
    let mut rest = args;
    for arg in rest.by_ref() {
        if arg == "--" {
            break;
        }
        own.push(arg);
    }
    (own, rest.map(|a| a.to_string_lossy().into_owned()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_overrides() {
        let args = ["vhu", "parameters", "--", "--lr=0.1", "--", "x"].map(OsString::from);
        let (own, rest) = split_overrides(args.into_iter());
        assert_eq!(own, vec![OsString::from("vhu"), OsString::from("parameters")]);
        assert_eq!(rest, vec!["--lr=0.1", "--", "x"]);
    }

    #[test]
    fn test_cli_definition_is_valid() {
        Args::command().debug_assert();
    }
}
