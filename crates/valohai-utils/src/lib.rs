//! Valohai Utils
//!
//! Helpers for scripts running as Valohai executions:
//! - Declaring inputs and parameters, resolved from the command line,
//!   platform config files or in-code defaults (`Context`)
//! - Downloading inputs and reading them through a VFS that sees into archives
//! - Writing outputs, output properties and execution metadata
//! - Reading the distributed-worker group configuration

pub mod api;
pub mod cli_args;
pub mod compression;
pub mod context;
pub mod distributed;
pub mod download;
pub mod error;
pub mod execution;
pub mod input_info;
pub mod inputs;
pub mod metadata;
pub mod output_properties;
pub mod outputs;
pub mod parameters;
pub mod paths;

pub use api::{ApiClient, ApiEndpoint, DatumApi, ResolvedDatum};
pub use context::{Context, Prepare, RawDeclaredValue};
pub use distributed::{compute_member_id_ranks, Distributed, DistributedConfig, Member};
pub use download::{DownloadType, Fetcher, HttpFetcher};
pub use error::{ValohaiError, ValohaiResult};
pub use execution::ExecutionConfig;
pub use input_info::{uri_to_filename, FileInfo, InputInfo};
pub use inputs::{Input, InputOptions};
pub use metadata::Logger;
pub use output_properties::{format_line, OutputProperties};
pub use outputs::Output;
pub use parameters::{ParameterType, ParameterValue};
pub use paths::{execution_guid, is_running_in_valohai, EnvSource, Paths, ProcessEnv};
