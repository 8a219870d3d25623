//! Fetching remote input files.

use crate::api::{build_client, ApiClient, DatumApi, ResolvedDatum};
use crate::error::{ValohaiError, ValohaiResult};
use crate::paths::{EnvSource, Paths};
use reqwest::blocking::Client;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// When input files are fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DownloadType {
    /// Only use what is already known; never touch the network.
    Never,
    /// Fetch files that are not already on disk.
    #[default]
    Optional,
    /// Fetch every remote file again, replacing cached copies.
    Always,
}

/// Everything input materialization needs from the outside world.
pub trait Fetcher: Send + Sync {
    /// Write the body at `url` to `destination`.
    fn download(&self, url: &str, destination: &Path) -> ValohaiResult<()>;

    /// Turn a `datum://` reference into a name and download URL.
    fn resolve_datum(&self, reference: &str) -> ValohaiResult<ResolvedDatum>;

    /// Filename to URL mapping for a bulk input.
    fn request_input_urls(&self, input_id: &str) -> ValohaiResult<HashMap<String, String>>;
}

/// Download unless `path` already exists, or always with `force`.
pub fn download_url(fetcher: &dyn Fetcher, url: &str, path: &Path, force: bool) -> ValohaiResult<PathBuf> {
    if path.is_file() && !force {
        tracing::info!("Using cached {}", path.display());
        return Ok(path.to_path_buf());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    tracing::info!("Downloading {url} -> {}", path.display());
    fetcher.download(url, path)?;
    Ok(path.to_path_buf())
}

/// Fetcher backed by HTTP(S) and the Valohai API.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    api: ApiClient,
    datum_api: Option<DatumApi>,
}

impl HttpFetcher {
    pub fn new(api_config_path: PathBuf, datum_api: Option<DatumApi>) -> ValohaiResult<Self> {
        let client = build_client()?;
        let api = ApiClient::with_client(client.clone(), api_config_path);
        Ok(Self { client, api, datum_api })
    }

    pub fn from_env(env: &dyn EnvSource, paths: &Paths) -> ValohaiResult<Self> {
        Self::new(paths.api_config_path(), DatumApi::from_env(env))
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }
}

impl Fetcher for HttpFetcher {
    fn download(&self, url: &str, destination: &Path) -> ValohaiResult<()> {
        let dir = destination.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
        let mut response = self.client.get(url).send()?.error_for_status()?;

        // Staged beside the destination, then renamed into place.
        let mut staged = tempfile::NamedTempFile::new_in(dir)?;
        response.copy_to(&mut staged)?;
        staged.persist(destination).map_err(|e| e.error)?;
        Ok(())
    }

    fn resolve_datum(&self, reference: &str) -> ValohaiResult<ResolvedDatum> {
        let api = self.datum_api.as_ref().ok_or_else(|| {
            ValohaiError::Config(format!(
                "cannot resolve {reference}: set {} (and optionally {}) to download datums",
                crate::api::TOKEN_VAR,
                crate::api::HOST_VAR
            ))
        })?;
        api.resolve(&self.client, reference)
    }

    fn request_input_urls(&self, input_id: &str) -> ValohaiResult<HashMap<String, String>> {
        self.api.request_input_urls(input_id)
    }
}
