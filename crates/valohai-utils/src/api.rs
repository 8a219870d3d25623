//! Calls against the Valohai API.
//!
//! Inside an execution the platform writes presigned endpoints to `api.json`;
//! `ApiClient` sends requests to those by name. `DatumApi` resolves
//! `datum://` references with user credentials for local runs.

use crate::error::{ValohaiError, ValohaiResult};
use crate::paths::EnvSource;
use reqwest::blocking::{Client, Response};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const HOST_VAR: &str = "VALOHAI_HOST";
pub const TOKEN_VAR: &str = "VALOHAI_TOKEN";
pub const PROJECT_VAR: &str = "VALOHAI_PROJECT";

const DEFAULT_HOST: &str = "https://app.valohai.com";
const SET_STATUS_DETAIL: &str = "set_status_detail";
const INPUT_REQUEST: &str = "input_request";

pub(crate) fn build_client() -> ValohaiResult<Client> {
    Ok(Client::builder().connect_timeout(Duration::from_secs(30)).build()?)
}

/// A presigned call from `api.json`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApiEndpoint {
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

fn default_method() -> String {
    "GET".to_string()
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    config_path: PathBuf,
}

impl ApiClient {
    pub fn new(config_path: PathBuf) -> ValohaiResult<Self> {
        Ok(Self::with_client(build_client()?, config_path))
    }

    pub fn with_client(client: Client, config_path: PathBuf) -> Self {
        Self { client, config_path }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Look up a named endpoint. A missing or malformed `api.json` propagates.
    pub fn endpoint(&self, name: &str) -> ValohaiResult<ApiEndpoint> {
        let config: Value = serde_json::from_slice(&std::fs::read(&self.config_path)?)?;
        let value = config
            .get(name)
            .filter(|v| v.get("url").and_then(Value::as_str).is_some_and(|url| !url.is_empty()))
            .ok_or_else(|| ValohaiError::Api(format!("Invalid API config for {name}")))?;
        Ok(serde_json::from_value(value.clone())?)
    }

    /// Send a request to a named endpoint, failing on any non-2xx status.
    pub fn send(&self, name: &str, body: Option<&Value>, query: &[(&str, &str)]) -> ValohaiResult<Response> {
        let endpoint = self.endpoint(name)?;
        let method = Method::from_bytes(endpoint.method.to_ascii_uppercase().as_bytes())
            .map_err(|_| ValohaiError::Api(format!("invalid method {} for {name}", endpoint.method)))?;

        let mut request = self.client.request(method, &endpoint.url);
        for (key, value) in &endpoint.headers {
            request = request.header(key, value);
        }
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        tracing::debug!(endpoint = name, "sending API request");
        Ok(request.send()?.error_for_status()?)
    }

    /// Update the execution's status detail. Never fails the caller.
    pub fn set_status_detail(&self, detail: &str) {
        if !self.config_path.is_file() {
            tracing::debug!("no API config; not setting status detail");
            return;
        }
        if let Err(e) = self.send(SET_STATUS_DETAIL, Some(&json!({ "status_detail": detail })), &[]) {
            tracing::warn!(error = %e, "failed to set status detail");
        }
    }

    /// Ask the platform for download URLs of every file in a bulk input.
    ///
    /// Accepts either a flat `{name: url}` object or `{"files": [{"name", "url"}]}`.
    pub fn request_input_urls(&self, input_id: &str) -> ValohaiResult<HashMap<String, String>> {
        let response: Value = self.send(INPUT_REQUEST, Some(&json!({ "input_id": input_id })), &[])?.json()?;
        parse_input_urls(&response)
            .ok_or_else(|| ValohaiError::Api(format!("unexpected input_request response for input {input_id}")))
    }
}

fn parse_input_urls(response: &Value) -> Option<HashMap<String, String>> {
    if let Some(files) = response.get("files").and_then(Value::as_array) {
        return files
            .iter()
            .map(|f| Some((f.get("name")?.as_str()?.to_string(), f.get("url")?.as_str()?.to_string())))
            .collect();
    }
    response.as_object()?.iter().map(|(k, v)| Some((k.clone(), v.as_str()?.to_string()))).collect()
}

/// A datum resolved to something downloadable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDatum {
    pub id: String,
    pub name: String,
    pub url: String,
}

#[derive(Debug, Deserialize)]
struct DatumRecord {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct AliasResolution {
    datum: DatumRecord,
}

#[derive(Debug, Deserialize)]
struct DatumDownload {
    url: String,
}

/// Credentials for resolving `datum://` references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatumApi {
    host: String,
    token: String,
    project: Option<String>,
}

impl DatumApi {
    pub fn new(host: impl Into<String>, token: impl Into<String>, project: Option<String>) -> Self {
        Self { host: host.into().trim_end_matches('/').to_string(), token: token.into(), project }
    }

    /// `None` unless a token is configured.
    pub fn from_env(env: &dyn EnvSource) -> Option<Self> {
        let token = env.get(TOKEN_VAR)?;
        let host = env.get(HOST_VAR).unwrap_or_else(|| DEFAULT_HOST.to_string());
        Some(Self::new(host, token, env.get(PROJECT_VAR)))
    }

    /// Resolve `datum://<id>` or `datum://<alias>`.
    pub fn resolve(&self, client: &Client, reference: &str) -> ValohaiResult<ResolvedDatum> {
        let key = reference.strip_prefix("datum://").unwrap_or(reference);
        let record = if uuid::Uuid::parse_str(key).is_ok() {
            self.get(client, &format!("{}/api/v0/data/{key}/", self.host), &[])?.json::<DatumRecord>()?
        } else {
            let project = self.project.as_deref().ok_or_else(|| {
                ValohaiError::Config(format!("resolving datum alias {key} requires {PROJECT_VAR} to be set"))
            })?;
            let url = format!("{}/api/v0/datum-aliases/resolve/", self.host);
            self.get(client, &url, &[("name", key), ("project", project)])?.json::<AliasResolution>()?.datum
        };

        let download: DatumDownload =
            self.get(client, &format!("{}/api/v0/data/{}/download/", self.host, record.id), &[])?.json()?;
        tracing::info!(datum = key, name = %record.name, "resolved datum");
        Ok(ResolvedDatum { id: record.id, name: record.name, url: download.url })
    }

    fn get(&self, client: &Client, url: &str, query: &[(&str, &str)]) -> ValohaiResult<Response> {
        let response = client
            .get(url)
            .query(query)
            .header("Authorization", format!("Token {}", self.token))
            .send()?;
        Ok(response.error_for_status()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_api_config(dir: &Path, server_url: &str) -> PathBuf {
        let path = dir.join("api.json");
        let config = json!({
            "set_status_detail": {"url": format!("{server_url}/status/"), "method": "post"},
            "input_request": {"url": format!("{server_url}/inputs/"), "method": "POST"},
            "broken": {"method": "GET"},
        });
        std::fs::write(&path, config.to_string()).unwrap();
        path
    }

    #[test]
    fn test_endpoint_lookup() {
        let temp = TempDir::new().unwrap();
        let client = ApiClient::new(write_api_config(temp.path(), "http://localhost:1")).unwrap();

        let endpoint = client.endpoint("set_status_detail").unwrap();
        assert_eq!(endpoint.method, "post");
        assert!(endpoint.url.ends_with("/status/"));

        assert!(matches!(client.endpoint("broken"), Err(ValohaiError::Api(_))));
        assert!(matches!(client.endpoint("missing"), Err(ValohaiError::Api(_))));
    }

    #[test]
    fn test_missing_api_config_propagates() {
        let client = ApiClient::new(PathBuf::from("/nonexistent/api.json")).unwrap();
        assert!(matches!(client.endpoint("set_status_detail"), Err(ValohaiError::Io(_))));
        // Silent, not a panic or error.
        client.set_status_detail("hello");
    }

    #[test]
    fn test_set_status_detail_posts_json() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/status/")
            .match_body(mockito::Matcher::Json(json!({"status_detail": "epoch 3/10"})))
            .with_status(204)
            .create();

        let temp = TempDir::new().unwrap();
        let client = ApiClient::new(write_api_config(temp.path(), &server.url())).unwrap();
        client.set_status_detail("epoch 3/10");
        mock.assert();
    }

    #[test]
    fn test_request_input_urls() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/inputs/")
            .match_body(mockito::Matcher::Json(json!({"input_id": "abc"})))
            .with_header("content-type", "application/json")
            .with_body(r#"{"a.txt": "https://files/a.txt", "b.txt": "https://files/b.txt"}"#)
            .create();

        let temp = TempDir::new().unwrap();
        let client = ApiClient::new(write_api_config(temp.path(), &server.url())).unwrap();
        let urls = client.request_input_urls("abc").unwrap();
        assert_eq!(urls["b.txt"], "https://files/b.txt");
        mock.assert();
    }

    #[test]
    fn test_send_with_query_fails_on_error_status() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/inputs/")
            .match_query(mockito::Matcher::UrlEncoded("page".into(), "2".into()))
            .with_status(500)
            .create();

        let temp = TempDir::new().unwrap();
        let client = ApiClient::new(write_api_config(temp.path(), &server.url())).unwrap();
        let err = client.send("input_request", None, &[("page", "2")]).unwrap_err();
        assert!(matches!(err, ValohaiError::Http(_)));
        mock.assert();
    }

    #[test]
    fn test_parse_input_urls_file_list() {
        let urls = parse_input_urls(&json!({"files": [{"name": "x", "url": "https://u/x"}]})).unwrap();
        assert_eq!(urls["x"], "https://u/x");
        assert!(parse_input_urls(&json!({"x": 1})).is_none());
    }

    #[test]
    fn test_datum_api_from_env() {
        let env: HashMap<String, String> = HashMap::from([(TOKEN_VAR.to_string(), "t".to_string())]);
        let api = DatumApi::from_env(&env).unwrap();
        assert_eq!(api.host, DEFAULT_HOST);
        assert!(DatumApi::from_env(&HashMap::<String, String>::new()).is_none());
    }
}
