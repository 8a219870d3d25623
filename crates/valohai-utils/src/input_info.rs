use crate::download::{download_url, DownloadType, Fetcher};
use crate::error::{ValohaiError, ValohaiResult};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

const DATUM_SCHEME: &str = "datum://";

/// One file of an input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, deserialize_with = "lenient_checksums", skip_serializing_if = "BTreeMap::is_empty")]
    pub checksums: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datum_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_list", skip_serializing_if = "Vec::is_empty")]
    pub metadata: Vec<Value>,
}

impl FileInfo {
    pub fn remote(uri: impl Into<String>) -> Self {
        let uri = uri.into();
        let datum_id = uri.strip_prefix(DATUM_SCHEME).map(str::to_string);
        Self {
            name: uri_to_filename(&uri).to_string(),
            uri: Some(uri),
            path: None,
            size: None,
            checksums: BTreeMap::new(),
            datum_id,
            metadata: Vec::new(),
        }
    }

    pub fn local(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            uri: None,
            path: Some(path.into()),
            size: None,
            checksums: BTreeMap::new(),
            datum_id: None,
            metadata: Vec::new(),
        }
    }

    /// The local path, if the file is actually there.
    pub fn local_path(&self) -> Option<&Path> {
        self.path.as_deref().filter(|p| p.is_file())
    }

    pub fn is_datum(&self) -> bool {
        self.uri.as_deref().is_some_and(|u| u.starts_with(DATUM_SCHEME))
    }

    fn normalize(&mut self) {
        if self.uri.as_deref().is_some_and(str::is_empty) {
            self.uri = None;
        }
        if self.datum_id.is_none() {
            self.datum_id = self.uri.as_deref().and_then(|u| u.strip_prefix(DATUM_SCHEME)).map(str::to_string);
        }
    }
}

/// The files behind one named input, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputInfo {
    #[serde(default)]
    pub files: Vec<FileInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_id: Option<String>,
}

impl InputInfo {
    /// Parse one entry of `inputs.json`.
    ///
    /// Every file needs a `uri` or a `path`, unless the input carries an
    /// `input_id` to request URLs with later.
    pub fn from_json(name: &str, value: &Value) -> ValohaiResult<Self> {
        let mut info: Self = serde_json::from_value(value.clone())
            .map_err(|e| ValohaiError::Config(format!("invalid configuration for input {name}: {e}")))?;
        for file in &mut info.files {
            file.normalize();
            if file.uri.is_none() && file.path.is_none() && info.input_id.is_none() {
                return Err(ValohaiError::Config(format!(
                    "file {} of input {name} has neither a uri nor a path",
                    file.name
                )));
            }
        }
        Ok(info)
    }

    /// Build from declared defaults or command-line values.
    ///
    /// Values with a URL scheme are remote. Anything else is a local path,
    /// expanded as a glob when it contains wildcards.
    pub fn from_urls_and_paths(values: &[String]) -> ValohaiResult<Self> {
        let mut files = Vec::new();
        for value in values {
            if has_url_scheme(value) {
                files.push(FileInfo::remote(value.clone()));
            } else if value.contains(['*', '?', '[']) {
                files.extend(expand_local_glob(value)?);
            } else {
                let path = PathBuf::from(value);
                let name = path.file_name().map_or_else(|| value.clone(), |n| n.to_string_lossy().into_owned());
                files.push(FileInfo::local(name, path));
            }
        }
        Ok(Self { files, input_id: None })
    }

    pub fn is_downloaded(&self) -> bool {
        self.files.iter().all(|f| f.local_path().is_some())
    }

    /// Make every file available under `dir`, per `download_type`.
    ///
    /// Files that already have a local copy are left alone unless the
    /// download is forced, so repeated calls fetch nothing new.
    pub fn download_if_necessary(&mut self, dir: &Path, download_type: DownloadType, fetcher: &dyn Fetcher) -> ValohaiResult<()> {
        if download_type == DownloadType::Never {
            return Ok(());
        }
        self.request_missing_urls(fetcher)?;

        for file in &mut self.files {
            if download_type == DownloadType::Optional && file.local_path().is_some() {
                continue;
            }
            let Some(uri) = file.uri.clone() else {
                if file.path.is_none() {
                    return Err(ValohaiError::Config(format!("no download URL for input file {}", file.name)));
                }
                continue;
            };

            let url = if file.is_datum() {
                let datum = fetcher.resolve_datum(&uri)?;
                file.name = datum.name;
                file.datum_id = Some(datum.id);
                datum.url
            } else {
                uri
            };
            let destination = dir.join(relative_name(&file.name));
            file.path = Some(download_url(fetcher, &url, &destination, download_type == DownloadType::Always)?);
        }
        Ok(())
    }

    fn request_missing_urls(&mut self, fetcher: &dyn Fetcher) -> ValohaiResult<()> {
        let Some(input_id) = self.input_id.as_deref() else {
            return Ok(());
        };
        if !self.files.iter().any(|f| f.uri.is_none() && f.local_path().is_none()) {
            return Ok(());
        }
        let urls = fetcher.request_input_urls(input_id)?;
        for file in self.files.iter_mut().filter(|f| f.uri.is_none()) {
            file.uri = urls.get(&file.name).cloned();
        }
        Ok(())
    }
}

/// Last path segment of a URI, without the query string.
pub fn uri_to_filename(uri: &str) -> &str {
    let without_query = uri.split('?').next().unwrap_or(uri);
    without_query.rsplit('/').next().unwrap_or(without_query)
}

fn has_url_scheme(value: &str) -> bool {
    let Some((scheme, _)) = value.split_once("://") else {
        return false;
    };
    let mut chars = scheme.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Glob matches, named by their path below the pattern's literal prefix.
fn expand_local_glob(pattern: &str) -> ValohaiResult<Vec<FileInfo>> {
    let base: PathBuf = Path::new(pattern)
        .components()
        .take_while(|c| !c.as_os_str().to_string_lossy().contains(['*', '?', '[']))
        .collect();

    let mut files = Vec::new();
    for entry in glob::glob(pattern)? {
        let path = entry.map_err(glob::GlobError::into_error)?;
        if !path.is_file() {
            continue;
        }
        let name = path
            .strip_prefix(&base)
            .unwrap_or(&path)
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        files.push(FileInfo::local(name, path));
    }
    Ok(files)
}

fn relative_name(name: &str) -> PathBuf {
    Path::new(name)
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part),
            _ => None,
        })
        .collect()
}

fn lenient_checksums<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Object(map)) => {
            map.into_iter().filter_map(|(alg, digest)| digest.as_str().map(|d| (alg, d.to_string()))).collect()
        }
        _ => BTreeMap::new(),
    })
}

fn lenient_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Value>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Array(items)) => items,
        Some(Value::Null) | None => Vec::new(),
        Some(other) => vec![other],
    })
}
