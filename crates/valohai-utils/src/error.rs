use thiserror::Error;

pub type ValohaiResult<T> = std::result::Result<T, ValohaiError>;

#[derive(Debug, Error)]
pub enum ValohaiError {
    /// A contract violation in declared defaults, config files or output paths.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("distributed config error: {0}")]
    Distributed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Vfs(#[from] valohai_vfs::VfsError),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),

    #[error(transparent)]
    Pattern(#[from] glob::PatternError),
}

impl ValohaiError {
    /// Missing files and malformed JSON, the two failures capability probes treat as "no".
    pub fn is_absent_or_malformed(&self) -> bool {
        match self {
            Self::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            Self::Json(_) => true,
            _ => false,
        }
    }
}
