use thiserror::Error;

pub type VfsResult<T> = std::result::Result<T, VfsError>;

#[derive(Debug, Error)]
pub enum VfsError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("invalid filter pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("unsupported archive: {0}")]
    UnsupportedArchive(String),

    #[error("archive handle poisoned: {0}")]
    Poisoned(String),
}

impl From<VfsError> for std::io::Error {
    fn from(err: VfsError) -> Self {
        match err {
            VfsError::Io(e) => e,
            other => Self::other(other.to_string()),
        }
    }
}
