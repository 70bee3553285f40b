use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexError>;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Metadata error: {0}")]
    MetadataError(#[from] keyhint_metadata::MetadataError),

    #[error("Archive error: {0}")]
    ArchiveError(#[from] zip::result::ZipError),

    #[error("Unknown module: {0}")]
    UnknownModule(String),

    #[error("Not a classpath container: {0}")]
    InvalidRoot(String),

    #[error("Watcher error: {0}")]
    WatcherError(String),

    #[error("{0}")]
    Other(String),
}
