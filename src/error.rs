use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("IO error ({context}): {source}")]
    BlockIo {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error reading source of {file}: {source}")]
    SourceIo {
        file: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Source of {file} changed during upload: expected {expected} bytes, found {actual}")]
    SourceChanged { file: String, expected: u64, actual: u64 },

    #[error("Source file not found: {0}")]
    SourceNotFound(String),

    #[error("File not found in metadata: {0}")]
    FileNotFound(String),

    #[error("Block {block} of {file} missing from node {node}")]
    BlockNotFound { file: String, block: u64, node: String },

    #[error("Checksum mismatch for block {block} of {file} on node {node}")]
    ChecksumMismatch { file: String, block: u64, node: String },

    #[error("File {file} is recorded with {recorded} blocks, got {requested}")]
    ConsistencyMismatch { file: String, recorded: u64, requested: u64 },

    #[error("Unknown node: {0}")]
    UnknownNode(String),

    #[error("Duplicate node: {0}")]
    DuplicateNode(String),

    #[error("No storage nodes registered")]
    NoNodes,

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl Error {
    /// Wrap an IO error with the (file, block, node) it happened on.
    pub fn block_io(file: &str, block: u64, node: &str, source: std::io::Error) -> Error {
        Error::BlockIo {
            context: format!("file={file} block={block} node={node}"),
            source,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::SourceNotFound(_) | Error::FileNotFound(_) | Error::BlockNotFound { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
