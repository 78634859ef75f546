use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Corrupt index data: {0}")]
    Corrupt(String),

    #[error("Dictionary table is full ({table_size} buckets)")]
    TableFull { table_size: u64 },

    #[error("Refusing to store an empty postings list for {0:?}")]
    EmptyPostings(String),

    #[error("Index has already been finalized")]
    Finalized,

    #[error("Merge worker failed: {0}")]
    MergeWorker(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        Error::Corrupt(msg.into())
    }
}
