use crate::error::{Error, Result};
use crate::postings::FIELD_DELIM;
use crate::tokenizer::TokenizerOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Number of buckets in the on-disk dictionary hash table.
pub const DEFAULT_TABLE_SIZE: u64 = 611_953;

/// Documents per partial index. Default 8192.
pub const DEFAULT_THRESHOLD: u32 = 1 << 13;

pub const DEFAULT_ENTRY_DELIM: char = ':';

pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

pub const DEFAULT_MERGE_QUEUE_DEPTH: usize = 4;

/// Settings for building (and later reading) a persistent index.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Directory holding every canonical and generation file.
    pub index_dir: PathBuf,
    pub table_size: u64,
    /// A partial index is flushed whenever a document ID that is a multiple
    /// of this value starts being inserted.
    pub threshold: u32,
    /// Separates postings entries inside a data blob.
    pub entry_delimiter: char,
    /// Postings lists kept by the reader's read-through cache.
    pub cache_capacity: usize,
    /// Flushed generations allowed to wait for the merge worker before
    /// `insert` blocks.
    pub merge_queue_depth: usize,
    pub tokenizer: TokenizerOptions,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            index_dir: PathBuf::from("./index"),
            table_size: DEFAULT_TABLE_SIZE,
            threshold: DEFAULT_THRESHOLD,
            entry_delimiter: DEFAULT_ENTRY_DELIM,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            merge_queue_depth: DEFAULT_MERGE_QUEUE_DEPTH,
            tokenizer: TokenizerOptions::default(),
        }
    }
}

impl IndexConfig {
    pub fn new<P: AsRef<Path>>(index_dir: P) -> Self {
        Self { index_dir: index_dir.as_ref().to_path_buf(), ..Self::default() }
    }

    pub fn with_threshold(mut self, threshold: u32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_table_size(mut self, table_size: u64) -> Self {
        self.table_size = table_size;
        self
    }

    pub fn with_merge_queue_depth(mut self, depth: usize) -> Self {
        self.merge_queue_depth = depth;
        self
    }

    pub fn with_tokenizer(mut self, tokenizer: TokenizerOptions) -> Self {
        self.tokenizer = tokenizer;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.table_size == 0 || self.table_size > u32::MAX as u64 {
            return Err(Error::Config(format!(
                "table_size must be in 1..={}, got {}",
                u32::MAX,
                self.table_size
            )));
        }
        if self.threshold == 0 {
            return Err(Error::Config("threshold must be positive".into()));
        }
        if self.cache_capacity == 0 {
            return Err(Error::Config("cache_capacity must be positive".into()));
        }
        if self.merge_queue_depth == 0 {
            return Err(Error::Config("merge_queue_depth must be positive".into()));
        }
        validate_delimiter(self.entry_delimiter)
    }
}

/// The entry delimiter must never appear inside a serialized entry.
pub(crate) fn validate_delimiter(delim: char) -> Result<()> {
    if delim == FIELD_DELIM || delim.is_ascii_digit() || delim.is_whitespace() || delim == '-' {
        return Err(Error::Config(format!("{delim:?} cannot separate postings entries")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = IndexConfig::new("/tmp/idx");
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.table_size, 611_953);
        assert_eq!(cfg.threshold, 8192);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(IndexConfig::new("x").with_threshold(0).validate().is_err());
        assert!(IndexConfig::new("x").with_table_size(0).validate().is_err());
        assert!(IndexConfig::new("x").with_table_size(u32::MAX as u64 + 1).validate().is_err());
        let mut cfg = IndexConfig::new("x");
        cfg.entry_delimiter = ',';
        assert!(cfg.validate().is_err());
        cfg.entry_delimiter = '7';
        assert!(cfg.validate().is_err());
    }
}
