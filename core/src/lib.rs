//! Persistent, scalable hashed inverted index.
//!
//! Documents are staged in memory, flushed to numbered on-disk generations
//! once a document-count threshold is crossed, merged pairwise by a background
//! worker and finally promoted to the canonical `dictionary` / `data` /
//! `docInfo` files that [`IndexReader`] serves queries from.

pub mod config;
pub mod error;
pub mod generation;
pub mod hash;
pub mod index;
pub mod merge;
pub mod persist;
pub mod postings;
pub mod reader;
pub mod scalable;
pub mod search;
pub mod staging;
pub mod storage;
pub mod tokenizer;
pub mod vocab;
pub mod writer;

pub use config::IndexConfig;
pub use error::{Error, Result};
pub use generation::GenerationId;
pub use index::{DocId, DocMeta, DocTable, HashedIndex, Index, TokenId};
pub use postings::{PostingsEntry, PostingsList};
pub use reader::IndexReader;
pub use scalable::{BuildStats, PersistentIndex};
pub use search::{QueryMode, Searcher};
pub use vocab::{SharedVocabulary, Vocabulary};
