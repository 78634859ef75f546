use crate::error::Result;
use crate::postings::PostingsList;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

pub type TokenId = u32;
pub type DocId = u32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocMeta {
    pub name: String,
    /// Number of tokens in the document.
    pub length: u32,
}

pub type DocTable = BTreeMap<DocId, DocMeta>;

/// What every index variant offers the ingestion loop and the searchers.
pub trait Index {
    /// Records one occurrence of `token` at `offset` in `doc_id`. All tokens of
    /// a document must be inserted before the next document starts.
    fn insert(&mut self, token: &str, doc_id: DocId, offset: u32) -> Result<()>;

    fn record_document(&mut self, doc_id: DocId, name: &str, length: u32);

    /// `Ok(None)` when the token is not in the index.
    fn get_postings(&self, token: &str) -> Result<Option<Arc<PostingsList>>>;

    /// Called once ingestion is done.
    fn cleanup(&mut self) -> Result<()>;
}

/// Main-memory index with no persistence; a reference for the on-disk one.
#[derive(Default)]
pub struct HashedIndex {
    postings: HashMap<String, PostingsList>,
    docs: DocTable,
}

impl HashedIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn docs(&self) -> &DocTable {
        &self.docs
    }

    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.postings.keys().map(String::as_str)
    }
}

impl Index for HashedIndex {
    fn insert(&mut self, token: &str, doc_id: DocId, offset: u32) -> Result<()> {
        self.postings.entry(token.to_string()).or_default().add(doc_id, offset);
        Ok(())
    }

    fn record_document(&mut self, doc_id: DocId, name: &str, length: u32) {
        self.docs.insert(doc_id, DocMeta { name: name.to_string(), length });
    }

    fn get_postings(&self, token: &str) -> Result<Option<Arc<PostingsList>>> {
        Ok(self.postings.get(token).cloned().map(Arc::new))
    }

    fn cleanup(&mut self) -> Result<()> {
        Ok(())
    }
}
