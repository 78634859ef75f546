use crate::error::{Error, Result};
use crate::hash::{primary_hash, secondary_hash};
use crate::index::{DocId, DocMeta, DocTable};
use crate::persist::{load_doc_info, load_meta, load_token_index, IndexPaths, MetaFile};
use crate::postings::PostingsList;
use crate::storage::data::blob_at;
use crate::storage::dictionary::map_file;
use crate::storage::{MappedDictionary, SlotSource};
use crate::vocab::Vocabulary;
use lru::LruCache;
use memmap2::Mmap;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::{Arc, OnceLock};

/// Query-time view of a finalized index.
///
/// The canonical files are immutable once promoted, so they are mapped
/// read-only and the reader can be shared across threads; only the postings
/// cache needs a lock.
pub struct IndexReader {
    paths: IndexPaths,
    meta: MetaFile,
    dictionary: MappedDictionary,
    data: Option<Mmap>,
    docs: DocTable,
    /// Loaded on first use; only listing needs it.
    vocab: OnceLock<Vocabulary>,
    cache: Mutex<LruCache<String, Arc<PostingsList>>>,
}

impl IndexReader {
    pub fn open(paths: &IndexPaths, cache_capacity: usize) -> Result<Self> {
        let capacity = NonZeroUsize::new(cache_capacity)
            .ok_or_else(|| Error::Config("cache_capacity must be positive".into()))?;
        let meta = load_meta(paths)?;
        crate::config::validate_delimiter(meta.entry_delimiter)?;
        let dictionary = MappedDictionary::open(&paths.dictionary(), meta.table_size)?;
        let data = map_file(&paths.data())?;
        let docs = load_doc_info(&paths.doc_info())?;
        tracing::info!(
            root = %paths.root.display(),
            num_docs = docs.len(),
            unique_tokens = meta.unique_tokens,
            "opened index"
        );
        Ok(Self {
            paths: paths.clone(),
            meta,
            dictionary,
            data,
            docs,
            vocab: OnceLock::new(),
            cache: Mutex::new(LruCache::new(capacity)),
        })
    }

    /// Postings for `token`, or `None` when it was never indexed.
    pub fn get_postings(&self, token: &str) -> Result<Option<Arc<PostingsList>>> {
        if let Some(hit) = self.cache.lock().get(token) {
            return Ok(Some(Arc::clone(hit)));
        }

        let primary = primary_hash(token, self.meta.table_size);
        let Some(entry) = self.dictionary.find_entry(primary, secondary_hash(token))? else {
            return Ok(None);
        };
        let bytes = blob_at(self.data.as_deref().unwrap_or_default(), entry.offset, entry.length)?;
        let text = std::str::from_utf8(bytes)
            .map_err(|_| Error::corrupt(format!("postings blob for {token:?} is not UTF-8")))?;
        let list = Arc::new(PostingsList::decode(text, self.meta.entry_delimiter)?);
        tracing::trace!(token, entries = list.len(), "postings loaded");

        self.cache.lock().put(token.to_string(), Arc::clone(&list));
        Ok(Some(list))
    }

    pub fn meta(&self) -> &MetaFile {
        &self.meta
    }

    pub fn docs(&self) -> &DocTable {
        &self.docs
    }

    pub fn doc(&self, doc_id: DocId) -> Option<&DocMeta> {
        self.docs.get(&doc_id)
    }

    pub fn doc_name(&self, doc_id: DocId) -> Option<&str> {
        self.docs.get(&doc_id).map(|d| d.name.as_str())
    }

    pub fn doc_length(&self, doc_id: DocId) -> Option<u32> {
        self.docs.get(&doc_id).map(|d| d.length)
    }

    pub fn num_docs(&self) -> usize {
        self.docs.len()
    }

    /// The token table written at finalization.
    pub fn vocabulary(&self) -> Result<&Vocabulary> {
        if let Some(vocab) = self.vocab.get() {
            return Ok(vocab);
        }
        let loaded = load_token_index(&self.paths.token_index())?;
        Ok(self.vocab.get_or_init(|| loaded))
    }
}
