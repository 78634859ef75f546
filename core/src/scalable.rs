//! The production index: stages postings in memory, flushes partial indexes
//! every `threshold` documents, merges them in the background and promotes
//! the survivor to the canonical files on [`Index::cleanup`].

use crate::config::IndexConfig;
use crate::error::{Error, Result};
use crate::generation::GenerationId;
use crate::index::{DocId, DocMeta, DocTable, Index};
use crate::merge::{MergeContext, MergeWorker};
use crate::persist::{
    promote_generation, remove_stale_generations, save_meta, save_token_index, IndexPaths, MetaFile, META_VERSION,
};
use crate::postings::PostingsList;
use crate::reader::IndexReader;
use crate::staging::StagingIndex;
use crate::vocab::{SharedVocabulary, Vocabulary};
use crate::writer::write_generation;
use std::fs::create_dir_all;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use time::format_description::well_known::Rfc3339;

/// Counters describing the build so far.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BuildStats {
    pub flushes: u32,
    pub merges: u64,
    /// Collisions while writing partial indexes.
    pub collisions: u64,
    /// Collisions while writing merged indexes, summed over every merge.
    pub merge_collisions: u64,
    pub docs: u32,
    pub unique_tokens: usize,
}

pub struct PersistentIndex {
    config: IndexConfig,
    paths: IndexPaths,
    vocab: SharedVocabulary,
    staging: StagingIndex,
    /// Doc-info recorded since the last flush.
    pending_docs: DocTable,
    docs_recorded: u32,
    next_flush: u32,
    last_flushed_id: DocId,
    collisions: Arc<AtomicU64>,
    merge_collisions: Arc<AtomicU64>,
    /// Collisions in the dictionary that will be promoted.
    survivor_collisions: Arc<AtomicU64>,
    merges: Arc<AtomicU64>,
    worker: Option<MergeWorker>,
    reader: Option<IndexReader>,
    finalized: bool,
}

impl PersistentIndex {
    /// Opens the index directory, creating it if needed. A finalized index
    /// already there stays queryable until this build replaces it.
    pub fn open(config: IndexConfig) -> Result<Self> {
        config.validate()?;
        let paths = IndexPaths::new(&config.index_dir);
        create_dir_all(&paths.root)?;

        let stale = remove_stale_generations(&paths)?;
        if stale > 0 {
            tracing::warn!(stale, root = %paths.root.display(), "removed generation files from an interrupted build");
        }

        let reader = if paths.is_finalized() {
            Some(IndexReader::open(&paths, config.cache_capacity)?)
        } else {
            None
        };

        Ok(Self {
            config,
            paths,
            vocab: Vocabulary::shared(),
            staging: StagingIndex::new(),
            pending_docs: DocTable::new(),
            docs_recorded: 0,
            next_flush: 0,
            last_flushed_id: 0,
            collisions: Arc::new(AtomicU64::new(0)),
            merge_collisions: Arc::new(AtomicU64::new(0)),
            survivor_collisions: Arc::new(AtomicU64::new(0)),
            merges: Arc::new(AtomicU64::new(0)),
            worker: None,
            reader,
            finalized: false,
        })
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn reader(&self) -> Option<&IndexReader> {
        self.reader.as_ref()
    }

    pub fn vocabulary(&self) -> SharedVocabulary {
        Arc::clone(&self.vocab)
    }

    pub fn stats(&self) -> BuildStats {
        BuildStats {
            flushes: self.next_flush,
            merges: self.merges.load(Ordering::Relaxed),
            collisions: self.collisions.load(Ordering::Relaxed),
            merge_collisions: self.merge_collisions.load(Ordering::Relaxed),
            docs: self.docs_recorded,
            unique_tokens: self.vocab.read().len(),
        }
    }

    fn intern(&mut self, token: &str) -> u32 {
        if let Some(id) = self.vocab.read().id(token) {
            return id;
        }
        self.vocab.write().intern(token)
    }

    /// Writes the staged postings as the next generation and hands it to the
    /// merge worker. Generation 0 seeds the worker's accumulator.
    fn flush(&mut self) -> Result<()> {
        let generation = GenerationId::flush(self.next_flush);
        let stats = {
            let vocab = self.vocab.read();
            write_generation(
                &self.paths,
                generation,
                self.config.table_size,
                self.config.entry_delimiter,
                &self.staging,
                &vocab,
                &self.pending_docs,
            )?
        };
        self.next_flush += 1;
        self.collisions.fetch_add(stats.collisions, Ordering::Relaxed);
        self.staging.clear();
        self.pending_docs.clear();

        if generation.is_initial() {
            self.survivor_collisions.store(stats.collisions, Ordering::Relaxed);
            let ctx = MergeContext {
                paths: self.paths.clone(),
                table_size: self.config.table_size,
                entry_delimiter: self.config.entry_delimiter,
                vocab: Arc::clone(&self.vocab),
                merge_collisions: Arc::clone(&self.merge_collisions),
                survivor_collisions: Arc::clone(&self.survivor_collisions),
                merges: Arc::clone(&self.merges),
            };
            self.worker = Some(MergeWorker::spawn(ctx, generation, self.config.merge_queue_depth)?);
            return Ok(());
        }
        self.worker
            .as_mut()
            .ok_or_else(|| Error::MergeWorker("no merge worker for a later generation".into()))?
            .enqueue(generation)
    }

    /// Moves the merged generation into place and reopens it for reading.
    fn finalize(&mut self, survivor: GenerationId) -> Result<()> {
        tracing::info!(%survivor, root = %self.paths.root.display(), "moving files into place");
        // Release the mappings of any previous canonical files first.
        self.reader = None;

        promote_generation(&self.paths, survivor)?;
        let vocab = self.vocab.read();
        save_token_index(&self.paths.token_index(), &vocab)?;
        let meta = MetaFile {
            version: META_VERSION,
            created_at: time::OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_else(|_| "".into()),
            num_docs: self.docs_recorded,
            unique_tokens: vocab.len() as u32,
            collisions: self.survivor_collisions.load(Ordering::Relaxed),
            table_size: self.config.table_size,
            entry_delimiter: self.config.entry_delimiter,
            tokenizer: self.config.tokenizer,
        };
        drop(vocab);
        save_meta(&self.paths, &meta)?;

        self.reader = Some(IndexReader::open(&self.paths, self.config.cache_capacity)?);
        Ok(())
    }
}

impl Index for PersistentIndex {
    fn insert(&mut self, token: &str, doc_id: DocId, offset: u32) -> Result<()> {
        if self.finalized {
            return Err(Error::Finalized);
        }
        if doc_id % self.config.threshold == 0 && doc_id != self.last_flushed_id {
            self.flush()?;
            self.last_flushed_id = doc_id;
        }
        let token_id = self.intern(token);
        self.staging.insert(token_id, doc_id, offset);
        Ok(())
    }

    fn record_document(&mut self, doc_id: DocId, name: &str, length: u32) {
        self.pending_docs.insert(doc_id, DocMeta { name: name.to_string(), length });
        self.docs_recorded += 1;
    }

    /// Served from the canonical files: before the first `cleanup` only a
    /// previously finalized index is visible.
    fn get_postings(&self, token: &str) -> Result<Option<Arc<PostingsList>>> {
        match &self.reader {
            Some(reader) => reader.get_postings(token),
            None => Ok(None),
        }
    }

    fn cleanup(&mut self) -> Result<()> {
        if self.finalized {
            return Err(Error::Finalized);
        }
        self.finalized = true;

        tracing::info!("writing last partial index to disk");
        self.flush()?;

        tracing::info!("running final disk merges");
        let worker = self
            .worker
            .take()
            .ok_or_else(|| Error::MergeWorker("no merge worker after the final flush".into()))?;
        let survivor = worker.finish()?;

        let stats = self.stats();
        tracing::info!(
            unique_tokens = stats.unique_tokens,
            collisions = stats.collisions,
            merge_collisions = stats.merge_collisions,
            flushes = stats.flushes,
            merges = stats.merges,
            "index built"
        );
        self.finalize(survivor)
    }
}
