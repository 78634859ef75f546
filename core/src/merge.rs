//! Pairwise merging of on-disk generations on a dedicated worker thread.
//!
//! The worker owns the accumulator: every generation it receives is merged
//! into it, strictly in the order generations were flushed. Because flushes
//! cover increasing document ranges, a token's postings from the accumulator
//! always precede those of the incoming generation and the two blobs can be
//! concatenated without re-sorting.

use crate::error::{Error, Result};
use crate::generation::GenerationId;
use crate::hash::primary_hash;
use crate::index::TokenId;
use crate::persist::{load_doc_info, load_token_keys, save_doc_info, save_token_keys, IndexPaths};
use crate::storage::{DataFile, DictionaryFile, Entry};
use crate::vocab::SharedVocabulary;
use crossbeam_channel::{bounded, Sender};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

/// Everything a merge needs besides the two generation labels.
#[derive(Clone)]
pub struct MergeContext {
    pub paths: IndexPaths,
    pub table_size: u64,
    pub entry_delimiter: char,
    pub vocab: SharedVocabulary,
    /// Summed over every merged dictionary written so far.
    pub merge_collisions: Arc<AtomicU64>,
    /// Collisions of the most recent merged dictionary alone.
    pub survivor_collisions: Arc<AtomicU64>,
    pub merges: Arc<AtomicU64>,
}

/// An input generation opened for reading.
struct Source {
    dictionary: DictionaryFile,
    data: DataFile,
}

impl Source {
    fn open(ctx: &MergeContext, generation: GenerationId) -> Result<Self> {
        let files = ctx.paths.generation(generation);
        Ok(Self {
            dictionary: DictionaryFile::open(&files.dictionary, ctx.table_size)?,
            data: DataFile::open(&files.data)?,
        })
    }

    fn blob(&mut self, generation: GenerationId, bucket: u32) -> Result<(Entry, Vec<u8>)> {
        let entry = self.dictionary.read(bucket as u64)?.ok_or_else(|| {
            Error::corrupt(format!("token key points at empty bucket {bucket} of generation {generation}"))
        })?;
        let bytes = self.data.read(entry.offset, entry.length)?;
        Ok((entry, bytes))
    }
}

/// Merges `other` into `accumulator`, deletes both inputs and returns the
/// label of the merged generation.
pub fn merge_generations(ctx: &MergeContext, accumulator: GenerationId, other: GenerationId) -> Result<GenerationId> {
    let started = Instant::now();
    let merged = accumulator.merged(other);
    tracing::info!(%accumulator, %other, %merged, "starting merge");

    let acc_files = ctx.paths.generation(accumulator);
    let other_files = ctx.paths.generation(other);
    let out_files = ctx.paths.generation(merged);

    // Doc IDs are unique across generations, so a plain union suffices.
    let mut docs = load_doc_info(&acc_files.doc_info)?;
    docs.extend(load_doc_info(&other_files.doc_info)?);
    save_doc_info(&out_files.doc_info, &docs)?;

    let acc_keys = load_token_keys(&acc_files.token_keys)?;
    let other_keys = load_token_keys(&other_files.token_keys)?;
    let other_buckets: HashMap<TokenId, u32> = other_keys.iter().copied().collect();

    let mut acc = Source::open(ctx, accumulator)?;
    let mut next = Source::open(ctx, other)?;
    let mut data = DataFile::create(&out_files.data)?;
    let mut dictionary = DictionaryFile::create(&out_files.dictionary, ctx.table_size)?;
    let mut merged_keys: Vec<(TokenId, u32)> = Vec::with_capacity(acc_keys.len() + other_keys.len());
    let mut written: HashSet<TokenId> = HashSet::with_capacity(acc_keys.len());
    let delim = ctx.entry_delimiter.to_string();

    for &(token_id, bucket) in &acc_keys {
        let (entry, mut blob) = acc.blob(accumulator, bucket)?;
        if let Some(&other_bucket) = other_buckets.get(&token_id) {
            let (_, tail) = next.blob(other, other_bucket)?;
            blob.extend_from_slice(delim.as_bytes());
            blob.extend_from_slice(&tail);
        }
        let bucket = place(ctx, &mut data, &mut dictionary, token_id, &blob, entry.secondary_hash)?;
        merged_keys.push((token_id, bucket));
        written.insert(token_id);
    }

    for &(token_id, bucket) in &other_keys {
        if written.contains(&token_id) {
            continue;
        }
        let (entry, blob) = next.blob(other, bucket)?;
        let bucket = place(ctx, &mut data, &mut dictionary, token_id, &blob, entry.secondary_hash)?;
        merged_keys.push((token_id, bucket));
    }

    save_token_keys(&out_files.token_keys, &merged_keys)?;
    data.sync()?;
    dictionary.sync()?;
    drop((acc, next));

    acc_files.remove()?;
    other_files.remove()?;

    ctx.merge_collisions.fetch_add(dictionary.collisions(), Ordering::Relaxed);
    ctx.survivor_collisions.store(dictionary.collisions(), Ordering::Relaxed);
    ctx.merges.fetch_add(1, Ordering::Relaxed);
    tracing::info!(
        %merged,
        tokens = merged_keys.len(),
        docs = docs.len(),
        collisions = dictionary.collisions(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "finished merge"
    );
    Ok(merged)
}

/// Appends `blob` and files its entry by probing from the token's primary
/// hash, which is where readers start looking.
fn place(
    ctx: &MergeContext,
    data: &mut DataFile,
    dictionary: &mut DictionaryFile,
    token_id: TokenId,
    blob: &[u8],
    secondary_hash: i32,
) -> Result<u32> {
    let primary = {
        let vocab = ctx.vocab.read();
        let token = vocab
            .token(token_id)
            .ok_or_else(|| Error::corrupt(format!("token id {token_id} missing from vocabulary")))?;
        primary_hash(token, ctx.table_size)
    };
    let offset = data.append(blob)?;
    let bucket = dictionary.insert(primary, &Entry::new(offset, blob.len() as u32, secondary_hash))?;
    Ok(bucket as u32)
}

/// Single background thread merging queued generations into the accumulator.
///
/// The queue is bounded: once `depth` generations are waiting, `enqueue`
/// blocks the ingestion thread until the worker catches up.
pub struct MergeWorker {
    sender: Option<Sender<GenerationId>>,
    handle: Option<JoinHandle<Result<GenerationId>>>,
}

impl MergeWorker {
    pub fn spawn(ctx: MergeContext, accumulator: GenerationId, depth: usize) -> Result<Self> {
        let (sender, receiver) = bounded::<GenerationId>(depth);
        let handle = thread::Builder::new()
            .name("hashdex-merge".into())
            .spawn(move || {
                let mut accumulator = accumulator;
                for generation in receiver.iter() {
                    accumulator = merge_generations(&ctx, accumulator, generation).inspect_err(|e| {
                        tracing::error!(%accumulator, %generation, error = %e, "merge failed");
                    })?;
                }
                Ok(accumulator)
            })?;
        Ok(Self { sender: Some(sender), handle: Some(handle) })
    }

    pub fn enqueue(&mut self, generation: GenerationId) -> Result<()> {
        let sender = self.sender.as_ref().ok_or_else(|| Error::MergeWorker("queue already closed".into()))?;
        tracing::debug!(%generation, queued = sender.len(), "queueing generation for merge");
        if sender.send(generation).is_err() {
            // The worker only drops its receiver when a merge failed.
            return Err(self.join().err().unwrap_or_else(|| {
                Error::MergeWorker(format!("worker exited before generation {generation} was queued"))
            }));
        }
        Ok(())
    }

    /// Closes the queue, waits for every queued merge and returns the
    /// surviving accumulator.
    pub fn finish(mut self) -> Result<GenerationId> {
        self.join()
    }

    fn join(&mut self) -> Result<GenerationId> {
        self.sender.take();
        let handle = self.handle.take().ok_or_else(|| Error::MergeWorker("worker already joined".into()))?;
        handle
            .join()
            .map_err(|_| Error::MergeWorker("merge thread panicked".into()))?
    }
}

impl Drop for MergeWorker {
    fn drop(&mut self) {
        if self.handle.is_some() {
            if let Err(e) = self.join() {
                tracing::warn!(error = %e, "merge worker stopped with an error");
            }
        }
    }
}
