use crate::error::{Error, Result};
use crate::generation::GenerationId;
use crate::hash::{primary_hash, secondary_hash};
use crate::index::{DocTable, TokenId};
use crate::persist::{save_doc_info, save_token_keys, IndexPaths};
use crate::staging::StagingIndex;
use crate::storage::{DataFile, DictionaryFile, Entry};
use crate::vocab::Vocabulary;
use std::time::Instant;

#[derive(Debug, Default, Clone, Copy)]
pub struct FlushStats {
    pub tokens: usize,
    pub docs: usize,
    pub collisions: u64,
    pub bytes: u64,
}

/// Writes the staged postings and pending doc-info as generation
/// `generation`: `docInfo_G`, `data_G`, `dictionary_G` and `tokenKeys_G`.
pub fn write_generation(
    paths: &IndexPaths,
    generation: GenerationId,
    table_size: u64,
    entry_delimiter: char,
    staging: &StagingIndex,
    vocab: &Vocabulary,
    docs: &DocTable,
) -> Result<FlushStats> {
    let started = Instant::now();
    tracing::info!(%generation, tokens = staging.len(), docs = docs.len(), "writing partial index");

    let files = paths.generation(generation);
    save_doc_info(&files.doc_info, docs)?;

    let mut data = DataFile::create(&files.data)?;
    let mut dictionary = DictionaryFile::create(&files.dictionary, table_size)?;
    let mut token_keys: Vec<(TokenId, u32)> = Vec::with_capacity(staging.len());

    for (token_id, postings) in staging.iter() {
        let token = vocab
            .token(token_id)
            .ok_or_else(|| Error::corrupt(format!("token id {token_id} missing from vocabulary")))?;
        if postings.is_empty() {
            return Err(Error::EmptyPostings(token.to_string()));
        }
        let blob = postings.encode(entry_delimiter);
        let offset = data.append(blob.as_bytes())?;
        let entry = Entry::new(offset, blob.len() as u32, secondary_hash(token));
        let bucket = dictionary.insert(primary_hash(token, table_size), &entry)?;
        token_keys.push((token_id, bucket as u32));
    }

    save_token_keys(&files.token_keys, &token_keys)?;
    data.sync()?;
    dictionary.sync()?;

    let stats = FlushStats {
        tokens: token_keys.len(),
        docs: docs.len(),
        collisions: dictionary.collisions(),
        bytes: data.free(),
    };
    tracing::info!(
        %generation,
        tokens = stats.tokens,
        collisions = stats.collisions,
        bytes = stats.bytes,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "partial index written"
    );
    Ok(stats)
}
