//! Boolean intersection and phrase matching over stored postings lists.

use crate::error::Result;
use crate::postings::{PostingsEntry, PostingsList};
use crate::reader::IndexReader;
use crate::tokenizer::tokenize_with;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryMode {
    #[default]
    Intersection,
    Phrase,
}

/// Documents present in every list. Entries keep the positions of the first
/// list.
pub fn intersect(lists: &[Arc<PostingsList>]) -> PostingsList {
    let Some(first) = lists.first() else {
        return PostingsList::new();
    };
    let mut order: Vec<&PostingsList> = lists.iter().map(|l| l.as_ref()).collect();
    order.sort_by_key(|l| l.len());

    let mut docs: Vec<u32> = order[0].doc_ids().collect();
    for list in &order[1..] {
        if docs.is_empty() {
            break;
        }
        docs = intersect_sorted(&docs, list.entries());
    }

    docs.into_iter()
        .filter_map(|doc_id| first.find(doc_id).cloned())
        .collect::<Vec<_>>()
        .into()
}

fn intersect_sorted(docs: &[u32], entries: &[PostingsEntry]) -> Vec<u32> {
    let mut out = Vec::with_capacity(docs.len().min(entries.len()));
    let (mut i, mut j) = (0, 0);
    while i < docs.len() && j < entries.len() {
        match docs[i].cmp(&entries[j].doc_id) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                out.push(docs[i]);
                i += 1;
                j += 1;
            }
        }
    }
    out
}

/// Documents where the lists' terms appear at consecutive positions.
pub fn phrase(lists: &[Arc<PostingsList>]) -> PostingsList {
    let terms: Vec<(u32, Arc<PostingsList>)> = lists.iter().cloned().zip(0..).map(|(l, i)| (i, l)).collect();
    phrase_at(&terms)
}

/// Phrase match where each term carries its position relative to the start
/// of the phrase, so words dropped by the tokenizer leave a gap. Terms may
/// come in any order; the output entry holds the positions of the term with
/// the largest offset.
pub fn phrase_at(terms: &[(u32, Arc<PostingsList>)]) -> PostingsList {
    let mut terms = terms.to_vec();
    terms.sort_by_key(|(offset, _)| *offset);
    let lists: Vec<Arc<PostingsList>> = terms.iter().map(|(_, l)| Arc::clone(l)).collect();
    let candidates = intersect(&lists);
    let Some(last_offset) = terms.last().map(|(offset, _)| *offset) else {
        return PostingsList::new();
    };
    let base = terms[0].0;

    let mut out = PostingsList::new();
    for candidate in candidates.iter() {
        let entries: Vec<&PostingsEntry> = terms
            .iter()
            .filter_map(|(_, list)| list.find(candidate.doc_id))
            .collect();
        let mut hits = Vec::new();
        for &start in &entries[0].positions {
            let matched = terms
                .iter()
                .zip(&entries)
                .all(|((offset, _), entry)| entry.positions.binary_search(&(start + offset - base)).is_ok());
            if matched {
                hits.push(start + last_offset - base);
            }
        }
        if !hits.is_empty() {
            out.push(PostingsEntry::with_positions(candidate.doc_id, hits));
        }
    }
    out
}

/// Runs tokenized queries against a finalized index.
pub struct Searcher<'a> {
    reader: &'a IndexReader,
}

impl<'a> Searcher<'a> {
    pub fn new(reader: &'a IndexReader) -> Self {
        Self { reader }
    }

    pub fn search(&self, query: &str, mode: QueryMode) -> Result<PostingsList> {
        let tokens = tokenize_with(query, self.reader.meta().tokenizer);
        let mut terms = Vec::with_capacity(tokens.len());
        for (token, position) in tokens {
            match self.reader.get_postings(&token)? {
                Some(list) => terms.push((position, list)),
                None => {
                    tracing::debug!(token, "query term not in index");
                    return Ok(PostingsList::new());
                }
            }
        }

        if let [(_, only)] = terms.as_slice() {
            return Ok(only.as_ref().clone());
        }
        let result = match mode {
            QueryMode::Intersection => {
                intersect(&terms.into_iter().map(|(_, l)| l).collect::<Vec<_>>())
            }
            QueryMode::Phrase => phrase_at(&terms),
        };
        tracing::debug!(query, ?mode, hits = result.len(), "search finished");
        Ok(result)
    }
}
