use crate::error::{Error, Result};
use crate::index::DocId;
use serde::Serialize;
use std::fmt::Write as _;

/// Separates the doc ID and positions inside one serialized entry.
pub const FIELD_DELIM: char = ',';

/// Occurrences of one token in one document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostingsEntry {
    pub doc_id: DocId,
    pub positions: Vec<u32>,
    /// Ranking score; never persisted.
    #[serde(skip)]
    pub score: f64,
}

impl PostingsEntry {
    pub fn new(doc_id: DocId, offset: u32) -> Self {
        Self { doc_id, positions: vec![offset], score: 0.0 }
    }

    pub fn with_positions(doc_id: DocId, positions: Vec<u32>) -> Self {
        Self { doc_id, positions, score: 0.0 }
    }

    pub fn add_position(&mut self, offset: u32) {
        self.positions.push(offset);
    }

    fn encode_into(&self, out: &mut String) {
        let _ = write!(out, "{}", self.doc_id);
        for p in &self.positions {
            let _ = write!(out, "{FIELD_DELIM}{p}");
        }
    }

    fn decode(raw: &str) -> Result<Self> {
        let mut fields = raw.split(FIELD_DELIM);
        let doc_id = parse_field(fields.next().unwrap_or_default(), raw)?;
        let positions = fields.map(|f| parse_field(f, raw)).collect::<Result<Vec<u32>>>()?;
        if positions.is_empty() {
            return Err(Error::corrupt(format!("postings entry {raw:?} has no positions")));
        }
        Ok(Self { doc_id, positions, score: 0.0 })
    }
}

fn parse_field(field: &str, raw: &str) -> Result<u32> {
    field
        .parse()
        .map_err(|_| Error::corrupt(format!("bad field {field:?} in postings entry {raw:?}")))
}

/// A token's postings, in the order documents were ingested.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct PostingsList {
    entries: Vec<PostingsEntry>,
}

impl PostingsList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[PostingsEntry] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PostingsEntry> {
        self.entries.iter()
    }

    pub fn push(&mut self, entry: PostingsEntry) {
        self.entries.push(entry);
    }

    /// Records one occurrence. Occurrences of the same document must arrive
    /// back to back: only the last entry is checked for a matching doc ID.
    pub fn add(&mut self, doc_id: DocId, offset: u32) {
        match self.entries.last_mut() {
            Some(last) if last.doc_id == doc_id => last.add_position(offset),
            _ => self.entries.push(PostingsEntry::new(doc_id, offset)),
        }
    }

    /// Entry for `doc_id`, assuming entries are in ascending doc order.
    pub fn find(&self, doc_id: DocId) -> Option<&PostingsEntry> {
        self.entries
            .binary_search_by_key(&doc_id, |e| e.doc_id)
            .ok()
            .map(|i| &self.entries[i])
    }

    pub fn doc_ids(&self) -> impl Iterator<Item = DocId> + '_ {
        self.entries.iter().map(|e| e.doc_id)
    }

    /// `docID,pos,pos…` entries joined by `delim`.
    pub fn encode(&self, delim: char) -> String {
        let mut out = String::new();
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                out.push(delim);
            }
            entry.encode_into(&mut out);
        }
        out
    }

    pub fn decode(blob: &str, delim: char) -> Result<Self> {
        if blob.is_empty() {
            return Ok(Self::new());
        }
        let entries = blob.split(delim).map(PostingsEntry::decode).collect::<Result<Vec<_>>>()?;
        Ok(Self { entries })
    }
}

impl From<Vec<PostingsEntry>> for PostingsList {
    fn from(entries: Vec<PostingsEntry>) -> Self {
        Self { entries }
    }
}

impl<'a> IntoIterator for &'a PostingsList {
    type Item = &'a PostingsEntry;
    type IntoIter = std::slice::Iter<'a, PostingsEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
