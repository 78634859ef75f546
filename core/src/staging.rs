use crate::index::{DocId, TokenId};
use crate::postings::PostingsList;
use std::collections::HashMap;

/// Postings accumulated since the last flush, kept in first-seen order.
#[derive(Debug, Default)]
pub struct StagingIndex {
    slots: HashMap<TokenId, usize>,
    terms: Vec<(TokenId, PostingsList)>,
}

impl StagingIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, token_id: TokenId, doc_id: DocId, offset: u32) {
        match self.slots.get(&token_id) {
            Some(&slot) => self.terms[slot].1.add(doc_id, offset),
            None => {
                let mut list = PostingsList::new();
                list.add(doc_id, offset);
                self.slots.insert(token_id, self.terms.len());
                self.terms.push((token_id, list));
            }
        }
    }

    pub fn get(&self, token_id: TokenId) -> Option<&PostingsList> {
        self.slots.get(&token_id).map(|&slot| &self.terms[slot].1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (TokenId, &PostingsList)> {
        self.terms.iter().map(|(id, list)| (*id, list))
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.terms.clear();
    }
}
