use crate::index::TokenId;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Process-wide token table: hands out a stable ID the first time a token is
/// seen and resolves IDs back to strings for the merge worker.
#[derive(Debug, Default)]
pub struct Vocabulary {
    ids: HashMap<String, TokenId>,
    tokens: Vec<String>,
}

/// The ingestion thread interns, the merge worker resolves.
pub type SharedVocabulary = Arc<RwLock<Vocabulary>>;

impl Vocabulary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedVocabulary {
        Arc::new(RwLock::new(Self::new()))
    }

    pub fn intern(&mut self, token: &str) -> TokenId {
        if let Some(&id) = self.ids.get(token) {
            return id;
        }
        let id = self.tokens.len() as TokenId;
        self.tokens.push(token.to_string());
        self.ids.insert(token.to_string(), id);
        id
    }

    /// Re-registers a token under a known ID when loading a token table.
    /// IDs must arrive densely and in order.
    pub(crate) fn restore(&mut self, token: String, id: TokenId) -> bool {
        if id as usize != self.tokens.len() || self.ids.contains_key(&token) {
            return false;
        }
        self.ids.insert(token.clone(), id);
        self.tokens.push(token);
        true
    }

    pub fn id(&self, token: &str) -> Option<TokenId> {
        self.ids.get(token).copied()
    }

    pub fn token(&self, id: TokenId) -> Option<&str> {
        self.tokens.get(id as usize).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// `(token, id)` in ID order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, TokenId)> {
        self.tokens.iter().enumerate().map(|(id, t)| (t.as_str(), id as TokenId))
    }
}
