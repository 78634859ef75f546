use hashdex::tokenizer::{tokenize, tokenize_with, TokenizerOptions};

#[test]
fn it_normalizes_and_stems() {
    let toks = tokenize("Running Runners RUN! The café's menu.");
    let words: Vec<String> = toks.into_iter().map(|(w, _)| w).collect();
    // Stemming to "run" should appear
    assert!(words.contains(&"run".to_string()));
    // Unicode normalization: café -> cafe
    assert!(words.iter().any(|w| w.starts_with("caf")));
}

#[test]
fn it_filters_stopwords() {
    let toks = tokenize("The quick brown fox and the lazy dog");
    let words: Vec<String> = toks.into_iter().map(|(w, _)| w).collect();
    assert!(!words.contains(&"the".to_string()));
    assert!(!words.contains(&"and".to_string()));
}

#[test]
fn positions_are_word_ordinals() {
    let toks = tokenize_with("Cat in the hat", TokenizerOptions { stem: false, drop_stopwords: true });
    assert_eq!(toks, vec![("cat".to_string(), 0), ("hat".to_string(), 3)]);

    let all = tokenize_with("Cat in the hat", TokenizerOptions { stem: false, drop_stopwords: false });
    assert_eq!(all.len(), 4);
    assert_eq!(all[2], ("the".to_string(), 2));
}
