use hashdex::persist::IndexPaths;
use hashdex::tokenizer::tokenize;
use hashdex::{
    Error, HashedIndex, Index, IndexConfig, IndexReader, PersistentIndex, PostingsEntry, QueryMode, Searcher,
};
use std::fs;
use tempfile::tempdir;

fn build(config: IndexConfig, docs: &[&str]) -> PersistentIndex {
    let mut index = PersistentIndex::open(config).unwrap();
    for (doc_id, text) in docs.iter().enumerate() {
        let tokens = tokenize(text);
        for (token, pos) in &tokens {
            index.insert(token, doc_id as u32, *pos).unwrap();
        }
        index.record_document(doc_id as u32, &format!("doc{doc_id}.txt"), tokens.len() as u32);
    }
    index.cleanup().unwrap();
    index
}

fn file_names(dir: &std::path::Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn single_generation_keeps_postings_text() {
    let dir = tempdir().unwrap();
    let mut index = PersistentIndex::open(IndexConfig::new(dir.path())).unwrap();
    index.insert("cat", 0, 3).unwrap();
    index.insert("cat", 0, 7).unwrap();
    index.insert("cat", 5, 1).unwrap();
    index.record_document(0, "a.txt", 8);
    index.record_document(5, "b.txt", 2);
    index.cleanup().unwrap();

    let list = index.get_postings("cat").unwrap().unwrap();
    assert_eq!(list.encode(':'), "0,3,7:5,1");
    assert!(index.get_postings("dog").unwrap().is_none());

    let stats = index.stats();
    assert_eq!(stats.flushes, 1);
    assert_eq!(stats.merges, 0);
}

#[test]
fn threshold_flushes_and_merges() {
    let dir = tempdir().unwrap();
    let config = IndexConfig::new(dir.path()).with_threshold(2);
    let mut index = PersistentIndex::open(config).unwrap();
    for doc_id in 0..4 {
        index.insert("dog", doc_id, 0).unwrap();
        index.record_document(doc_id, &format!("d{doc_id}"), 1);
    }
    index.cleanup().unwrap();

    let stats = index.stats();
    assert_eq!(stats.flushes, 2);
    assert_eq!(stats.merges, 1);

    let list = index.get_postings("dog").unwrap().unwrap();
    assert_eq!(list.doc_ids().collect::<Vec<_>>(), vec![0, 1, 2, 3]);

    assert_eq!(
        file_names(dir.path()),
        vec!["data", "dictionary", "docInfo", "meta.json", "tokenIndex"]
    );
    let reader = index.reader().unwrap();
    assert_eq!(reader.num_docs(), 4);
    assert_eq!(reader.doc_name(3), Some("d3"));
}

#[test]
fn boundary_document_flushes_once() {
    let dir = tempdir().unwrap();
    let config = IndexConfig::new(dir.path()).with_threshold(2);
    let mut index = PersistentIndex::open(config).unwrap();
    let docs = [
        (0, "ant bee"),
        (1, "cow"),
        (2, "elk fox elk gnu elk"),
        (3, "elk"),
        (4, "fox fox"),
    ];
    for (doc_id, text) in docs {
        let tokens: Vec<&str> = text.split_whitespace().collect();
        for (pos, token) in tokens.iter().enumerate() {
            index.insert(token, doc_id, pos as u32).unwrap();
        }
        index.record_document(doc_id, &format!("d{doc_id}"), tokens.len() as u32);
    }
    index.cleanup().unwrap();

    // flushes before doc 2, before doc 4 and at cleanup
    let stats = index.stats();
    assert_eq!(stats.flushes, 3);
    assert_eq!(stats.merges, 2);

    let elk = index.get_postings("elk").unwrap().unwrap();
    assert_eq!(elk.len(), 2);
    assert_eq!(elk.entries()[0], PostingsEntry::with_positions(2, vec![0, 2, 4]));
    assert_eq!(elk.entries()[1], PostingsEntry::with_positions(3, vec![0]));

    let fox = index.get_postings("fox").unwrap().unwrap();
    assert_eq!(fox.encode(':'), "2,1:4,0,1");
    assert_eq!(index.reader().unwrap().num_docs(), 5);
}

#[test]
fn matches_in_memory_index_under_collisions() {
    let dir = tempdir().unwrap();
    // a small table forces probing, a small threshold forces several merges
    let config = IndexConfig::new(dir.path()).with_threshold(3).with_table_size(257);
    let mut persistent = PersistentIndex::open(config).unwrap();
    let mut memory = HashedIndex::new();

    let words = [
        "alpha", "bravo", "charlie", "delta", "echo", "foxtrot", "golf", "hotel", "india", "juliet",
        "kilo", "lima", "mike", "november", "oscar", "papa", "quebec", "romeo", "sierra", "tango",
    ];
    for doc_id in 0..20u32 {
        let mut pos = 0;
        for (i, word) in words.iter().enumerate() {
            if (i as u32 + doc_id) % 3 == 0 || i as u32 % 7 == doc_id % 7 {
                persistent.insert(word, doc_id, pos).unwrap();
                memory.insert(word, doc_id, pos).unwrap();
                pos += 1;
            }
        }
        persistent.record_document(doc_id, &format!("doc{doc_id}"), pos);
        memory.record_document(doc_id, &format!("doc{doc_id}"), pos);
    }
    persistent.cleanup().unwrap();
    memory.cleanup().unwrap();

    assert!(persistent.stats().merges >= 6);
    for token in memory.tokens() {
        assert_eq!(
            persistent.get_postings(token).unwrap(),
            memory.get_postings(token).unwrap(),
            "postings differ for {token}"
        );
    }
    assert!(persistent.get_postings("zulu").unwrap().is_none());
    assert_eq!(persistent.reader().unwrap().docs(), memory.docs());
}

#[test]
fn saturated_table_is_an_error() {
    let dir = tempdir().unwrap();
    let config = IndexConfig::new(dir.path()).with_table_size(2);
    let mut index = PersistentIndex::open(config).unwrap();
    for token in ["a", "b", "c"] {
        index.insert(token, 0, 0).unwrap();
    }
    assert!(matches!(index.cleanup(), Err(Error::TableFull { table_size: 2 })));
}

#[test]
fn finalized_index_rejects_writes() {
    let dir = tempdir().unwrap();
    let mut index = build(IndexConfig::new(dir.path()), &["one document"]);
    assert!(matches!(index.insert("more", 1, 0), Err(Error::Finalized)));
    assert!(matches!(index.cleanup(), Err(Error::Finalized)));
}

#[test]
fn reopened_index_answers_queries() {
    let dir = tempdir().unwrap();
    let docs = [
        "The quick brown fox jumps over the lazy dog",
        "A quick brown dog",
        "Brown bears are not quick",
    ];
    drop(build(IndexConfig::new(dir.path()).with_threshold(2), &docs));

    let reader = IndexReader::open(&IndexPaths::new(dir.path()), 8).unwrap();
    assert_eq!(reader.meta().num_docs, 3);
    assert_eq!(reader.doc_name(1), Some("doc1.txt"));
    assert!(reader.vocabulary().unwrap().id("quick").is_some());

    let searcher = Searcher::new(&reader);
    let both = searcher.search("quick brown", QueryMode::Intersection).unwrap();
    assert_eq!(both.doc_ids().collect::<Vec<_>>(), vec![0, 1, 2]);
    let phrase = searcher.search("quick brown", QueryMode::Phrase).unwrap();
    assert_eq!(phrase.doc_ids().collect::<Vec<_>>(), vec![0, 1]);
    assert!(searcher.search("quick zebra", QueryMode::Intersection).unwrap().is_empty());

    // a fresh build handle still serves the previous index until it finalizes
    let index = PersistentIndex::open(IndexConfig::new(dir.path())).unwrap();
    assert!(index.get_postings("fox").unwrap().is_some());
}

#[test]
fn interrupted_build_leftovers_are_removed() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("dictionary_0"), b"junk").unwrap();
    fs::write(dir.path().join("tokenKeys_0-2"), b"junk").unwrap();
    drop(build(IndexConfig::new(dir.path()), &["fresh start"]));
    assert_eq!(
        file_names(dir.path()),
        vec!["data", "dictionary", "docInfo", "meta.json", "tokenIndex"]
    );
}
