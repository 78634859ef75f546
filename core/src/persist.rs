use crate::error::{Error, Result};
use crate::generation::GenerationId;
use crate::index::{DocId, DocMeta, DocTable, TokenId};
use crate::tokenizer::TokenizerOptions;
use crate::vocab::Vocabulary;
use serde::{Deserialize, Serialize};
use std::fs::{self, create_dir_all, File};
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

pub const DICTIONARY_FNAME: &str = "dictionary";
pub const DATA_FNAME: &str = "data";
pub const DOCINFO_FNAME: &str = "docInfo";
pub const TOKEN_KEYS_FNAME: &str = "tokenKeys";
pub const TOKEN_INDEX_FNAME: &str = "tokenIndex";
pub const META_FNAME: &str = "meta.json";

pub const META_VERSION: u32 = 1;

const GENERATION_PREFIXES: [&str; 4] = [DICTIONARY_FNAME, DATA_FNAME, DOCINFO_FNAME, TOKEN_KEYS_FNAME];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaFile {
    pub version: u32,
    pub created_at: String,
    pub num_docs: u32,
    pub unique_tokens: u32,
    /// Buckets passed over while filling the promoted dictionary; partial
    /// and intermediate merged dictionaries are not counted.
    pub collisions: u64,
    pub table_size: u64,
    pub entry_delimiter: char,
    pub tokenizer: TokenizerOptions,
}

#[derive(Debug, Clone)]
pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    pub fn dictionary(&self) -> PathBuf { self.root.join(DICTIONARY_FNAME) }
    pub fn data(&self) -> PathBuf { self.root.join(DATA_FNAME) }
    pub fn doc_info(&self) -> PathBuf { self.root.join(DOCINFO_FNAME) }
    pub fn token_index(&self) -> PathBuf { self.root.join(TOKEN_INDEX_FNAME) }
    pub fn meta(&self) -> PathBuf { self.root.join(META_FNAME) }

    pub fn generation(&self, generation: GenerationId) -> GenerationFiles {
        let file = |base: &str| self.root.join(format!("{base}_{generation}"));
        GenerationFiles {
            dictionary: file(DICTIONARY_FNAME),
            data: file(DATA_FNAME),
            doc_info: file(DOCINFO_FNAME),
            token_keys: file(TOKEN_KEYS_FNAME),
        }
    }

    /// Whether a finalized index lives here.
    pub fn is_finalized(&self) -> bool {
        self.meta().is_file() && self.dictionary().is_file() && self.data().is_file()
    }
}

/// The four files making up one generation.
#[derive(Debug, Clone)]
pub struct GenerationFiles {
    pub dictionary: PathBuf,
    pub data: PathBuf,
    pub doc_info: PathBuf,
    pub token_keys: PathBuf,
}

impl GenerationFiles {
    pub fn remove(&self) -> Result<()> {
        for path in [&self.dictionary, &self.data, &self.doc_info, &self.token_keys] {
            remove_if_exists(path)?;
        }
        Ok(())
    }
}

pub fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
        _ => Ok(()),
    }
}

/// Deletes generation files left behind by an interrupted build.
pub fn remove_stale_generations(paths: &IndexPaths) -> Result<usize> {
    let mut removed = 0;
    for entry in fs::read_dir(&paths.root)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        let is_generation = GENERATION_PREFIXES.iter().any(|prefix| {
            name.strip_prefix(prefix).is_some_and(|rest| rest.starts_with('_'))
        });
        if is_generation && entry.file_type()?.is_file() {
            fs::remove_file(entry.path())?;
            removed += 1;
        }
    }
    Ok(removed)
}

/// Replaces the canonical dictionary, data and docInfo files with those of
/// `generation` and drops its token keys.
pub fn promote_generation(paths: &IndexPaths, generation: GenerationId) -> Result<()> {
    let files = paths.generation(generation);
    for (from, to) in [
        (&files.dictionary, paths.dictionary()),
        (&files.data, paths.data()),
        (&files.doc_info, paths.doc_info()),
    ] {
        remove_if_exists(&to)?;
        fs::rename(from, &to)?;
    }
    remove_if_exists(&files.token_keys)
}

/// `docID;docName;tokenLength` per line.
pub fn save_doc_info(path: &Path, docs: &DocTable) -> Result<()> {
    let mut f = BufWriter::new(File::create(path)?);
    for (doc_id, meta) in docs {
        let name = if meta.name.contains(['\n', '\r']) {
            tracing::warn!(doc_id, "document name contains a line break; replacing with spaces");
            meta.name.replace(['\n', '\r'], " ")
        } else {
            meta.name.clone()
        };
        writeln!(f, "{doc_id};{name};{}", meta.length)?;
    }
    f.flush()?;
    Ok(())
}

pub fn load_doc_info(path: &Path) -> Result<DocTable> {
    let f = BufReader::new(File::open(path)?);
    let mut docs = DocTable::new();
    for line in f.lines() {
        let line = line?;
        if line.is_empty() { continue; }
        let (doc_id, meta) = parse_doc_info_line(&line)?;
        docs.insert(doc_id, meta);
    }
    Ok(docs)
}

/// The name sits between the first and the last separator, so names may
/// themselves contain `;`.
fn parse_doc_info_line(line: &str) -> Result<(DocId, DocMeta)> {
    let bad = || Error::corrupt(format!("bad docInfo line {line:?}"));
    let (id, rest) = line.split_once(';').ok_or_else(bad)?;
    let (name, length) = rest.rsplit_once(';').ok_or_else(bad)?;
    let doc_id = id.parse().map_err(|_| bad())?;
    let length = length.parse().map_err(|_| bad())?;
    Ok((doc_id, DocMeta { name: name.to_string(), length }))
}

/// Big-endian `[token id][bucket]` pairs.
pub fn save_token_keys(path: &Path, keys: &[(TokenId, u32)]) -> Result<()> {
    let mut f = BufWriter::new(File::create(path)?);
    for (token_id, bucket) in keys {
        f.write_all(&token_id.to_be_bytes())?;
        f.write_all(&bucket.to_be_bytes())?;
    }
    f.flush()?;
    Ok(())
}

pub fn load_token_keys(path: &Path) -> Result<Vec<(TokenId, u32)>> {
    let mut f = File::open(path)?;
    let mut buf = Vec::new();
    f.read_to_end(&mut buf)?;
    if buf.len() % 8 != 0 {
        return Err(Error::corrupt(format!("{} is not a whole number of token keys", path.display())));
    }
    let keys = buf
        .chunks_exact(8)
        .map(|pair| {
            let mut token_id = [0u8; 4];
            let mut bucket = [0u8; 4];
            token_id.copy_from_slice(&pair[..4]);
            bucket.copy_from_slice(&pair[4..]);
            (u32::from_be_bytes(token_id), u32::from_be_bytes(bucket))
        })
        .collect();
    Ok(keys)
}

/// `token id` per line, in ID order.
pub fn save_token_index(path: &Path, vocab: &Vocabulary) -> Result<()> {
    let mut f = BufWriter::new(File::create(path)?);
    for (token, id) in vocab.iter() {
        writeln!(f, "{token} {id}")?;
    }
    f.flush()?;
    Ok(())
}

pub fn load_token_index(path: &Path) -> Result<Vocabulary> {
    let f = BufReader::new(File::open(path)?);
    let mut vocab = Vocabulary::new();
    for line in f.lines() {
        let line = line?;
        let bad = || Error::corrupt(format!("bad tokenIndex line {line:?}"));
        let (token, id) = line.rsplit_once(' ').ok_or_else(bad)?;
        let id = id.parse().map_err(|_| bad())?;
        if !vocab.restore(token.to_string(), id) {
            return Err(bad());
        }
    }
    Ok(vocab)
}

pub fn save_meta(paths: &IndexPaths, meta: &MetaFile) -> Result<()> {
    create_dir_all(&paths.root)?;
    let mut f = File::create(paths.meta())?;
    let json = serde_json::to_string_pretty(meta)?;
    f.write_all(json.as_bytes())?;
    Ok(())
}

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile> {
    let mut f = File::open(paths.meta())?;
    let mut buf = String::new();
    f.read_to_string(&mut buf)?;
    let meta: MetaFile = serde_json::from_str(&buf)?;
    Ok(meta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn doc_info_round_trips_awkward_names() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("docInfo_0");
        let mut docs = DocTable::new();
        docs.insert(0, DocMeta { name: "a;b.txt".into(), length: 12 });
        docs.insert(3, DocMeta { name: "two\nlines".into(), length: 1 });
        save_doc_info(&path, &docs).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text, "0;a;b.txt;12\n3;two lines;1\n");
        let loaded = load_doc_info(&path).unwrap();
        assert_eq!(loaded[&0].name, "a;b.txt");
        assert_eq!(loaded[&3], DocMeta { name: "two lines".into(), length: 1 });
    }

    #[test]
    fn token_keys_are_fixed_width() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tokenKeys_1");
        save_token_keys(&path, &[(0, 17), (5, 611_952)]).unwrap();
        assert_eq!(fs::metadata(&path).unwrap().len(), 16);
        assert_eq!(load_token_keys(&path).unwrap(), vec![(0, 17), (5, 611_952)]);

        fs::write(&path, [0u8; 5]).unwrap();
        assert!(load_token_keys(&path).is_err());
    }

    #[test]
    fn token_index_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(TOKEN_INDEX_FNAME);
        let mut vocab = Vocabulary::new();
        vocab.intern("zebra");
        vocab.intern("apple");
        save_token_index(&path, &vocab).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "zebra 0\napple 1\n");
        let loaded = load_token_index(&path).unwrap();
        assert_eq!(loaded.id("apple"), Some(1));
    }

    #[test]
    fn stale_generations_are_swept() {
        let dir = tempdir().unwrap();
        let paths = IndexPaths::new(dir.path());
        for name in ["dictionary_0", "data_0-3", "tokenKeys_4", "docInfo_2", "dictionary", "meta.json", "database"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        assert_eq!(remove_stale_generations(&paths).unwrap(), 4);
        assert!(dir.path().join("dictionary").exists());
        assert!(dir.path().join("database").exists());
    }

    #[test]
    fn promotion_replaces_canonical_files() {
        let dir = tempdir().unwrap();
        let paths = IndexPaths::new(dir.path());
        let generation = GenerationId::flush(0).merged(GenerationId::flush(1));
        let files = paths.generation(generation);
        fs::write(paths.dictionary(), b"old").unwrap();
        for path in [&files.dictionary, &files.data, &files.doc_info, &files.token_keys] {
            fs::write(path, b"new").unwrap();
        }
        promote_generation(&paths, generation).unwrap();
        assert_eq!(fs::read(paths.dictionary()).unwrap(), b"new");
        assert!(paths.data().exists());
        assert!(paths.doc_info().exists());
        assert!(!files.token_keys.exists());
        assert!(!files.dictionary.exists());
    }
}
