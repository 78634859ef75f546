use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use hashdex::persist::IndexPaths;
use hashdex::tokenizer::{tokenize_with, TokenizerOptions};
use hashdex::{DocId, Index, IndexConfig, IndexReader, PersistentIndex, QueryMode, Searcher};
use serde::Deserialize;
use tracing_subscriber::{fmt, EnvFilter};
use walkdir::WalkDir;

use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Debug, Deserialize)]
struct InputDoc {
    id: String,
    body: String,
}

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build and query a persistent hashed inverted index", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index from text files, JSON/JSONL files or a directory of them
    Build {
        /// Input path (file or directory)
        #[arg(long)]
        input: PathBuf,
        /// Output index directory
        #[arg(long)]
        output: PathBuf,
        /// JSON file with index settings; flags below override it
        #[arg(long)]
        config: Option<PathBuf>,
        /// Documents per partial index
        #[arg(long)]
        threshold: Option<u32>,
        /// Buckets in the dictionary hash table
        #[arg(long)]
        table_size: Option<u64>,
        /// Partial indexes allowed to wait for the merge worker
        #[arg(long)]
        merge_queue: Option<usize>,
        #[arg(long, default_value_t = false)]
        no_stem: bool,
        #[arg(long, default_value_t = false)]
        keep_stopwords: bool,
    },
    /// Print the stored postings of each token as JSON
    Lookup {
        #[arg(long)]
        index: PathBuf,
        tokens: Vec<String>,
    },
    /// Print the documents matching every query term
    Query {
        #[arg(long)]
        index: PathBuf,
        /// Require the terms to appear next to each other
        #[arg(long, default_value_t = false)]
        phrase: bool,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        terms: Vec<String>,
    },
    /// Print index metadata
    Stats {
        #[arg(long)]
        index: PathBuf,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, output, config, threshold, table_size, merge_queue, no_stem, keep_stopwords } => {
            let mut config = match config {
                Some(path) => load_config(&path)?,
                None => IndexConfig::default(),
            };
            config.index_dir = output;
            if let Some(threshold) = threshold {
                config = config.with_threshold(threshold);
            }
            if let Some(table_size) = table_size {
                config = config.with_table_size(table_size);
            }
            if let Some(depth) = merge_queue {
                config = config.with_merge_queue_depth(depth);
            }
            let tokenizer = TokenizerOptions {
                stem: config.tokenizer.stem && !no_stem,
                drop_stopwords: config.tokenizer.drop_stopwords && !keep_stopwords,
            };
            config = config.with_tokenizer(tokenizer);
            build_index(&input, config)
        }
        Commands::Lookup { index, tokens } => lookup(&index, &tokens),
        Commands::Query { index, phrase, limit, terms } => query(&index, &terms.join(" "), phrase, limit),
        Commands::Stats { index } => stats(&index),
    }
}

fn load_config(path: &Path) -> Result<IndexConfig> {
    let text = fs::read_to_string(path).with_context(|| format!("reading config {}", path.display()))?;
    let config = serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))?;
    Ok(config)
}

fn open_reader(dir: &Path) -> Result<IndexReader> {
    let paths = IndexPaths::new(dir);
    if !paths.is_finalized() {
        bail!("no finalized index in {}", dir.display());
    }
    IndexReader::open(&paths, hashdex::config::DEFAULT_CACHE_CAPACITY)
        .with_context(|| format!("opening index {}", dir.display()))
}

/// Feeds documents to the index in order, handing out sequential doc IDs.
struct Ingest {
    index: PersistentIndex,
    tokenizer: TokenizerOptions,
    next_doc_id: DocId,
}

impl Ingest {
    fn add(&mut self, name: &str, text: &str) -> Result<()> {
        let doc_id = self.next_doc_id;
        let tokens = tokenize_with(text, self.tokenizer);
        for (token, pos) in &tokens {
            self.index.insert(token, doc_id, *pos)?;
        }
        self.index.record_document(doc_id, name, tokens.len() as u32);
        self.next_doc_id += 1;
        Ok(())
    }

    fn add_file(&mut self, root: &Path, file: &Path) -> Result<()> {
        match file.extension().and_then(|s| s.to_str()) {
            Some("jsonl") => {
                let reader = BufReader::new(File::open(file)?);
                for (n, line) in reader.lines().enumerate() {
                    let line = line?;
                    if line.trim().is_empty() { continue; }
                    let doc: InputDoc = serde_json::from_str(&line)
                        .with_context(|| format!("{}:{}", file.display(), n + 1))?;
                    self.add(&doc.id, &doc.body)?;
                }
            }
            Some("json") => {
                let reader = BufReader::new(File::open(file)?);
                let json: serde_json::Value = serde_json::from_reader(reader)
                    .with_context(|| format!("parsing {}", file.display()))?;
                match json {
                    serde_json::Value::Array(arr) => {
                        for v in arr {
                            let doc: InputDoc = serde_json::from_value(v)?;
                            self.add(&doc.id, &doc.body)?;
                        }
                    }
                    serde_json::Value::Object(_) => {
                        let doc: InputDoc = serde_json::from_value(json)?;
                        self.add(&doc.id, &doc.body)?;
                    }
                    _ => tracing::warn!(file = %file.display(), "skipping JSON that is neither a document nor a list"),
                }
            }
            _ => {
                let text = fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
                let name = file.strip_prefix(root).unwrap_or(file).to_string_lossy();
                let name = if name.is_empty() { file.to_string_lossy() } else { name };
                self.add(&name, &text)?;
            }
        }
        Ok(())
    }
}

fn collect_inputs(input: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = Vec::new();
    if input.is_dir() {
        for entry in WalkDir::new(input).into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() {
                if let Some(ext) = p.extension().and_then(|s| s.to_str()) {
                    if matches!(ext, "txt" | "md" | "json" | "jsonl") {
                        files.push(p.to_path_buf());
                    }
                }
            }
        }
    } else if input.is_file() {
        files.push(input.to_path_buf());
    }
    files.sort();
    files
}

fn build_index(input: &Path, config: IndexConfig) -> Result<()> {
    let started = Instant::now();
    let files = collect_inputs(input);
    if files.is_empty() {
        bail!("no input documents under {}", input.display());
    }
    let root = if input.is_dir() { input } else { input.parent().unwrap_or(input) };
    let output = config.index_dir.clone();
    tracing::info!(files = files.len(), output = %output.display(), "building index");

    let tokenizer = config.tokenizer;
    let index = PersistentIndex::open(config)?;
    let mut ingest = Ingest { index, tokenizer, next_doc_id: 0 };
    for file in &files {
        ingest.add_file(root, file)?;
    }
    ingest.index.cleanup().context("finalizing index")?;

    let stats = ingest.index.stats();
    tracing::info!(
        docs = stats.docs,
        unique_tokens = stats.unique_tokens,
        flushes = stats.flushes,
        merges = stats.merges,
        collisions = stats.collisions,
        merge_collisions = stats.merge_collisions,
        elapsed_s = started.elapsed().as_secs_f64(),
        "index build complete"
    );
    Ok(())
}

fn lookup(dir: &Path, tokens: &[String]) -> Result<()> {
    let reader = open_reader(dir)?;
    for token in tokens {
        let postings = reader.get_postings(token)?;
        let line = serde_json::json!({ "token": token, "postings": postings.as_deref() });
        println!("{line}");
    }
    Ok(())
}

fn query(dir: &Path, query: &str, phrase: bool, limit: usize) -> Result<()> {
    let reader = open_reader(dir)?;
    let mode = if phrase { QueryMode::Phrase } else { QueryMode::Intersection };
    let hits = Searcher::new(&reader).search(query, mode)?;
    println!("{} matching documents", hits.len());
    for entry in hits.iter().take(limit) {
        let name = reader.doc_name(entry.doc_id).unwrap_or("?");
        println!("{}\t{}\t{:?}", entry.doc_id, name, entry.positions);
    }
    Ok(())
}

fn stats(dir: &Path) -> Result<()> {
    let reader = open_reader(dir)?;
    println!("{}", serde_json::to_string_pretty(reader.meta())?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn builds_from_mixed_inputs() {
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();
        fs::write(input.path().join("a.txt"), "Rust systems programming").unwrap();
        fs::create_dir(input.path().join("nested")).unwrap();
        fs::write(input.path().join("nested/b.md"), "learning rust").unwrap();
        fs::write(
            input.path().join("c.jsonl"),
            "{\"id\":\"j1\",\"body\":\"rust again\"}\n\n{\"id\":\"j2\",\"body\":\"nothing here\"}\n",
        )
        .unwrap();
        fs::write(input.path().join("skip.bin"), "rust").unwrap();

        let config = IndexConfig::new(output.path()).with_threshold(2);
        build_index(input.path(), config).unwrap();

        let reader = open_reader(output.path()).unwrap();
        assert_eq!(reader.num_docs(), 4);
        // files are read in path order, JSONL lines in file order
        assert_eq!(reader.doc_name(0), Some("a.txt"));
        assert_eq!(reader.doc_name(2), Some("j2"));
        assert_eq!(reader.doc_name(3), Some("nested/b.md"));
        let rust = reader.get_postings("rust").unwrap().unwrap();
        assert_eq!(rust.doc_ids().collect::<Vec<_>>(), vec![0, 1, 3]);
    }

    #[test]
    fn empty_input_is_an_error() {
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();
        assert!(build_index(input.path(), IndexConfig::new(output.path())).is_err());
        assert!(open_reader(output.path()).is_err());
    }
}
