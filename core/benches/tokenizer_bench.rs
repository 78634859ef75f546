use criterion::{criterion_group, criterion_main, Criterion};
use hashdex::tokenizer::tokenize;

const TEXT: &str = "Documents are staged in memory and flushed to numbered partial indexes \
    once enough of them have been read. A background worker merges the partial indexes \
    pairwise, concatenating the postings of every token the two have in common, until a \
    single generation is left and can be moved into place. Queries hash each term into the \
    dictionary, step past colliding buckets and read the postings straight out of the data file.";

fn bench_tokenize(c: &mut Criterion) {
    let text = TEXT.repeat(20);
    c.bench_function("tokenize_paragraphs", |b| b.iter(|| tokenize(&text)));
}

criterion_group!(benches, bench_tokenize);
criterion_main!(benches);
