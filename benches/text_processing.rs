use criterion::{black_box, criterion_group, criterion_main, Criterion};
use migration_assistant::index::{cosine_similarity, Chunker, LocalEmbedder};
use migration_assistant::pdf::{clean_text, Section};

fn chunker_benchmark(c: &mut Criterion) {
    let chunker = Chunker::new(1000, 200);
    let paragraph = "Camunda 8 replaces the embedded engine with Zeebe. \
        JavaDelegates become job workers and external tasks map to jobs.\n\n";
    let text = paragraph.repeat(200);

    c.bench_function("chunker_split_long_text", |b| {
        b.iter(|| {
            let chunks = chunker.split_text(black_box(text.as_str()));
            black_box(chunks.len());
        });
    });
}

fn clean_and_classify_benchmark(c: &mut Criterion) {
    let raw = "Migration   Analyzer\r\n\r\n\r\n\tChecks BPMN models   for unsupported elements\n".repeat(100);

    c.bench_function("clean_and_classify_page", |b| {
        b.iter(|| {
            let text = clean_text(black_box(&raw));
            black_box(Section::classify(&text));
        });
    });
}

fn similarity_benchmark(c: &mut Criterion) {
    let embedder = LocalEmbedder::new(768);
    let query = embedder.embed("how do I migrate an external task handler to a job worker");
    let corpus: Vec<Vec<f32>> = (0..2000)
        .map(|i| embedder.embed(&format!("chunk {} about process migration and job workers", i)))
        .collect();

    c.bench_function("cosine_scan_2000_chunks", |b| {
        b.iter(|| {
            let best = corpus
                .iter()
                .map(|v| cosine_similarity(black_box(&query), v))
                .fold(f32::MIN, f32::max);
            black_box(best);
        });
    });
}

criterion_group!(
    benches,
    chunker_benchmark,
    clean_and_classify_benchmark,
    similarity_benchmark
);
criterion_main!(benches);
