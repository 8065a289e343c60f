use criterion::{Criterion, criterion_group, criterion_main};
use pdf_assistant::chunking::{ChunkingConfig, chunk_text};
use pdf_assistant::ingest::extract_text;
use std::hint::black_box;

const TWO_PAGES_PDF: &[u8] = include_bytes!("../tests/fixtures/two_pages.pdf");

fn sample_document() -> String {
    let page = extract_text(TWO_PAGES_PDF).expect("fixture should extract");
    let paragraph = "Retrieval augmented generation splits documents into overlapping chunks. \
                     Each chunk is embedded and stored so that questions can find the passages \
                     most likely to contain their answer.\n\n";
    let mut document = String::new();
    for _ in 0..200 {
        document.push_str(&page);
        document.push_str(paragraph);
    }
    document
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let content = sample_document();
    let config = ChunkingConfig::default();
    c.bench_function("chunking", |b| {
        b.iter(|| chunk_text(black_box(&content), black_box(&config)))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
