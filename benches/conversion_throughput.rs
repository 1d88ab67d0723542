//! Conversion throughput benchmarks
//!
//! Measures the markup-to-writer pipeline on its own and end to end into PDF,
//! plus batch conversion across documents.

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use sheaf::{HtmlConverter, RecordingWriter};
use std::hint::black_box;

const STYLESHEET: &str = r#"
    body { font-family: Helvetica; font-size: 10pt }
    h1 { color: #1a3c6e; border-bottom: 1pt solid #1a3c6e }
    h2 { page-break-before: auto; margin-top: 12pt }
    .total { font-weight: bold; text-align: right }
    td, th { padding: 2pt 4pt; border: 0.5pt solid #999999 }
"#;

/// A report with `sections` headed sections, each with prose, a list and a table.
fn generate_report(sections: usize) -> String {
    let mut html = String::from("<html><head><title>Benchmark report</title></head><body><h1>Report</h1>");
    for i in 0..sections {
        html.push_str(&format!(
            "<h2>Section {i}</h2>\
             <p>This section describes item <b>{i}</b> with <i>inline</i> emphasis and a \
             <a href=\"#s{i}\">reference</a> to the table below.</p>\
             <ul><li>First point</li><li>Second point</li><li>Third point</li></ul>\
             <table id=\"s{i}\"><tr><th>Item</th><th>Amount</th></tr>\
             <tr><td>Widget</td><td>{}</td></tr>\
             <tr><td class=\"total\">Total</td><td>{}</td></tr></table>",
            i * 3,
            i * 3 + 7
        ));
    }
    html.push_str("</body></html>");
    html
}

fn converter() -> HtmlConverter {
    HtmlConverter::builder()
        .with_stylesheet_source(STYLESHEET)
        .build()
        .expect("Failed to build converter")
}

/// Benchmark the pipeline alone, writing into a recording writer
fn benchmark_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline");
    let converter = converter();

    for sections in [1, 10, 100] {
        let html = generate_report(sections);
        group.throughput(Throughput::Bytes(html.len() as u64));
        group.bench_with_input(BenchmarkId::new("sections", sections), &html, |b, html| {
            b.iter(|| {
                let mut writer = RecordingWriter::new();
                converter
                    .convert_with(black_box(html.as_bytes()), &mut writer)
                    .expect("Failed to convert");
                writer
            })
        });
    }

    group.finish();
}

/// Benchmark full conversion into PDF bytes
fn benchmark_pdf(c: &mut Criterion) {
    let mut group = c.benchmark_group("pdf");
    let converter = converter();

    for sections in [1, 10, 100] {
        let html = generate_report(sections);
        group.throughput(Throughput::Bytes(html.len() as u64));
        group.bench_with_input(BenchmarkId::new("sections", sections), &html, |b, html| {
            b.iter(|| {
                converter
                    .convert_to_vec(black_box(html.as_bytes()))
                    .expect("Failed to generate PDF")
            })
        });
    }

    group.finish();
}

/// Benchmark batch conversion with a fixed document size
fn benchmark_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch");
    group.sample_size(20);
    let converter = converter();
    let document = generate_report(10);

    for count in [1, 8, 32] {
        let documents = vec![document.clone(); count];
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("documents", count), &documents, |b, documents| {
            b.iter(|| converter.convert_batch(black_box(documents)))
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_pipeline, benchmark_pdf, benchmark_batch);
criterion_main!(benches);
