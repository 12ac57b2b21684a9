//! Performance benchmarks for PDF Annotator MCP Server
//!
//! Run with: `cargo bench`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use pdf_annotator_mcp::pdf::correlate::{crop_box, extract_text, text_from_words};
use pdf_annotator_mcp::pdf::layout::{Glyph, Word};
use pdf_annotator_mcp::pdf::{parse_page_range, BoundingBox, PageLayout};

const LINE_HEIGHT: f32 = 14.0;
const GLYPH_WIDTH: f32 = 6.0;

/// A page of `lines` lines, each holding ten five-letter words.
fn synthetic_glyphs(lines: usize) -> Vec<Glyph> {
    let mut glyphs = Vec::new();
    for line in 0..lines {
        let top = 50.0 + line as f32 * LINE_HEIGHT;
        let mut x = 50.0;
        for word in 0..10 {
            for ch in format!("w{:04}", (line * 10 + word) % 10_000).chars() {
                glyphs.push(Glyph {
                    ch,
                    bbox: BoundingBox::new(x, top, x + GLYPH_WIDTH, top + LINE_HEIGHT - 2.0),
                });
                x += GLYPH_WIDTH;
            }
            x += GLYPH_WIDTH;
        }
    }
    glyphs
}

fn synthetic_words(lines: usize) -> Vec<Word> {
    let mut words = Vec::new();
    for line in 0..lines {
        let top = 50.0 + line as f32 * LINE_HEIGHT;
        for i in 0..10 {
            let x0 = 50.0 + i as f32 * 6.0 * GLYPH_WIDTH;
            words.push(Word::new(
                format!("w{:04}", i),
                x0,
                top,
                x0 + 5.0 * GLYPH_WIDTH,
                top + LINE_HEIGHT - 2.0,
            ));
        }
    }
    words
}

/// Benchmark crop-and-reflow over a highlight box
fn bench_reflow(c: &mut Criterion) {
    let mut group = c.benchmark_group("reflow");

    for lines in [10usize, 50, 200] {
        let page = PageLayout::from_glyphs(0, 612.0, 792.0, synthetic_glyphs(lines));
        let highlight = BoundingBox::new(50.0, 50.0, 400.0, 50.0 + 3.0 * LINE_HEIGHT);
        group.throughput(Throughput::Elements(page.glyphs().len() as u64));

        group.bench_with_input(BenchmarkId::new("three_line_box", lines), &page, |b, page| {
            b.iter(|| {
                let cropped = page.reflow_within(&crop_box(black_box(&highlight)));
                extract_text(&cropped, page.words(), &highlight)
            });
        });
    }

    group.finish();
}

/// Benchmark the word-grouping fallback
fn bench_word_grouping(c: &mut Criterion) {
    let mut group = c.benchmark_group("word_grouping");

    for lines in [10usize, 50, 200] {
        let words = synthetic_words(lines);
        let highlight = BoundingBox::new(50.0, 50.0, 400.0, 50.0 + 3.0 * LINE_HEIGHT);
        group.throughput(Throughput::Elements(words.len() as u64));

        group.bench_with_input(BenchmarkId::new("three_line_box", lines), &words, |b, words| {
            b.iter(|| text_from_words(black_box(words), black_box(&highlight)));
        });
    }

    group.finish();
}

/// Benchmark page range parsing
fn bench_page_range(c: &mut Criterion) {
    let mut group = c.benchmark_group("page_range");

    for spec in ["first", "last", "42", "10-900", "-500"] {
        group.bench_with_input(BenchmarkId::from_parameter(spec), spec, |b, spec| {
            b.iter(|| parse_page_range(black_box(1000), black_box(Some(spec))));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_reflow, bench_word_grouping, bench_page_range);
criterion_main!(benches);
