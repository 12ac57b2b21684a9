//! Layout backend: word and glyph geometry in top-down page coordinates
//!
//! PDFium does the font-aware text positioning and the crop-and-reflow of
//! annotation boxes. Everything it reports is copied into owned values, so
//! nothing borrowed from the PDFium instance outlives a single call.

use crate::error::{Error, Result};
use crate::pdf::geometry::BoundingBox;
use pdfium_render::prelude::*;

/// A single positioned character
#[derive(Debug, Clone, PartialEq)]
pub struct Glyph {
    pub ch: char,
    pub bbox: BoundingBox,
}

/// A whitespace-delimited run of glyphs
#[derive(Debug, Clone, PartialEq)]
pub struct Word {
    pub text: String,
    pub bbox: BoundingBox,
}

impl Word {
    pub fn new(text: impl Into<String>, x0: f32, top: f32, x1: f32, bottom: f32) -> Self {
        Self {
            text: text.into(),
            bbox: BoundingBox::new(x0, top, x1, bottom),
        }
    }
}

/// Text geometry of one page
#[derive(Debug, Clone, Default)]
pub struct PageLayout {
    /// Zero-based page index
    pub index: usize,
    pub width: f32,
    pub height: f32,
    glyphs: Vec<Glyph>,
    words: Vec<Word>,
}

impl PageLayout {
    /// Build a page from glyphs in content-stream order; words are derived.
    pub fn from_glyphs(index: usize, width: f32, height: f32, glyphs: Vec<Glyph>) -> Self {
        let words = group_words(&glyphs);
        Self {
            index,
            width,
            height,
            glyphs,
            words,
        }
    }

    /// Build a page that only knows word positions.
    ///
    /// Such a page has no glyphs, so [`PageLayout::reflow_within`] yields
    /// nothing and callers fall back to word grouping.
    pub fn from_words(index: usize, width: f32, height: f32, words: Vec<Word>) -> Self {
        Self {
            index,
            width,
            height,
            glyphs: Vec::new(),
            words,
        }
    }

    pub fn words(&self) -> &[Word] {
        &self.words
    }

    pub fn glyphs(&self) -> &[Glyph] {
        &self.glyphs
    }

    /// Full page text, one output line per visual line.
    pub fn text(&self) -> String {
        let page = BoundingBox::new(
            f32::NEG_INFINITY,
            f32::NEG_INFINITY,
            f32::INFINITY,
            f32::INFINITY,
        );
        self.reflow_within(&page)
    }

    /// Crop to `bbox` and rebuild text from the glyphs lying fully inside it.
    ///
    /// Lines are separated by `\n`; a horizontal gap wider than a fraction of
    /// the line's glyph height becomes a space.
    pub fn reflow_within(&self, bbox: &BoundingBox) -> String {
        let mut inside: Vec<&Glyph> = self
            .glyphs
            .iter()
            .filter(|g| !g.ch.is_whitespace() && bbox.contains(&g.bbox))
            .collect();
        if inside.is_empty() {
            return String::new();
        }

        let (y_tolerance, space_threshold) = thresholds(&inside);

        inside.sort_by(|a, b| {
            a.bbox
                .top
                .total_cmp(&b.bbox.top)
                .then(a.bbox.x0.total_cmp(&b.bbox.x0))
        });

        let mut lines: Vec<Vec<&Glyph>> = Vec::new();
        for glyph in inside {
            let same_line = lines
                .last()
                .and_then(|line| line.last())
                .is_some_and(|last| (glyph.bbox.top - last.bbox.top).abs() <= y_tolerance);
            match lines.last_mut() {
                Some(line) if same_line => line.push(glyph),
                _ => lines.push(vec![glyph]),
            }
        }

        let mut out = Vec::with_capacity(lines.len());
        for mut line in lines {
            line.sort_by(|a, b| a.bbox.x0.total_cmp(&b.bbox.x0));
            let mut text = String::new();
            let mut prev_x1: Option<f32> = None;
            for glyph in line {
                if let Some(px1) = prev_x1 {
                    if glyph.bbox.x0 - px1 > space_threshold {
                        text.push(' ');
                    }
                }
                text.push(glyph.ch);
                prev_x1 = Some(glyph.bbox.x1);
            }
            out.push(text);
        }
        out.join("\n")
    }
}

/// Line and word-gap tolerances derived from the median glyph height.
fn thresholds(glyphs: &[&Glyph]) -> (f32, f32) {
    let mut heights: Vec<f32> = glyphs
        .iter()
        .map(|g| g.bbox.bottom - g.bbox.top)
        .filter(|h| *h > 0.0)
        .collect();
    if heights.is_empty() {
        return (2.0, 1.0);
    }
    heights.sort_by(|a, b| a.total_cmp(b));
    let median = heights[heights.len() / 2];
    ((median * 0.4).max(2.0), (median * 0.15).max(1.0))
}

/// Split glyphs into words on whitespace, line jumps and wide gaps.
fn group_words(glyphs: &[Glyph]) -> Vec<Word> {
    let mut words = Vec::new();
    let mut text = String::new();
    let mut bbox: Option<BoundingBox> = None;

    let mut flush = |text: &mut String, bbox: &mut Option<BoundingBox>| {
        if let Some(b) = bbox.take() {
            if !text.is_empty() {
                words.push(Word {
                    text: std::mem::take(text),
                    bbox: b,
                });
            }
        }
        text.clear();
    };

    for glyph in glyphs {
        if glyph.ch.is_whitespace() {
            flush(&mut text, &mut bbox);
            continue;
        }
        if let Some(current) = bbox {
            let height = (current.bottom - current.top).max(1.0);
            let same_line = (glyph.bbox.top - current.top).abs() <= height * 0.5;
            let gap = glyph.bbox.x0 - current.x1;
            if !same_line || gap > height * 0.3 || gap < -height {
                flush(&mut text, &mut bbox);
            }
        }
        text.push(glyph.ch);
        bbox = Some(match bbox {
            Some(b) => b.union(&glyph.bbox),
            None => glyph.bbox,
        });
    }
    flush(&mut text, &mut bbox);
    words
}

/// A box on one page, in layout space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Region {
    /// Zero-based page index
    pub page: usize,
    pub bbox: BoundingBox,
}

/// Source of per-page layout geometry
pub trait LayoutBackend: Send + Sync {
    /// Load layouts for the given zero-based page indices, in the same order.
    fn load_pages(&self, data: &[u8], pages: &[usize]) -> Result<Vec<PageLayout>>;

    /// Crop each region out of its page and return the text inside it,
    /// one entry per region, lines separated by newlines.
    ///
    /// The default reflows the glyphs of owned [`PageLayout`]s.
    fn crop_text(&self, data: &[u8], regions: &[Region]) -> Result<Vec<String>> {
        let mut pages: Vec<usize> = regions.iter().map(|r| r.page).collect();
        pages.sort_unstable();
        pages.dedup();
        let layouts = self.load_pages(data, &pages)?;
        Ok(regions
            .iter()
            .map(|region| {
                layouts
                    .iter()
                    .find(|l| l.index == region.page)
                    .map(|l| l.reflow_within(&region.bbox))
                    .unwrap_or_default()
            })
            .collect())
    }
}

/// PDFium-backed layout extraction
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfiumLayout;

const BACKEND: &str = "layout";

impl PdfiumLayout {
    /// Get PDFium instance (creates new instance each time - PDFium is not thread-safe)
    fn create_pdfium() -> Result<Pdfium> {
        let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| {
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(
                    "/opt/pdfium/lib",
                ))
            })
            .or_else(|_| Pdfium::bind_to_system_library())
            .map_err(|e| Error::PartialBackendFailure {
                backend: BACKEND,
                reason: format!("Failed to initialize PDFium: {}", e),
            })?;

        Ok(Pdfium::new(bindings))
    }

    fn open<'a>(pdfium: &'a Pdfium, data: &'a [u8]) -> Result<PdfDocument<'a>> {
        pdfium
            .load_pdf_from_byte_slice(data, None)
            .map_err(|e| Error::PartialBackendFailure {
                backend: BACKEND,
                reason: format!("{}", e),
            })
    }

    fn page<'a>(pages: &PdfPages<'a>, index: usize) -> Result<PdfPage<'a>> {
        pages
            .get(index as u16)
            .map_err(|e| Error::PartialBackendFailure {
                backend: BACKEND,
                reason: format!("Failed to get page {}: {}", index + 1, e),
            })
    }

    fn collect_glyphs(page: &PdfPage, height: f32) -> Vec<Glyph> {
        let text = match page.text() {
            Ok(t) => t,
            Err(_) => return Vec::new(),
        };

        let mut glyphs = Vec::new();
        for segment in text.segments().iter() {
            if let Ok(chars) = segment.chars() {
                for char_result in chars.iter() {
                    let Some(ch) = char_result.unicode_char() else {
                        continue;
                    };
                    if let Ok(bounds) = char_result.loose_bounds() {
                        // PDFium reports PDF user space; flip into layout space
                        glyphs.push(Glyph {
                            ch,
                            bbox: BoundingBox::new(
                                bounds.left().value,
                                height - bounds.top().value,
                                bounds.right().value,
                                height - bounds.bottom().value,
                            ),
                        });
                    }
                }
            }
            // Segments are runs of text; keep them from fusing into one word
            glyphs.push(Glyph {
                ch: ' ',
                bbox: BoundingBox::new(0.0, 0.0, 0.0, 0.0),
            });
        }
        glyphs
    }
}

impl LayoutBackend for PdfiumLayout {
    fn load_pages(&self, data: &[u8], pages: &[usize]) -> Result<Vec<PageLayout>> {
        let pdfium = Self::create_pdfium()?;
        let document = Self::open(&pdfium, data)?;

        let doc_pages = document.pages();
        let mut layouts = Vec::with_capacity(pages.len());
        for &index in pages {
            let page = Self::page(doc_pages, index)?;
            let width = page.width().value;
            let height = page.height().value;
            let glyphs = Self::collect_glyphs(&page, height);
            tracing::debug!(page = index + 1, glyphs = glyphs.len(), "layout page loaded");
            layouts.push(PageLayout::from_glyphs(index, width, height, glyphs));
        }
        Ok(layouts)
    }

    fn crop_text(&self, data: &[u8], regions: &[Region]) -> Result<Vec<String>> {
        let pdfium = Self::create_pdfium()?;
        let document = Self::open(&pdfium, data)?;
        let doc_pages = document.pages();

        let mut out = Vec::with_capacity(regions.len());
        for region in regions {
            let page = Self::page(doc_pages, region.page)?;
            let height = page.height().value;
            let text = page.text().map_err(|e| Error::PartialBackendFailure {
                backend: BACKEND,
                reason: format!("Failed to get text of page {}: {}", region.page + 1, e),
            })?;
            // PDFium crops in PDF user space, so flip the box back
            let rect = PdfRect::new_from_values(
                height - region.bbox.bottom,
                region.bbox.x0,
                height - region.bbox.top,
                region.bbox.x1,
            );
            out.push(text.inside_rect(rect));
        }
        tracing::debug!(regions = regions.len(), "layout regions cropped");
        Ok(out)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Lay out `text` as a single line of 5x10 glyphs starting at (x, top).
    pub(crate) fn line_glyphs(text: &str, x: f32, top: f32) -> Vec<Glyph> {
        text.chars()
            .enumerate()
            .map(|(i, ch)| {
                let x0 = x + i as f32 * 5.0;
                Glyph {
                    ch,
                    bbox: BoundingBox::new(x0, top, x0 + 5.0, top + 10.0),
                }
            })
            .collect()
    }

    #[test]
    fn test_group_words_splits_on_whitespace() {
        let page = PageLayout::from_glyphs(0, 600.0, 800.0, line_glyphs("Hello World", 10.0, 100.0));
        let words: Vec<&str> = page.words().iter().map(|w| w.text.as_str()).collect();
        assert_eq!(words, vec!["Hello", "World"]);
        assert_eq!(page.words()[0].bbox, BoundingBox::new(10.0, 100.0, 35.0, 110.0));
    }

    #[test]
    fn test_group_words_splits_on_line_change() {
        let mut glyphs = line_glyphs("ab", 10.0, 100.0);
        glyphs.extend(line_glyphs("cd", 10.0, 130.0));
        let page = PageLayout::from_glyphs(0, 600.0, 800.0, glyphs);
        let words: Vec<&str> = page.words().iter().map(|w| w.text.as_str()).collect();
        assert_eq!(words, vec!["ab", "cd"]);
    }

    #[test]
    fn test_reflow_within_crops_and_breaks_lines() {
        let mut glyphs = line_glyphs("first line", 10.0, 100.0);
        glyphs.extend(line_glyphs("second", 10.0, 115.0));
        glyphs.extend(line_glyphs("outside", 10.0, 300.0));
        let page = PageLayout::from_glyphs(0, 600.0, 800.0, glyphs);

        let text = page.reflow_within(&BoundingBox::new(9.0, 99.0, 100.0, 126.0));
        assert_eq!(text, "first line\nsecond");
    }

    #[test]
    fn test_reflow_within_requires_full_containment() {
        let page = PageLayout::from_glyphs(0, 600.0, 800.0, line_glyphs("abc", 10.0, 100.0));
        // Cuts through the middle of "b"
        let text = page.reflow_within(&BoundingBox::new(9.0, 99.0, 17.0, 111.0));
        assert_eq!(text, "a");
    }

    /// Every requested page holds the same two lines of glyphs.
    struct GlyphPages;

    impl LayoutBackend for GlyphPages {
        fn load_pages(&self, _data: &[u8], pages: &[usize]) -> Result<Vec<PageLayout>> {
            Ok(pages
                .iter()
                .map(|&i| {
                    let mut glyphs = line_glyphs("first line", 10.0, 100.0);
                    glyphs.extend(line_glyphs("second", 10.0, 115.0));
                    PageLayout::from_glyphs(i, 600.0, 800.0, glyphs)
                })
                .collect())
        }
    }

    #[test]
    fn test_default_crop_text_reflows_each_region() {
        let regions = [
            Region {
                page: 1,
                bbox: BoundingBox::new(9.0, 99.0, 100.0, 126.0),
            },
            Region {
                page: 0,
                bbox: BoundingBox::new(9.0, 99.0, 100.0, 111.0),
            },
            Region {
                page: 1,
                bbox: BoundingBox::new(300.0, 300.0, 400.0, 400.0),
            },
        ];
        let crops = GlyphPages.crop_text(b"", &regions).unwrap();
        assert_eq!(crops, vec!["first line\nsecond", "first line", ""]);
    }

    #[test]
    fn test_words_only_page_has_no_reflow() {
        let page = PageLayout::from_words(
            0,
            600.0,
            800.0,
            vec![Word::new("Hello", 0.0, 0.0, 10.0, 5.0)],
        );
        assert_eq!(page.reflow_within(&BoundingBox::new(0.0, 0.0, 50.0, 50.0)), "");
        assert_eq!(page.text(), "");
    }

    #[test]
    fn test_page_text() {
        let mut glyphs = line_glyphs("Title", 50.0, 40.0);
        glyphs.extend(line_glyphs("Body text", 50.0, 80.0));
        let page = PageLayout::from_glyphs(0, 600.0, 800.0, glyphs);
        assert_eq!(page.text(), "Title\nBody text");
    }
}
