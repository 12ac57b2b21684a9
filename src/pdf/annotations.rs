//! Annotation extraction across both backends
//!
//! Plain annotations come from the structural reader alone. Highlights are
//! correlated with page text by geometry only: the two backends are separate
//! passes over the same bytes and share no object identity.

use crate::error::Result;
use crate::pdf::correlate::{crop_box, extract_text};
use crate::pdf::geometry::{union_boxes, BoundingBox};
use crate::pdf::layout::{LayoutBackend, PageLayout, Region};
use crate::pdf::page_range::parse_page_range;
use crate::pdf::structure::{RawAnnotation, StructuralDocument};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Annotation as reported by `extract_annotations`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnotationRecord {
    /// Page number (1-indexed)
    pub page: u32,
    /// Subtype with a leading slash, e.g. `/Highlight`
    #[serde(rename = "type")]
    pub annotation_type: String,
    pub content: String,
    pub author: String,
    /// Raw `/Rect` in PDF user space; empty when the annotation has none
    pub position: Vec<f32>,
}

/// A highlight merged with the page text it covers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HighlightContext {
    /// Page number (1-indexed)
    pub page: u32,
    pub author: String,
    pub highlighted_text: String,
    pub note: String,
    /// Union of all highlighted line boxes, in layout space
    pub position: BoundingBox,
}

/// Parse a comma-separated type filter such as `"Highlight,/Text"`.
///
/// Names are trimmed, stripped of a leading `/` and lowercased. An empty
/// result means "no filter".
pub fn parse_include_types(spec: &str) -> HashSet<String> {
    spec.split(',')
        .map(|t| t.trim().trim_start_matches('/').to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

/// `highlight` -> `/Highlight`, `FreeText` -> `/Freetext`
fn display_type(subtype: &str) -> String {
    let lower = subtype.to_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => format!("/{}{}", first.to_uppercase(), chars.as_str()),
        None => "/".to_string(),
    }
}

/// Collect annotations on `pages`, keeping only subtypes in `include_types`.
pub fn extract_annotations(
    doc: &StructuralDocument,
    pages: &[usize],
    include_types: &HashSet<String>,
    drop_empty: bool,
) -> Result<Vec<AnnotationRecord>> {
    let mut records = Vec::new();

    for &index in pages {
        for annot in doc.annotations(index)? {
            if !include_types.is_empty() && !include_types.contains(&annot.kind()) {
                continue;
            }

            let record = AnnotationRecord {
                page: annot.page,
                annotation_type: display_type(&annot.subtype),
                content: annot.note(),
                author: annot.author(),
                position: annot.rect.map(|r| r.to_vec()).unwrap_or_default(),
            };
            if drop_empty && record.content.is_empty() && record.author.is_empty() {
                continue;
            }
            records.push(record);
        }
    }

    tracing::debug!(count = records.len(), "annotations extracted");
    Ok(records)
}

/// Layout-space boxes for a highlight: one per complete quad, else the `/Rect`.
pub fn highlight_boxes(annot: &RawAnnotation, page_height: f32) -> Vec<BoundingBox> {
    let quads: Vec<BoundingBox> = annot
        .quad_points
        .chunks_exact(8)
        .filter_map(|quad| BoundingBox::from_quad(page_height, quad))
        .collect();
    if !quads.is_empty() {
        return quads;
    }
    annot
        .rect
        .map(|rect| vec![BoundingBox::from_pdf_rect(page_height, rect)])
        .unwrap_or_default()
}

/// A highlight whose boxes are known but whose text is not yet correlated
struct PendingHighlight {
    annot: RawAnnotation,
    index: usize,
    boxes: Vec<BoundingBox>,
    position: BoundingBox,
}

/// Pair every highlight on `pages` with the text under it.
///
/// When the layout backend fails, highlights are still reported with their
/// converted geometry but no correlated text.
pub fn extract_highlights_with_context(
    doc: &StructuralDocument,
    data: &[u8],
    layout: &dyn LayoutBackend,
    pages: &[usize],
    drop_empty: bool,
) -> Result<Vec<HighlightContext>> {
    let layouts = load_layouts(layout, data, pages);
    let by_index: HashMap<usize, &PageLayout> = layouts
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(|page| (page.index, page))
        .collect();

    let mut pending = Vec::new();
    for &index in pages {
        let page_height = by_index
            .get(&index)
            .map(|l| l.height)
            .unwrap_or_else(|| doc.page_height(index));

        for annot in doc.annotations(index)? {
            if annot.kind() != "highlight" {
                continue;
            }
            let boxes = highlight_boxes(&annot, page_height);
            let Some(position) = union_boxes(&boxes) else {
                continue;
            };
            pending.push(PendingHighlight {
                annot,
                index,
                boxes,
                position,
            });
        }
    }

    let regions: Vec<Region> = pending
        .iter()
        .filter(|h| by_index.contains_key(&h.index))
        .flat_map(|h| {
            h.boxes.iter().map(|b| Region {
                page: h.index,
                bbox: crop_box(b),
            })
        })
        .collect();
    let mut crops = crop_regions(layout, data, &regions).into_iter();

    let mut out = Vec::new();
    for highlight in pending {
        // Per-box text keeps each visual line's words together, in quad order
        let highlighted_text = match by_index.get(&highlight.index) {
            Some(page) => highlight
                .boxes
                .iter()
                .map(|b| {
                    let cropped = crops.next().unwrap_or_default();
                    extract_text(&cropped, page.words(), b)
                })
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join(" ")
                .trim()
                .to_string(),
            None => String::new(),
        };

        let item = HighlightContext {
            page: highlight.annot.page,
            author: highlight.annot.author(),
            highlighted_text,
            note: highlight.annot.note(),
            position: highlight.position,
        };
        if drop_empty && item.highlighted_text.is_empty() && item.note.is_empty() {
            continue;
        }
        out.push(item);
    }

    tracing::debug!(count = out.len(), "highlights correlated");
    Ok(out)
}

/// Backend crops for `regions`, or blanks so word grouping takes over.
fn crop_regions(layout: &dyn LayoutBackend, data: &[u8], regions: &[Region]) -> Vec<String> {
    if regions.is_empty() {
        return Vec::new();
    }
    match layout.crop_text(data, regions) {
        Ok(crops) if crops.len() == regions.len() => crops,
        Ok(crops) => {
            tracing::warn!(
                expected = regions.len(),
                got = crops.len(),
                "layout backend returned a mismatched crop count, grouping words instead"
            );
            vec![String::new(); regions.len()]
        }
        Err(e) => {
            tracing::warn!(error = %e, "layout crop failed, grouping words instead");
            vec![String::new(); regions.len()]
        }
    }
}

/// Parsed document plus the page indices a request asked for
pub struct PageSelection {
    pub document: StructuralDocument,
    pub pages: Vec<usize>,
}

impl PageSelection {
    pub fn load(data: &[u8], page_range: Option<&str>) -> Result<Self> {
        let document = StructuralDocument::load(data)?;
        let pages = parse_page_range(document.page_count(), page_range)?;
        Ok(Self { document, pages })
    }
}

/// Load layouts for the selected pages, or `None` if the layout backend fails.
pub fn load_layouts(
    layout: &dyn LayoutBackend,
    data: &[u8],
    pages: &[usize],
) -> Option<Vec<PageLayout>> {
    match layout.load_pages(data, pages) {
        Ok(layouts) => Some(layouts),
        Err(e) => {
            tracing::warn!(error = %e, "layout backend failed, using raw annotation geometry");
            None
        }
    }
}

/// Highlights with their text, straight from PDF bytes.
pub fn highlights_from_bytes(
    data: &[u8],
    layout: &dyn LayoutBackend,
    page_range: Option<&str>,
    drop_empty: bool,
) -> Result<Vec<HighlightContext>> {
    let selection = PageSelection::load(data, page_range)?;
    extract_highlights_with_context(
        &selection.document,
        data,
        layout,
        &selection.pages,
        drop_empty,
    )
}
