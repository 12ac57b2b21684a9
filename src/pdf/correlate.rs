//! Recover the text lying under an annotation's box
//!
//! The layout backend's crop of the padded box is tried first; when it holds
//! no text, the page's overlapping words are grouped into lines.

use crate::pdf::geometry::BoundingBox;
use crate::pdf::layout::Word;

/// Outward padding applied to every annotation box before matching.
pub const BOX_PADDING: f32 = 1.0;

/// Maximum `top` difference for two words to share a line.
pub const LINE_TOLERANCE: f32 = 3.0;

/// The region handed to the layout backend for cropping.
pub fn crop_box(bbox: &BoundingBox) -> BoundingBox {
    bbox.padded(BOX_PADDING)
}

/// Text inside `bbox`, on a single line. Empty when nothing matches.
///
/// `cropped` is the backend's text for [`crop_box`] of `bbox`.
pub fn extract_text(cropped: &str, words: &[Word], bbox: &BoundingBox) -> String {
    let collapsed = collapse_lines(cropped);
    if !collapsed.is_empty() {
        return collapsed;
    }

    text_from_words(words, &crop_box(bbox))
}

/// Join non-empty trimmed lines with single spaces.
fn collapse_lines(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Group the words overlapping `bbox` into lines and join them with spaces.
pub fn text_from_words(words: &[Word], bbox: &BoundingBox) -> String {
    let mut inside: Vec<&Word> = words.iter().filter(|w| bbox.overlaps(&w.bbox)).collect();
    if inside.is_empty() {
        return String::new();
    }
    inside.sort_by(|a, b| {
        a.bbox
            .top
            .total_cmp(&b.bbox.top)
            .then(a.bbox.x0.total_cmp(&b.bbox.x0))
    });

    let mut lines: Vec<Vec<&Word>> = Vec::new();
    for word in inside {
        let same_line = lines
            .last()
            .and_then(|line| line.last())
            .is_some_and(|last| (word.bbox.top - last.bbox.top).abs() <= LINE_TOLERANCE);
        match lines.last_mut() {
            Some(line) if same_line => line.push(word),
            _ => lines.push(vec![word]),
        }
    }

    lines
        .iter()
        .map(|line| {
            line.iter()
                .map(|w| w.text.as_str())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|t| !t.trim().is_empty())
        .map(|t| t.trim().to_string())
        .collect::<Vec<_>>()
        .join(" ")
}
