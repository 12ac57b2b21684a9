//! PDF processing layer
//!
//! Two independent backends read the same bytes: lopdf for the annotation
//! dictionaries and metadata, PDFium for positioned page text. The
//! [`annotations`] module merges their output by geometry alone.

pub mod annotations;
pub mod correlate;
pub mod geometry;
pub mod layout;
pub mod page_range;
pub mod structure;

pub use annotations::{
    extract_annotations, extract_highlights_with_context, highlights_from_bytes, load_layouts,
    parse_include_types, AnnotationRecord, HighlightContext, PageSelection,
};
pub use geometry::BoundingBox;
pub use layout::{LayoutBackend, PageLayout, PdfiumLayout, Region};
pub use page_range::parse_page_range;
pub use structure::{DocumentMetadata, RawAnnotation, StructuralDocument};
