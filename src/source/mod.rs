//! Sandboxed file resolution and directory listings

pub mod listing;
pub mod resolver;

pub use listing::{collect_pdfs, list_pdf_files, ListedFile};
pub use resolver::{ResolvedFile, Sandbox};
