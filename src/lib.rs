//! PDF Annotator MCP Server Library
//!
//! This crate provides MCP tools for reading PDF annotations:
//! - `extract_annotations`: Annotation dictionaries filtered by type
//! - `extract_highlights_with_context`: Highlights paired with the text they cover
//! - `read_pdf_text`: Page text and document metadata
//! - `list_pdf_files`: PDFs under the accessible directories
//! - `extract_annotations_from_uri`: Every annotation of a `file://` resource
//!
//! All file access goes through a [`source::Sandbox`] fixed at startup.

pub mod config;
pub mod error;
pub mod pdf;
pub mod server;
pub mod source;

pub use config::ServerConfig;
pub use error::{Error, Result};
pub use server::{run_server_with_config, AnnotatorServer};
pub use source::{ResolvedFile, Sandbox};
