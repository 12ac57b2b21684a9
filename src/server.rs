//! MCP Server implementation using rmcp

use crate::config::{ServerConfig, ALLOWED_EXTENSIONS};
use crate::error::Error;
use crate::pdf::{
    extract_annotations, highlights_from_bytes, parse_include_types, AnnotationRecord,
    HighlightContext, LayoutBackend, PageSelection, PdfiumLayout,
};
use crate::source::{collect_pdfs, list_pdf_files, ResolvedFile, Sandbox};
use anyhow::Result;
use percent_encoding::percent_decode_str;
use rmcp::{
    handler::server::tool::ToolRouter, handler::server::wrapper::Parameters, model::*,
    schemars::JsonSchema, service::RequestContext, tool, tool_handler, tool_router, RoleServer,
    ServerHandler, ServiceExt,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

fn default_include_types() -> String {
    "Highlight,Text".to_string()
}

fn default_true() -> bool {
    true
}

fn default_directory() -> String {
    "all".to_string()
}

fn default_limit() -> i64 {
    50
}

// ============================================================================
// Request types
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ExtractAnnotationsParams {
    /// File name, name fragment, or absolute path of a PDF inside the accessible directories
    pub file_path: String,
    /// Pages to read: "first", "last", "N", "S-E", "S-" or "-E" (1-indexed). Omit for all pages.
    #[serde(default)]
    pub page_range: Option<String>,
    /// Comma-separated annotation types to include (case-insensitive, leading "/" ignored).
    /// An empty string includes every type.
    #[serde(default = "default_include_types")]
    pub include_types: String,
    /// Drop annotations whose content and author are both empty (default: true)
    #[serde(default = "default_true")]
    pub drop_empty: bool,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct HighlightParams {
    /// File name, name fragment, or absolute path of a PDF inside the accessible directories
    pub file_path: String,
    /// Pages to read: "first", "last", "N", "S-E", "S-" or "-E" (1-indexed). Omit for all pages.
    #[serde(default)]
    pub page_range: Option<String>,
    /// Drop highlights with neither underlying text nor a note (default: true)
    #[serde(default = "default_true")]
    pub drop_empty: bool,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ReadPdfTextParams {
    /// File name, name fragment, or absolute path of a PDF inside the accessible directories
    pub file_path: String,
    /// Pages to read: "first", "last", "N", "S-E", "S-" or "-E" (1-indexed). Omit for all pages.
    #[serde(default)]
    pub page_range: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ResourceUriParams {
    /// The file:// URI of a PDF resource, as returned by the resource list
    pub resource_uri: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListPdfFilesParams {
    /// "all", a directory path inside an accessible root, or a fragment of a root's name
    #[serde(default = "default_directory")]
    pub directory: String,
    /// Subdirectory levels to descend (0 = root only, clamped to 5)
    #[serde(default)]
    pub depth: i64,
    /// Maximum files shown per directory, most recent first (clamped to 1..200)
    #[serde(default = "default_limit")]
    pub limit: i64,
}

// ============================================================================
// Response types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct AnnotationsResult {
    pub file_name: String,
    pub path: String,
    pub page_range: String,
    pub total_annotations: usize,
    pub annotations: Vec<AnnotationRecord>,
}

#[derive(Debug, Serialize)]
pub struct PageText {
    /// Page number (1-indexed)
    pub page_number: usize,
    pub text: String,
    pub char_count: usize,
}

#[derive(Debug, Default, Serialize)]
pub struct MetadataInfo {
    pub title: String,
    pub author: String,
    pub subject: String,
    pub creator: String,
    pub producer: String,
    pub creation_date: String,
    pub mod_date: String,
}

#[derive(Debug, Serialize)]
pub struct ReadTextResult {
    pub file_name: String,
    pub total_pages: usize,
    pub page_range: String,
    pub extracted_pages: Vec<PageText>,
    pub metadata: MetadataInfo,
}

#[derive(Debug, Serialize)]
pub struct AccessibleDirectories {
    pub accessible_directories: Vec<String>,
    pub directory_count: usize,
    pub max_file_size_mb: u64,
    pub allowed_extensions: Vec<String>,
}

/// PDF Annotator MCP Server
#[derive(Clone)]
pub struct AnnotatorServer {
    sandbox: Arc<Sandbox>,
    layout: Arc<dyn LayoutBackend>,
    tool_router: ToolRouter<Self>,
}

fn scope(page_range: &Option<String>) -> String {
    page_range.clone().unwrap_or_else(|| "all".to_string())
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to serialize response");
        format!("Error: {}", Error::Serialization(e).client_message())
    })
}

fn error_text(tool: &str, e: &Error) -> String {
    tracing::warn!(tool, error = %e, "tool failed");
    format!("Error: {}", e.client_message())
}

/// Run CPU-bound PDF work off the async runtime.
async fn blocking<T, F>(f: F) -> crate::error::Result<T>
where
    F: FnOnce() -> crate::error::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::BackendReadFailure {
            reason: format!("Task join error: {}", e),
        })?
}

// ============================================================================
// Tool implementations
// ============================================================================

#[tool_router]
impl AnnotatorServer {
    /// Create a server over `sandbox` using PDFium for page layout
    pub fn new(sandbox: Arc<Sandbox>) -> Self {
        Self::with_layout(sandbox, Arc::new(PdfiumLayout))
    }

    /// Create a server with a specific layout backend
    pub fn with_layout(sandbox: Arc<Sandbox>, layout: Arc<dyn LayoutBackend>) -> Self {
        Self {
            sandbox,
            layout,
            tool_router: Self::tool_router(),
        }
    }

    /// Extract annotations from a PDF
    #[tool(
        description = "Extract annotations from a PDF.

file_path may be a file name, a fragment of a name, or an absolute path; the file must be inside the accessible directories.
page_range accepts first, last, N, S-E (1-indexed) or can be omitted for all pages.
include_types is a comma-separated list such as \"Highlight,Text\" (case-insensitive, leading / ignored); noisy types like Link/Popup are excluded by default.
Returns JSON with file_name, path, page_range, total_annotations and annotations[{page, type, content, author, position}]."
    )]
    async fn extract_annotations(
        &self,
        Parameters(params): Parameters<ExtractAnnotationsParams>,
    ) -> String {
        match self.process_extract_annotations(params).await {
            Ok(result) => to_json(&result),
            Err(e) => error_text("extract_annotations", &e),
        }
    }

    /// Map highlight annotations to the text beneath them
    #[tool(
        description = "Map highlight annotations to the text they cover.

Returns a JSON array of {page, author, highlighted_text, note, position}, where position is [x0, top, x1, bottom] in top-down page coordinates."
    )]
    async fn extract_highlights_with_context(
        &self,
        Parameters(params): Parameters<HighlightParams>,
    ) -> String {
        let page_range = params.page_range.clone();
        match self.process_highlights(params).await {
            Ok((name, items)) if items.is_empty() => format!(
                "No highlights (with text) found in '{}' (scope: {}).",
                name,
                scope(&page_range)
            ),
            Ok((_, items)) => to_json(&items),
            Err(e) => error_text("extract_highlights_with_context", &e),
        }
    }

    /// Compatibility wrapper for annotation extraction
    #[tool(
        description = "Compatibility wrapper: same as extract_annotations with include_types=\"Highlight,Text\"."
    )]
    async fn extract_pdf_annotations(
        &self,
        Parameters(params): Parameters<HighlightParams>,
    ) -> String {
        self.extract_annotations(Parameters(ExtractAnnotationsParams {
            file_path: params.file_path,
            page_range: params.page_range,
            include_types: default_include_types(),
            drop_empty: params.drop_empty,
        }))
        .await
    }

    /// Compatibility wrapper for highlight mapping
    #[tool(description = "Compatibility wrapper: same as extract_highlights_with_context.")]
    async fn extract_annotations_with_context(
        &self,
        Parameters(params): Parameters<HighlightParams>,
    ) -> String {
        self.extract_highlights_with_context(Parameters(params))
            .await
    }

    /// Read a PDF resource through a tool call
    #[tool(
        description = "Extract every annotation from a PDF resource URI (file://...) taken from the resource list.

Useful for clients that cannot read resources directly. Returns the same JSON as reading the resource."
    )]
    async fn extract_annotations_from_uri(
        &self,
        Parameters(params): Parameters<ResourceUriParams>,
    ) -> String {
        if !params.resource_uri.starts_with("file://") {
            return "Error: resource_uri is required. Must be a file:// URI.".to_string();
        }
        match self.process_read_resource(&params.resource_uri).await {
            Ok(text) => text,
            Err(e) => error_text("extract_annotations_from_uri", &e),
        }
    }

    /// Extract page text and document metadata
    #[tool(
        description = "Extract page text and basic PDF metadata.

Returns JSON with file_name, total_pages, page_range, extracted_pages[{page_number, text, char_count}] and metadata{title, author, subject, creator, producer, creation_date, mod_date}."
    )]
    async fn read_pdf_text(&self, Parameters(params): Parameters<ReadPdfTextParams>) -> String {
        match self.process_read_text(params).await {
            Ok(result) => to_json(&result),
            Err(e) => error_text("read_pdf_text", &e),
        }
    }

    /// List PDFs under the accessible directories
    #[tool(
        description = "List PDFs under the accessible directories, most recent first.

directory: \"all\" scans every root; otherwise a directory path inside a root, or a fragment matched against root names and paths.
depth: 0 lists only the directory itself; each step descends one more level (max 5).
limit: files shown per directory (1..200).
Use show_accessible_directories to see which roots exist."
    )]
    async fn list_pdf_files(&self, Parameters(params): Parameters<ListPdfFilesParams>) -> String {
        let sandbox = Arc::clone(&self.sandbox);
        let result = tokio::task::spawn_blocking(move || {
            list_pdf_files(&sandbox, &params.directory, params.depth, params.limit)
        })
        .await;
        result.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "list_pdf_files failed");
            "Error: Failed to list PDF files".to_string()
        })
    }

    /// Show the directory and size constraints in effect
    #[tool(description = "Return the accessible directories and file constraints as JSON.")]
    async fn show_accessible_directories(&self) -> String {
        to_json(&self.accessible_directories())
    }
}

impl AnnotatorServer {
    pub fn sandbox(&self) -> &Sandbox {
        &self.sandbox
    }

    fn accessible_directories(&self) -> AccessibleDirectories {
        let dirs: Vec<String> = self
            .sandbox
            .roots()
            .iter()
            .map(|p| p.display().to_string())
            .collect();
        AccessibleDirectories {
            directory_count: dirs.len(),
            accessible_directories: dirs,
            max_file_size_mb: self.sandbox.max_file_size() / (1024 * 1024),
            allowed_extensions: ALLOWED_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        }
    }

    fn read_file(file: &ResolvedFile) -> crate::error::Result<Vec<u8>> {
        std::fs::read(&file.path).map_err(|e| {
            tracing::warn!(path = %file.path.display(), error = %e, "failed to read file");
            Error::Io(e)
        })
    }

    async fn process_extract_annotations(
        &self,
        params: ExtractAnnotationsParams,
    ) -> crate::error::Result<AnnotationsResult> {
        let file = self.sandbox.locate(&params.file_path)?;
        let include = parse_include_types(&params.include_types);
        let page_range = params.page_range.clone();
        let drop_empty = params.drop_empty;

        let path = file.path.clone();
        let annotations = blocking(move || {
            let data = Self::read_file(&file)?;
            let selection = PageSelection::load(&data, page_range.as_deref())?;
            extract_annotations(&selection.document, &selection.pages, &include, drop_empty)
        })
        .await?;

        Ok(AnnotationsResult {
            file_name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            path: path.display().to_string(),
            page_range: scope(&params.page_range),
            total_annotations: annotations.len(),
            annotations,
        })
    }

    async fn process_highlights(
        &self,
        params: HighlightParams,
    ) -> crate::error::Result<(String, Vec<HighlightContext>)> {
        let file = self.sandbox.locate(&params.file_path)?;
        let name = file.file_name();
        let layout = Arc::clone(&self.layout);

        let items = blocking(move || {
            let data = Self::read_file(&file)?;
            highlights_from_bytes(
                &data,
                layout.as_ref(),
                params.page_range.as_deref(),
                params.drop_empty,
            )
        })
        .await?;

        Ok((name, items))
    }

    async fn process_read_text(
        &self,
        params: ReadPdfTextParams,
    ) -> crate::error::Result<ReadTextResult> {
        let file = self.sandbox.locate(&params.file_path)?;
        let file_name = file.file_name();
        let layout = Arc::clone(&self.layout);
        let page_range = params.page_range.clone();

        let (total_pages, extracted_pages, metadata) = blocking(move || {
            let data = Self::read_file(&file)?;
            let selection = PageSelection::load(&data, page_range.as_deref())?;
            // Page text has no fallback source, so a layout failure fails the call
            let layouts = layout
                .load_pages(&data, &selection.pages)
                .map_err(|e| Error::BackendReadFailure {
                    reason: e.to_string(),
                })?;

            let pages = layouts
                .iter()
                .map(|page| {
                    let text = page.text().trim().to_string();
                    PageText {
                        page_number: page.index + 1,
                        char_count: text.chars().count(),
                        text,
                    }
                })
                .collect::<Vec<_>>();

            let md = selection.document.metadata();
            let metadata = MetadataInfo {
                title: md.title.unwrap_or_default(),
                author: md.author.unwrap_or_default(),
                subject: md.subject.unwrap_or_default(),
                creator: md.creator.unwrap_or_default(),
                producer: md.producer.unwrap_or_default(),
                creation_date: md.creation_date.unwrap_or_default(),
                mod_date: md.mod_date.unwrap_or_default(),
            };
            Ok((selection.document.page_count(), pages, metadata))
        })
        .await?;

        Ok(ReadTextResult {
            file_name,
            total_pages,
            page_range: scope(&params.page_range),
            extracted_pages,
            metadata,
        })
    }

    /// Every sandbox-valid PDF directly inside a root, as `file://` resources
    fn resources(&self) -> Vec<Resource> {
        let mut seen = HashSet::new();
        let mut resources = Vec::new();

        for root in self.sandbox.roots() {
            for listed in collect_pdfs(&self.sandbox, root, 0) {
                let Ok(url) = url::Url::from_file_path(&listed.file.path) else {
                    continue;
                };
                let uri = url.to_string();
                if !seen.insert(uri.clone()) {
                    continue;
                }

                let mut resource = RawResource::new(uri, listed.file.file_name());
                resource.mime_type = Some("application/pdf".to_string());
                resource.description = Some(format!(
                    "PDF file with annotations ({} bytes)",
                    listed.file.size
                ));
                resource.size = u32::try_from(listed.file.size).ok();

                resources.push(Annotated {
                    raw: resource,
                    annotations: None,
                });
            }
        }
        resources
    }

    /// Map a `file://` URI back to a sandbox-approved file
    fn resolve_uri(&self, uri: &str) -> Option<ResolvedFile> {
        let raw = uri.strip_prefix("file://")?;
        // Decode only; `..` segments must reach the sandbox unnormalized
        let path = percent_decode_str(raw).decode_utf8().ok()?;
        self.sandbox.resolve(&path)
    }

    async fn process_read_resource(&self, uri: &str) -> crate::error::Result<String> {
        let file = self.resolve_uri(uri).ok_or_else(|| Error::NotFound {
            query: uri.to_string(),
        })?;
        let file_name = file.file_name();

        let annotations = blocking(move || {
            let data = Self::read_file(&file)?;
            let selection = PageSelection::load(&data, None)?;
            extract_annotations(&selection.document, &selection.pages, &HashSet::new(), false)
        })
        .await?;

        let body = if annotations.is_empty() {
            serde_json::json!({
                "file_name": file_name,
                "message": "No annotations found in this PDF.",
                "accessible_directories": self.accessible_directories().accessible_directories,
            })
        } else {
            serde_json::json!({
                "file_name": file_name,
                "total_annotations": annotations.len(),
                "annotations": annotations,
            })
        };
        Ok(serde_json::to_string_pretty(&body)?)
    }
}

#[tool_handler]
impl ServerHandler for AnnotatorServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "PDF Annotator extracts annotations and highlighted text from PDFs in the \
                 accessible directories. Use list_pdf_files to discover files, then \
                 extract_highlights_with_context or extract_annotations. PDFs directly inside \
                 each directory are also exposed as resources."
                    .into(),
            ),
        }
    }

    /// List PDF resources from the accessible directories
    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, ErrorData> {
        let server = self.clone();
        let resources = tokio::task::spawn_blocking(move || server.resources())
            .await
            .map_err(|e| ErrorData::internal_error(format!("Task join error: {}", e), None))?;

        Ok(ListResourcesResult {
            resources,
            next_cursor: None,
            meta: Default::default(),
        })
    }

    /// Read a PDF resource and return all of its annotations
    async fn read_resource(
        &self,
        request: ReadResourceRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, ErrorData> {
        let uri = &request.uri;
        if !uri.starts_with("file://") {
            return Err(ErrorData::invalid_params(
                "Only file:// URIs are supported",
                None,
            ));
        }

        match self.process_read_resource(uri).await {
            Ok(text) => Ok(ReadResourceResult {
                contents: vec![ResourceContents::TextResourceContents {
                    uri: uri.clone(),
                    mime_type: Some("application/json".to_string()),
                    text,
                    meta: Default::default(),
                }],
            }),
            Err(e @ Error::NotFound { .. }) => {
                tracing::warn!(uri = %uri, "resource outside accessible directories");
                Err(ErrorData::resource_not_found(e.client_message(), None))
            }
            Err(e) => {
                tracing::warn!(error = %e, "read_resource failed");
                Err(ErrorData::internal_error(e.client_message(), None))
            }
        }
    }
}

/// Run the MCP server over stdio with the given configuration
pub async fn run_server_with_config(config: ServerConfig) -> Result<()> {
    let sandbox = Sandbox::from_config(&config)?;
    for root in sandbox.roots() {
        tracing::info!(path = %root.display(), "accessible directory");
    }
    tracing::info!(
        max_file_size = sandbox.max_file_size(),
        "PDF Annotator MCP Server ready, waiting for connections..."
    );

    let server = AnnotatorServer::new(Arc::new(sandbox));
    let service = server.serve(rmcp::transport::io::stdio()).await?;
    service.waiting().await?;

    Ok(())
}
