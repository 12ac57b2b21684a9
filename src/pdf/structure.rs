//! Structural reader: raw annotation dictionaries via lopdf
//!
//! Geometry is returned untouched, in PDF user space. Conversion into
//! layout space happens in the merger.

use crate::error::{Error, Result};
use lopdf::{Dictionary, Document, Object, ObjectId};

/// US Letter height, used when a page has no usable MediaBox.
const DEFAULT_PAGE_HEIGHT: f32 = 792.0;

/// One entry of a page's `/Annots` array
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawAnnotation {
    /// Page number (1-indexed)
    pub page: u32,
    /// `/Subtype` without the leading slash, as written in the file
    pub subtype: String,
    pub contents: Option<String>,
    /// `/RC` rich-text contents
    pub rich_text: Option<String>,
    /// `/Contents` of the attached `/Popup`
    pub popup_contents: Option<String>,
    /// `/T`, falling back to `/Title`
    pub author: Option<String>,
    /// `/Rect` as `[llx, lly, urx, ury]`
    pub rect: Option<[f32; 4]>,
    /// Flat `/QuadPoints` list, eight values per quadrilateral
    pub quad_points: Vec<f32>,
}

impl RawAnnotation {
    /// Note text: direct contents, then rich text, then the pop-up's contents.
    pub fn note(&self) -> String {
        [&self.contents, &self.rich_text, &self.popup_contents]
            .into_iter()
            .flatten()
            .find(|s| !s.is_empty())
            .cloned()
            .unwrap_or_default()
    }

    pub fn author(&self) -> String {
        self.author.clone().unwrap_or_default()
    }

    /// Lowercased subtype for filtering
    pub fn kind(&self) -> String {
        self.subtype.to_lowercase()
    }
}

/// Document information dictionary
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub creation_date: Option<String>,
    pub mod_date: Option<String>,
}

/// A parsed PDF as seen by the structural reader
pub struct StructuralDocument {
    doc: Document,
    page_ids: Vec<ObjectId>,
}

impl std::fmt::Debug for StructuralDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StructuralDocument")
            .field("page_count", &self.page_ids.len())
            .finish_non_exhaustive()
    }
}

impl StructuralDocument {
    /// Parse a PDF from bytes.
    pub fn load(data: &[u8]) -> Result<Self> {
        if data.len() < 4 || &data[0..4] != b"%PDF" {
            return Err(Error::BackendReadFailure {
                reason: "Not a valid PDF file".to_string(),
            });
        }

        let doc = Document::load_mem(data).map_err(|e| Error::BackendReadFailure {
            reason: format!("failed to parse PDF: {}", e),
        })?;
        if doc.is_encrypted() {
            return Err(Error::PasswordRequired);
        }

        // get_pages is keyed by 1-based page number, already in order
        let page_ids = doc.get_pages().values().copied().collect();
        Ok(Self { doc, page_ids })
    }

    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    /// Height of the page's MediaBox, inherited through the page tree.
    pub fn page_height(&self, index: usize) -> f32 {
        let Some(&page_id) = self.page_ids.get(index) else {
            return DEFAULT_PAGE_HEIGHT;
        };
        self.inherited(page_id, b"MediaBox")
            .and_then(|obj| self.numbers(obj))
            .filter(|nums| nums.len() == 4)
            .map(|nums| (nums[3] - nums[1]).abs())
            .unwrap_or(DEFAULT_PAGE_HEIGHT)
    }

    /// All annotations on the page at zero-based `index`.
    pub fn annotations(&self, index: usize) -> Result<Vec<RawAnnotation>> {
        let page_id = *self
            .page_ids
            .get(index)
            .ok_or_else(|| Error::BackendReadFailure {
                reason: format!("page {} does not exist", index + 1),
            })?;
        let page = self
            .doc
            .get_object(page_id)
            .and_then(|obj| obj.as_dict())
            .map_err(|e| Error::BackendReadFailure {
                reason: format!("failed to read page {}: {}", index + 1, e),
            })?;

        let Some(annots) = page
            .get(b"Annots")
            .ok()
            .map(|obj| self.resolve(obj))
            .and_then(|obj| obj.as_array().ok())
        else {
            return Ok(Vec::new());
        };

        let mut out = Vec::with_capacity(annots.len());
        for entry in annots {
            let Ok(dict) = self.resolve(entry).as_dict() else {
                continue;
            };
            out.push(self.read_annotation(index, dict));
        }
        Ok(out)
    }

    fn read_annotation(&self, index: usize, dict: &Dictionary) -> RawAnnotation {
        let subtype = match dict.get(b"Subtype").map(|o| self.resolve(o)) {
            Ok(Object::Name(name)) => String::from_utf8_lossy(name).into_owned(),
            _ => String::new(),
        };

        let popup_contents = dict
            .get(b"Popup")
            .ok()
            .and_then(|obj| self.resolve(obj).as_dict().ok())
            .and_then(|popup| self.text(popup, b"Contents"));

        RawAnnotation {
            page: index as u32 + 1,
            subtype,
            contents: self.text(dict, b"Contents"),
            rich_text: self.text(dict, b"RC"),
            popup_contents,
            author: self
                .text(dict, b"T")
                .filter(|s| !s.is_empty())
                .or_else(|| self.text(dict, b"Title")),
            rect: dict
                .get(b"Rect")
                .ok()
                .and_then(|obj| self.numbers(obj))
                .filter(|nums| nums.len() >= 4)
                .map(|nums| [nums[0], nums[1], nums[2], nums[3]]),
            quad_points: dict
                .get(b"QuadPoints")
                .ok()
                .and_then(|obj| self.numbers(obj))
                .unwrap_or_default(),
        }
    }

    /// The `/Info` dictionary, with absent or unreadable entries as `None`.
    pub fn metadata(&self) -> DocumentMetadata {
        let Some(info) = self
            .doc
            .trailer
            .get(b"Info")
            .ok()
            .and_then(|obj| self.resolve(obj).as_dict().ok())
        else {
            return DocumentMetadata::default();
        };

        DocumentMetadata {
            title: self.text(info, b"Title"),
            author: self.text(info, b"Author"),
            subject: self.text(info, b"Subject"),
            creator: self.text(info, b"Creator"),
            producer: self.text(info, b"Producer"),
            creation_date: self.text(info, b"CreationDate"),
            mod_date: self.text(info, b"ModDate"),
        }
    }

    fn resolve<'a>(&'a self, obj: &'a Object) -> &'a Object {
        match obj {
            Object::Reference(id) => self.doc.get_object(*id).unwrap_or(obj),
            other => other,
        }
    }

    /// Look up `key` on the page, walking up `/Parent` links.
    fn inherited(&self, page_id: ObjectId, key: &[u8]) -> Option<&Object> {
        let mut current = page_id;
        // Bounded walk; malformed trees may contain cycles
        for _ in 0..64 {
            let dict = self.doc.get_object(current).and_then(|obj| obj.as_dict()).ok()?;
            if let Ok(value) = dict.get(key) {
                return Some(self.resolve(value));
            }
            current = dict.get(b"Parent").and_then(|obj| obj.as_reference()).ok()?;
        }
        None
    }

    fn numbers(&self, obj: &Object) -> Option<Vec<f32>> {
        let array = self.resolve(obj).as_array().ok()?;
        array
            .iter()
            .map(|item| match self.resolve(item) {
                Object::Integer(i) => Some(*i as f32),
                Object::Real(f) => Some(*f as f32),
                _ => None,
            })
            .collect()
    }

    /// Text strings decode as UTF-16BE or UTF-8 when marked, else PDFDocEncoding.
    fn text(&self, dict: &Dictionary, key: &[u8]) -> Option<String> {
        match self.resolve(dict.get(key).ok()?) {
            obj @ Object::String(..) => lopdf::decode_text_string(obj).ok(),
            Object::Name(name) => Some(String::from_utf8_lossy(name).into_owned()),
            _ => None,
        }
    }
}
