use std::collections::{HashMap, HashSet};
use std::io::{self, Read};
use std::path::Path;

use flate2::read::ZlibDecoder;
use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use thiserror::Error;

use super::channels_for;

/// Inherited-resource lookups stop after this many `/Parent` hops.
const MAX_PARENT_DEPTH: usize = 32;
/// Reference chains longer than this are treated as corrupt.
const MAX_REFERENCE_HOPS: usize = 8;
/// Form XObjects drawing other forms deeper than this are treated as corrupt.
const MAX_FORM_DEPTH: usize = 16;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Corrupt document: {0}")]
    CorruptDocument(String),
    #[error("Document I/O failure: {0}")]
    IoFailure(#[from] io::Error),
}

fn corrupt(e: impl std::fmt::Display) -> ExtractError {
    ExtractError::CorruptDocument(e.to_string())
}

/// One embedded image, in the order it was first drawn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedImage {
    /// Zero-based page index.
    pub page_index: usize,
    /// Zero-based position among the images drawn on that page.
    pub position:   usize,
    /// Object id of the image XObject. Only used for deduplication.
    pub identity:   ObjectId,
    pub width:      u32,
    pub height:     u32,
    pub channels:   u8,
    pub pixels:     Vec<u8>,
}

/// Per-scan deduplication state.
///
/// A fresh context is created for each document; passing the same context
/// to several scans deduplicates across them.
#[derive(Debug, Default)]
pub struct ScanContext {
    seen:                   HashSet<ObjectId>,
    pub duplicates_skipped: usize,
}

impl ScanContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` the first time `identity` is offered.
    pub fn first_sighting(&mut self, identity: ObjectId) -> bool {
        if self.seen.insert(identity) {
            true
        } else {
            self.duplicates_skipped += 1;
            false
        }
    }

    pub fn seen(&self) -> usize {
        self.seen.len()
    }
}

/// Walks pages in order and, within a page, follows the `Do` operators of
/// the content stream in order, including those inside Form XObjects.
pub struct ImageExtractor;

impl ImageExtractor {
    pub fn scan_path<P: AsRef<Path>>(path: P) -> Result<Vec<ExtractedImage>, ExtractError> {
        let bytes = std::fs::read(path)?;
        Self::scan_bytes(&bytes)
    }

    pub fn scan_bytes(bytes: &[u8]) -> Result<Vec<ExtractedImage>, ExtractError> {
        let doc = Document::load_mem(bytes).map_err(corrupt)?;
        Self::scan(&doc)
    }

    pub fn scan(doc: &Document) -> Result<Vec<ExtractedImage>, ExtractError> {
        let mut ctx = ScanContext::new();
        let images = Self::scan_with(doc, &mut ctx)?;
        if ctx.duplicates_skipped > 0 {
            log::debug!("skipped {} repeated image reference(s)", ctx.duplicates_skipped);
        }
        Ok(images)
    }

    pub fn scan_with(doc: &Document, ctx: &mut ScanContext) -> Result<Vec<ExtractedImage>, ExtractError> {
        doc.catalog().map_err(corrupt)?;
        let mut out = Vec::new();
        for (page_index, (_, page_id)) in doc.get_pages().into_iter().enumerate() {
            scan_page(doc, page_index, page_id, ctx, &mut out)?;
        }
        Ok(out)
    }
}

fn scan_page(
    doc:        &Document,
    page_index: usize,
    page_id:    ObjectId,
    ctx:        &mut ScanContext,
    out:        &mut Vec<ExtractedImage>,
) -> Result<(), ExtractError> {
    let xobjects = page_xobjects(doc, page_id)?;
    if xobjects.is_empty() {
        return Ok(());
    }

    let raw = doc.get_page_content(page_id).map_err(corrupt)?;
    let mut walk = ContentWalk { doc, page_index, position: 0, ctx, out };
    walk.run(&raw, &xobjects, 0)
}

/// Follows `Do` operators through a content stream, descending into Form
/// XObjects. `position` keeps counting across nested forms so it stays a
/// page-wide draw order.
struct ContentWalk<'a, 'c> {
    doc:        &'a Document,
    page_index: usize,
    position:   usize,
    ctx:        &'c mut ScanContext,
    out:        &'c mut Vec<ExtractedImage>,
}

impl ContentWalk<'_, '_> {
    fn run(
        &mut self,
        raw:      &[u8],
        xobjects: &HashMap<Vec<u8>, ObjectId>,
        depth:    usize,
    ) -> Result<(), ExtractError> {
        if depth > MAX_FORM_DEPTH {
            return Err(ExtractError::CorruptDocument("form XObjects nested too deep".into()));
        }
        let content = Content::decode(raw).map_err(corrupt)?;

        for op in content.operations.iter().filter(|op| op.operator == "Do") {
            let name = match op.operands.first().and_then(|o| o.as_name().ok()) {
                Some(n) => n,
                None    => continue,
            };
            let identity = match xobjects.get(name) {
                Some(id) => *id,
                None     => continue,
            };
            let stream = resolve(self.doc, self.doc.get_object(identity).map_err(corrupt)?)?
                .as_stream()
                .map_err(corrupt)?;

            match subtype(&stream.dict) {
                Some(b"Image") => {
                    let position = self.position;
                    self.position += 1;
                    if self.ctx.first_sighting(identity) {
                        self.out.push(read_image(stream, self.page_index, position, identity)?);
                    }
                }
                Some(b"Form") => {
                    // A form without its own resources draws with the caller's.
                    let inner = form_xobjects(self.doc, &stream.dict)?;
                    let resources = inner.as_ref().unwrap_or(xobjects);
                    let body = stream_data(stream)?;
                    self.run(&body, resources, depth + 1)?;
                }
                _ => {}
            }
        }
        Ok(())
    }
}

fn form_xobjects(doc: &Document, dict: &Dictionary) -> Result<Option<HashMap<Vec<u8>, ObjectId>>, ExtractError> {
    match dict.get(b"Resources") {
        Ok(resources) => {
            let resources = resolve(doc, resources)?.as_dict().map_err(corrupt)?;
            let mut found = HashMap::new();
            collect_xobjects(doc, resources, &mut found)?;
            Ok(Some(found))
        }
        Err(_) => Ok(None),
    }
}

fn collect_xobjects(
    doc:       &Document,
    resources: &Dictionary,
    found:     &mut HashMap<Vec<u8>, ObjectId>,
) -> Result<(), ExtractError> {
    if let Ok(xobjects) = resources.get(b"XObject") {
        let xobjects = resolve(doc, xobjects)?.as_dict().map_err(corrupt)?;
        for (name, value) in xobjects.iter() {
            match value {
                Object::Reference(id) => {
                    found.entry(name.clone()).or_insert(*id);
                }
                _ => return Err(ExtractError::CorruptDocument(format!(
                    "XObject /{} is not an indirect reference",
                    String::from_utf8_lossy(name)
                ))),
            }
        }
    }
    Ok(())
}

/// Maps XObject resource names to their object ids, honouring resources
/// inherited from ancestor page-tree nodes (the nearest definition wins).
fn page_xobjects(doc: &Document, page_id: ObjectId) -> Result<HashMap<Vec<u8>, ObjectId>, ExtractError> {
    let mut found: HashMap<Vec<u8>, ObjectId> = HashMap::new();
    let mut node = doc.get_dictionary(page_id).map_err(corrupt)?;

    for _ in 0..MAX_PARENT_DEPTH {
        if let Ok(resources) = node.get(b"Resources") {
            let resources = resolve(doc, resources)?.as_dict().map_err(corrupt)?;
            collect_xobjects(doc, resources, &mut found)?;
        }
        node = match node.get(b"Parent") {
            Ok(parent) => resolve(doc, parent)?.as_dict().map_err(corrupt)?,
            Err(_)     => return Ok(found),
        };
    }
    Err(ExtractError::CorruptDocument("page tree too deep".into()))
}

fn resolve<'a>(doc: &'a Document, mut obj: &'a Object) -> Result<&'a Object, ExtractError> {
    for _ in 0..MAX_REFERENCE_HOPS {
        match obj {
            Object::Reference(id) => obj = doc.get_object(*id).map_err(corrupt)?,
            other => return Ok(other),
        }
    }
    Err(ExtractError::CorruptDocument("reference chain too long".into()))
}

fn subtype(dict: &Dictionary) -> Option<&[u8]> {
    dict.get(b"Subtype").and_then(Object::as_name).ok()
}

fn read_image(
    stream:     &Stream,
    page_index: usize,
    position:   usize,
    identity:   ObjectId,
) -> Result<ExtractedImage, ExtractError> {
    let dict = &stream.dict;
    let dimension = |key: &[u8]| -> Result<u32, ExtractError> {
        let v = dict.get(key).and_then(Object::as_i64).map_err(corrupt)?;
        u32::try_from(v).map_err(|_| ExtractError::CorruptDocument(format!(
            "image {} {} has invalid {} {v}",
            identity.0, identity.1, String::from_utf8_lossy(key)
        )))
    };
    let width = dimension(b"Width")?;
    let height = dimension(b"Height")?;
    let channels = dict
        .get(b"ColorSpace")
        .and_then(Object::as_name)
        .map(channels_for)
        .unwrap_or(3);

    Ok(ExtractedImage {
        page_index,
        position,
        identity,
        width,
        height,
        channels,
        pixels: stream_data(stream)?,
    })
}

/// Undo the stream filter chain.
///
/// Only Flate is reversed.  Other filters (DCT, JPX, …) are lossy or
/// foreign to this format; their raw bytes are handed on unchanged and the
/// codec rejects them per image.
fn stream_data(stream: &Stream) -> Result<Vec<u8>, ExtractError> {
    let filters: Vec<&[u8]> = match stream.dict.get(b"Filter") {
        Err(_) => Vec::new(),
        Ok(Object::Name(name)) => vec![name.as_slice()],
        Ok(Object::Array(items)) => items.iter().filter_map(|o| o.as_name().ok()).collect(),
        Ok(_) => return Err(ExtractError::CorruptDocument("malformed /Filter entry".into())),
    };

    match filters.as_slice() {
        [] => Ok(stream.content.clone()),
        [b"FlateDecode"] => {
            let mut out = Vec::new();
            ZlibDecoder::new(stream.content.as_slice())
                .read_to_end(&mut out)
                .map_err(|e| ExtractError::CorruptDocument(format!("stream: {e}")))?;
            Ok(out)
        }
        other => {
            log::warn!(
                "stream uses unsupported filter chain {:?}; passing raw bytes",
                other.iter().map(|f| String::from_utf8_lossy(f)).collect::<Vec<_>>()
            );
            Ok(stream.content.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::ByteImageCodec;
    use crate::pdf::PagePacker;

    #[test]
    fn roundtrip_keeps_page_order() {
        let codec = ByteImageCodec::default();
        let images: Vec<_> = [&b"A"[..], b"BB", b"CCC"]
            .iter()
            .map(|p| codec.encode(p).unwrap())
            .collect();
        let mut pdf = Vec::new();
        PagePacker::write_to(&images, &mut pdf).unwrap();

        let extracted = ImageExtractor::scan_bytes(&pdf).unwrap();
        assert_eq!(extracted.len(), 3);
        for (i, (got, want)) in extracted.iter().zip(&images).enumerate() {
            assert_eq!(got.page_index, i);
            assert_eq!(got.position, 0);
            assert_eq!((got.width, got.height, got.channels), (want.width, want.height, 3));
            assert_eq!(got.pixels, want.pixels);
        }
    }

    #[test]
    fn context_counts_duplicates() {
        let mut ctx = ScanContext::new();
        assert!(ctx.first_sighting((4, 0)));
        assert!(!ctx.first_sighting((4, 0)));
        assert!(ctx.first_sighting((5, 0)));
        assert_eq!(ctx.seen(), 2);
        assert_eq!(ctx.duplicates_skipped, 1);
    }

    #[test]
    fn garbage_is_corrupt_document() {
        assert!(matches!(
            ImageExtractor::scan_bytes(b"definitely not a pdf"),
            Err(ExtractError::CorruptDocument(_))
        ));
    }

    #[test]
    fn missing_file_is_io_failure() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ImageExtractor::scan_path(dir.path().join("nope.pdf")),
            Err(ExtractError::IoFailure(_))
        ));
    }
}
