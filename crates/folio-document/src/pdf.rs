// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF page renderer — staple pages from any number of source PDFs into one
// new PDF using the `lopdf` crate.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use folio_core::CancellationToken;
use folio_core::error::{FolioError, Result};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use tracing::{debug, info, instrument, warn};

use crate::assemble::{PageRenderer, PageSource};

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// [`PageRenderer`] backed by `lopdf`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfRenderer;

impl LopdfRenderer {
    pub fn new() -> Self {
        Self
    }
}

/// A loaded source PDF plus its page index and the ids already copied out
/// of it into the current target.
struct SourcePdf {
    document: Document,
    pages: BTreeMap<u32, ObjectId>,
    copied: HashMap<ObjectId, ObjectId>,
}

impl SourcePdf {
    fn open(path: &Path) -> Result<Self> {
        let document = Document::load(path).map_err(|err| {
            FolioError::PdfError(format!("failed to open {}: {}", path.display(), err))
        })?;
        let pages = document.get_pages();
        debug!(path = %path.display(), pages = pages.len(), "source PDF loaded");
        Ok(Self {
            document,
            pages,
            copied: HashMap::new(),
        })
    }
}

impl PageRenderer for LopdfRenderer {
    #[instrument(skip(self), fields(document = %document.display()))]
    fn page_count(&self, document: &Path) -> Result<u32> {
        let doc = Document::load(document).map_err(|err| {
            FolioError::PdfError(format!("failed to open {}: {}", document.display(), err))
        })?;
        Ok(doc.get_pages().len() as u32)
    }

    #[instrument(skip(self, pages, cancel), fields(pages = pages.len(), output = %output.display()))]
    fn staple(&self, pages: &[PageSource], output: &Path, cancel: &CancellationToken) -> Result<()> {
        let mut sources: HashMap<PathBuf, SourcePdf> = HashMap::new();
        let mut target = Document::with_version("1.5");
        let pages_id = target.new_object_id();
        let mut kids = Vec::with_capacity(pages.len());

        for page in pages {
            cancel.check()?;

            if !sources.contains_key(&page.path) {
                let loaded = SourcePdf::open(&page.path)?;
                sources.insert(page.path.clone(), loaded);
            }
            let source = sources.get_mut(&page.path).ok_or_else(|| {
                FolioError::PdfError(format!("{} not loaded", page.path.display()))
            })?;

            let page_id = *source.pages.get(&page.page_number).ok_or_else(|| {
                FolioError::Assembly(format!(
                    "page {} not in {} ({} pages)",
                    page.page_number,
                    page.path.display(),
                    source.pages.len()
                ))
            })?;

            let new_id = clone_page_into(source, &mut target, page_id, pages_id)?;
            rotate_page(&mut target, new_id, page.rotation.degrees())?;
            kids.push(Object::Reference(new_id));
        }

        let mut pages_dict = Dictionary::new();
        pages_dict.set("Type", Object::Name(b"Pages".to_vec()));
        pages_dict.set("Count", Object::Integer(kids.len() as i64));
        pages_dict.set("Kids", Object::Array(kids));
        target.objects.insert(pages_id, Object::Dictionary(pages_dict));

        let mut catalog = Dictionary::new();
        catalog.set("Type", Object::Name(b"Catalog".to_vec()));
        catalog.set("Pages", Object::Reference(pages_id));
        let catalog_id = target.add_object(Object::Dictionary(catalog));
        target.trailer.set("Root", Object::Reference(catalog_id));

        let written = target.get_pages().len();
        if written != pages.len() {
            return Err(FolioError::Assembly(format!(
                "assembled {written} pages, expected {}",
                pages.len()
            )));
        }

        let mut file = std::fs::File::create(output)?;
        target.save_to(&mut file).map_err(|err| {
            FolioError::PdfError(format!("failed to write {}: {}", output.display(), err))
        })?;
        file.sync_all()?;

        info!(pages = written, "PDF assembled");
        Ok(())
    }
}

/// Copy one page and everything it references into `target`, parented
/// under `pages_id`.
///
/// Attributes the page inherits from its source page tree are copied onto
/// the page itself, since the source tree does not come along.
fn clone_page_into(
    source: &mut SourcePdf,
    target: &mut Document,
    page_id: ObjectId,
    pages_id: ObjectId,
) -> Result<ObjectId> {
    let mut page = match source.document.get_object(page_id) {
        Ok(Object::Dictionary(dict)) => dict.clone(),
        Ok(_) => {
            return Err(FolioError::PdfError(format!(
                "page object {page_id:?} is not a dictionary"
            )));
        }
        Err(err) => {
            return Err(FolioError::PdfError(format!(
                "cannot read page object {page_id:?}: {err}"
            )));
        }
    };

    for key in INHERITABLE {
        if !page.has(key) {
            if let Some(value) = inherited(&source.document, &page, key) {
                page.set(key.to_vec(), value);
            }
        }
    }

    // Reserved first so back-references from annotations land on this copy.
    let new_id = target.new_object_id();
    source.copied.insert(page_id, new_id);

    let mut cloned = match deep_clone_object(source, target, &Object::Dictionary(page))? {
        Object::Dictionary(dict) => dict,
        _ => Dictionary::new(),
    };
    cloned.set("Parent", Object::Reference(pages_id));
    target.objects.insert(new_id, Object::Dictionary(cloned));
    Ok(new_id)
}

/// Walk up the /Parent chain looking for `key`.
fn inherited(document: &Document, page: &Dictionary, key: &[u8]) -> Option<Object> {
    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
    let mut depth = 0;

    while let Some(id) = parent {
        // Malformed trees can loop.
        depth += 1;
        if depth > 64 {
            return None;
        }
        let node = document.get_dictionary(id).ok()?;
        if let Ok(value) = node.get(key) {
            return Some(value.clone());
        }
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
    }
    None
}

/// Deep-clone an object into `target`, following references.
///
/// Each referenced source object is copied at most once per target, which
/// also terminates reference cycles. /Parent is skipped; the caller sets it.
fn deep_clone_object(
    source: &mut SourcePdf,
    target: &mut Document,
    object: &Object,
) -> Result<Object> {
    match object {
        Object::Dictionary(dict) => Ok(Object::Dictionary(clone_dictionary(source, target, dict)?)),
        Object::Array(arr) => {
            let mut new_arr = Vec::with_capacity(arr.len());
            for item in arr {
                new_arr.push(deep_clone_object(source, target, item)?);
            }
            Ok(Object::Array(new_arr))
        }
        Object::Reference(ref_id) => {
            if let Some(existing) = source.copied.get(ref_id) {
                return Ok(Object::Reference(*existing));
            }
            let referenced = match source.document.get_object(*ref_id) {
                Ok(obj) => obj.clone(),
                Err(err) => {
                    warn!(?ref_id, %err, "cannot resolve reference, using Null");
                    return Ok(Object::Null);
                }
            };
            let new_id = target.new_object_id();
            source.copied.insert(*ref_id, new_id);
            let cloned = deep_clone_object(source, target, &referenced)?;
            target.objects.insert(new_id, cloned);
            Ok(Object::Reference(new_id))
        }
        Object::Stream(stream) => {
            let dict = clone_dictionary(source, target, &stream.dict)?;
            Ok(Object::Stream(Stream::new(dict, stream.content.clone())))
        }
        other => Ok(other.clone()),
    }
}

fn clone_dictionary(
    source: &mut SourcePdf,
    target: &mut Document,
    dict: &Dictionary,
) -> Result<Dictionary> {
    let mut new_dict = Dictionary::new();
    for (key, value) in dict.iter() {
        if key == b"Parent" {
            continue;
        }
        let cloned_value = deep_clone_object(source, target, value)?;
        new_dict.set(key.clone(), cloned_value);
    }
    Ok(new_dict)
}

/// Add `degrees` clockwise to the page's /Rotate.
fn rotate_page(target: &mut Document, page_id: ObjectId, degrees: u16) -> Result<()> {
    if degrees == 0 {
        return Ok(());
    }
    let page = target.get_dictionary_mut(page_id).map_err(|err| {
        FolioError::PdfError(format!("cannot rotate page {page_id:?}: {err}"))
    })?;
    let existing = page.get(b"Rotate").and_then(Object::as_i64).unwrap_or(0);
    let rotation = (existing + i64::from(degrees)).rem_euclid(360);
    page.set("Rotate", Object::Integer(rotation));
    Ok(())
}

#[cfg(test)]
pub(crate) mod fixtures {
    use lopdf::{Dictionary, Document, Object, Stream};
    use std::path::Path;

    /// Write a PDF of `num_pages` pages whose content streams read
    /// `{prefix}-Page-{n}`. MediaBox and Resources sit on the page tree
    /// root so pages must inherit them.
    pub fn write_test_pdf(path: &Path, num_pages: u32, prefix: &str) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let catalog_id = doc.new_object_id();
        let font_id = doc.new_object_id();

        let mut font = Dictionary::new();
        font.set("Type", Object::Name(b"Font".to_vec()));
        font.set("Subtype", Object::Name(b"Type1".to_vec()));
        font.set("BaseFont", Object::Name(b"Helvetica".to_vec()));
        doc.objects.insert(font_id, Object::Dictionary(font));

        let mut page_ids = Vec::new();
        for n in 1..=num_pages {
            let page_id = doc.new_object_id();
            let content_id = doc.new_object_id();
            let content = format!("BT /F1 12 Tf 50 700 Td ({prefix}-Page-{n}) Tj ET");
            doc.objects.insert(
                content_id,
                Object::Stream(Stream::new(Dictionary::new(), content.into_bytes())),
            );

            let mut page = Dictionary::new();
            page.set("Type", Object::Name(b"Page".to_vec()));
            page.set("Parent", Object::Reference(pages_id));
            page.set("Contents", Object::Reference(content_id));
            doc.objects.insert(page_id, Object::Dictionary(page));
            page_ids.push(Object::Reference(page_id));
        }

        let mut fonts = Dictionary::new();
        fonts.set("F1", Object::Reference(font_id));
        let mut resources = Dictionary::new();
        resources.set("Font", Object::Dictionary(fonts));

        let mut pages = Dictionary::new();
        pages.set("Type", Object::Name(b"Pages".to_vec()));
        pages.set("Count", Object::Integer(num_pages as i64));
        pages.set("Kids", Object::Array(page_ids));
        pages.set("Resources", Object::Dictionary(resources));
        pages.set(
            "MediaBox",
            Object::Array(vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(612),
                Object::Integer(792),
            ]),
        );
        doc.objects.insert(pages_id, Object::Dictionary(pages));

        let mut catalog = Dictionary::new();
        catalog.set("Type", Object::Name(b"Catalog".to_vec()));
        catalog.set("Pages", Object::Reference(pages_id));
        doc.objects.insert(catalog_id, Object::Dictionary(catalog));
        doc.trailer.set("Root", Object::Reference(catalog_id));

        doc.save(path).unwrap();
    }

    /// Text of each page's content stream, in page order.
    pub fn page_texts(path: &Path) -> Vec<String> {
        let doc = Document::load(path).unwrap();
        doc.get_pages()
            .values()
            .map(|id| String::from_utf8_lossy(&doc.get_page_content(*id).unwrap()).into_owned())
            .collect()
    }
}
