//! Fragment merge and final assembly.
//!
//! Each fragment is loaded as its own document, its objects are renumbered
//! above everything merged so far, and its page objects are re-parented under
//! one new page tree. Content streams, fonts and resources are carried over
//! untouched, so page numbers and chrome drawn into a fragment stay what that
//! fragment drew.
//!
//! Attributes a page inherits from its old tree (`Resources`, `MediaBox`,
//! `CropBox`, `Rotate`) are copied onto the page first; the old tree becomes
//! unreachable and is pruned.

use super::pdf::lopdf_err;
use crate::error::AssignmentError;
use lopdf::{dictionary, Document as LoDocument, Object, ObjectId};
use tracing::debug;

const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];
const MAX_TREE_DEPTH: usize = 64;

/// The pieces of a finished assignment.
#[derive(Debug, Clone, Default)]
pub struct Fragments {
    pub cover: Option<Vec<u8>>,
    pub outline: Option<Vec<u8>>,
    pub references: Option<Vec<u8>>,
    pub body: Vec<u8>,
}

impl Fragments {
    pub fn new(body: Vec<u8>) -> Self {
        Self {
            body,
            ..Default::default()
        }
    }

    /// Present fragments in assembly order: cover, outline, references, body.
    pub fn ordered(&self) -> Vec<&[u8]> {
        [&self.cover, &self.outline, &self.references]
            .into_iter()
            .flatten()
            .map(Vec::as_slice)
            .chain(std::iter::once(self.body.as_slice()))
            .collect()
    }
}

/// Merge `fragments` in assembly order.
pub fn assemble(fragments: &Fragments) -> Result<Vec<u8>, AssignmentError> {
    merge(&fragments.ordered())
}

/// Concatenate the pages of every fragment, in call order.
pub fn merge<B: AsRef<[u8]>>(fragments: &[B]) -> Result<Vec<u8>, AssignmentError> {
    if fragments.is_empty() {
        return Err(AssignmentError::InternalComposition(
            "nothing to merge".into(),
        ));
    }

    let mut out = LoDocument::with_version("1.7");
    let pages_id = out.new_object_id();
    let mut kids: Vec<Object> = Vec::new();

    for (index, bytes) in fragments.iter().enumerate() {
        let mut src = LoDocument::load_mem(bytes.as_ref()).map_err(|e| {
            AssignmentError::InternalComposition(format!("fragment {index} unreadable: {e}"))
        })?;
        if src.is_encrypted() {
            return Err(AssignmentError::InternalComposition(format!(
                "fragment {index} is encrypted"
            )));
        }

        src.renumber_objects_with(out.max_id + 1);
        let page_ids: Vec<ObjectId> = src.get_pages().into_values().collect();

        for &page_id in &page_ids {
            let inherited = inherited_attributes(&src, page_id);
            let page = src
                .get_object_mut(page_id)
                .and_then(Object::as_dict_mut)
                .map_err(lopdf_err)?;
            for (key, value) in inherited {
                if !page.has(key) {
                    page.set(key, value);
                }
            }
            page.set("Parent", pages_id);
            kids.push(Object::Reference(page_id));
        }

        debug!(fragment = index, pages = page_ids.len(), "merged fragment");
        out.max_id = out.max_id.max(src.max_id);
        out.objects.extend(src.objects);
    }

    let count = kids.len() as i64;
    out.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = out.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    out.trailer.set("Root", catalog_id);
    out.prune_objects();
    out.renumber_objects();
    out.compress();

    let mut bytes = Vec::new();
    out.save_to(&mut bytes)
        .map_err(|e| AssignmentError::InternalComposition(format!("pdf save: {e}")))?;
    Ok(bytes)
}

/// Values of the inheritable keys as seen by `page_id`, nearest ancestor
/// first.
fn inherited_attributes(doc: &LoDocument, page_id: ObjectId) -> Vec<(&'static [u8], Object)> {
    let mut found: Vec<(&'static [u8], Object)> = Vec::new();
    let mut node = doc.get_dictionary(page_id).ok();
    let mut depth = 0;

    while let Some(dict) = node {
        for key in INHERITABLE {
            if found.iter().any(|(k, _)| *k == key) {
                continue;
            }
            if let Ok(value) = dict.get(key) {
                found.push((key, value.clone()));
            }
        }
        depth += 1;
        if depth > MAX_TREE_DEPTH {
            break;
        }
        node = dict
            .get(b"Parent")
            .and_then(Object::as_reference)
            .ok()
            .and_then(|id| doc.get_dictionary(id).ok());
    }
    found
}

fn load_checked(bytes: &[u8]) -> Result<LoDocument, AssignmentError> {
    if !bytes.starts_with(b"%PDF") {
        return Err(AssignmentError::malformed("input is not a PDF document"));
    }
    LoDocument::load_mem(bytes)
        .map_err(|e| AssignmentError::malformed(format!("PDF could not be parsed: {e}")))
}

/// Number of pages in a PDF.
pub fn page_count(bytes: &[u8]) -> Result<usize, AssignmentError> {
    Ok(load_checked(bytes)?.get_pages().len())
}

/// Validate a user-supplied cover and re-save it as a standalone one-page PDF.
pub fn normalize_cover(bytes: &[u8]) -> Result<Vec<u8>, AssignmentError> {
    let pages = page_count(bytes)?;
    if pages != 1 {
        return Err(AssignmentError::malformed(format!(
            "cover page PDF must contain exactly one page, found {pages}"
        )));
    }
    merge(&[bytes])
}
