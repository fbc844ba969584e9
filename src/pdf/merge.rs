//! Ordered PDF concatenation
//!
//! Source documents are renumbered into one object space, their page trees
//! are flattened into a single `Pages` node in input order, and a fresh
//! catalog points at it. Page content is copied as-is; nothing is re-encoded.

use crate::{PdfError, PdfResult};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Page attributes a page may inherit from its ancestors in the page tree
const INHERITABLE: [&[u8]; 4] = [b"MediaBox", b"CropBox", b"Resources", b"Rotate"];

/// Guards against malformed, cyclic `Parent` chains
const MAX_TREE_DEPTH: usize = 64;

/// Concatenates `inputs` in order into a new document at `output`
///
/// Returns the page count of the merged document. On any failure no file is
/// left at `output`.
///
/// # Errors
///
/// * `UnmergeableDocument` - an input cannot be parsed or has no pages
/// * `Write` - the merged document cannot be saved
pub fn merge_pdfs(inputs: &[PathBuf], output: &Path) -> PdfResult<usize> {
    if inputs.is_empty() {
        return Err(PdfError::UnmergeableDocument {
            path: output.to_path_buf(),
            reason: "nothing to merge".to_string(),
        });
    }

    let documents = inputs
        .iter()
        .map(|path| load_document(path))
        .collect::<PdfResult<Vec<_>>>()?;

    let mut merged = merge_documents(documents);
    let pages = merged.get_pages().len();

    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if let Err(e) = merged.save(output) {
        // A failed save may leave a truncated file behind
        let _ = std::fs::remove_file(output);
        return Err(PdfError::Write {
            path: output.to_path_buf(),
            reason: e.to_string(),
        });
    }

    tracing::debug!("Merged {} files into {} ({} pages)", inputs.len(), output.display(), pages);
    Ok(pages)
}

/// Loads a document that is about to be merged
pub fn load_document(path: &Path) -> PdfResult<Document> {
    let document = Document::load(path).map_err(|e| PdfError::UnmergeableDocument {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    if document.get_pages().is_empty() {
        return Err(PdfError::UnmergeableDocument {
            path: path.to_path_buf(),
            reason: "document has no pages".to_string(),
        });
    }

    Ok(document)
}

/// Merges already loaded documents, keeping their page order
pub fn merge_documents(documents: Vec<Document>) -> Document {
    let mut max_id = 1;
    let mut page_order: Vec<ObjectId> = Vec::new();
    let mut pages: BTreeMap<ObjectId, Dictionary> = BTreeMap::new();
    let mut objects: BTreeMap<ObjectId, Object> = BTreeMap::new();

    for mut document in documents {
        document.renumber_objects_with(max_id);
        max_id = document.max_id + 1;

        for page_id in document.get_pages().into_values() {
            if let Ok(page) = document.get_dictionary(page_id) {
                let mut page = page.clone();
                inherit_attributes(&document, &mut page);
                page_order.push(page_id);
                pages.insert(page_id, page);
            }
        }

        for (id, object) in document.objects {
            let tree_node = matches!(
                type_name(&object),
                Some(b"Catalog" | b"Pages" | b"Page")
            );
            if !tree_node {
                objects.insert(id, object);
            }
        }
    }

    let pages_id = (max_id, 0);
    let catalog_id = (max_id + 1, 0);

    let mut merged = Document::with_version("1.5");
    merged.objects = objects;

    for (id, mut page) in pages {
        page.set("Parent", pages_id);
        merged.objects.insert(id, Object::Dictionary(page));
    }

    let kids: Vec<Object> = page_order.iter().copied().map(Object::Reference).collect();
    merged.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => kids.len() as i64,
            "Kids" => kids,
        }),
    );
    merged.objects.insert(
        catalog_id,
        Object::Dictionary(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        }),
    );

    merged.trailer.set("Root", catalog_id);
    merged.max_id = catalog_id.0;
    merged
}

/// The `/Type` name of a dictionary object, if any
fn type_name(object: &Object) -> Option<&[u8]> {
    object
        .as_dict()
        .ok()
        .and_then(|dict| dict.get(b"Type").ok())
        .and_then(|name| name.as_name().ok())
}

/// Copies attributes the page inherits from the tree it is leaving
fn inherit_attributes(document: &Document, page: &mut Dictionary) {
    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
    let mut depth = 0;

    while let Some(node_id) = parent {
        if depth >= MAX_TREE_DEPTH {
            break;
        }
        let Ok(node) = document.get_dictionary(node_id) else {
            break;
        };

        for key in INHERITABLE {
            if !page.has(key) {
                if let Ok(value) = node.get(key) {
                    page.set(key.to_vec(), value.clone());
                }
            }
        }

        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
        depth += 1;
    }
}
