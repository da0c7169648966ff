//! Page-level concatenation of rendered documents.

use std::collections::BTreeMap;

use bytes::Bytes;
use lopdf::{Dictionary, Document, Object, ObjectId, dictionary};

use super::RenderError;

/// Attributes a page may inherit from its ancestors in the page tree.
const INHERITED: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Concatenate the pages of `parts`, in order, into one document.
pub fn merge_documents(parts: &[Bytes]) -> Result<Vec<u8>, RenderError> {
    if parts.is_empty() {
        return Err(RenderError::Pdf("nothing to merge".to_string()));
    }

    let mut max_id = 1;
    let mut pages: Vec<(ObjectId, Dictionary)> = Vec::new();
    let mut objects: BTreeMap<ObjectId, Object> = BTreeMap::new();

    for part in parts {
        let mut doc = Document::load_mem(part)?;
        doc.renumber_objects_with(max_id);
        max_id = doc.max_id + 1;

        for page_id in doc.get_pages().into_values() {
            let page = flatten_page(&doc, page_id)?;
            pages.push((page_id, page));
        }
        objects.extend(doc.objects);
    }

    let mut merged = Document::with_version("1.7");
    for (id, object) in objects {
        let structural = matches!(
            object.type_name().unwrap_or(""),
            "Catalog" | "Pages" | "Page" | "Outlines" | "Outline"
        );
        if !structural {
            merged.objects.insert(id, object);
        }
    }

    merged.max_id = max_id;
    let pages_id = merged.new_object_id();
    let mut kids = Vec::with_capacity(pages.len());
    for (page_id, mut page) in pages {
        page.set("Parent", pages_id);
        merged.objects.insert(page_id, Object::Dictionary(page));
        kids.push(Object::Reference(page_id));
    }

    let count = kids.len() as i64;
    merged.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = merged.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    merged.trailer.set("Root", catalog_id);

    merged.compress();
    let mut bytes = Vec::new();
    merged.save_to(&mut bytes)?;
    Ok(bytes)
}

/// Copy of the page dictionary with inherited attributes pulled down from its parents.
fn flatten_page(doc: &Document, page_id: ObjectId) -> Result<Dictionary, RenderError> {
    let mut page = doc.get_dictionary(page_id)?.clone();

    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
    while let Some(parent_id) = parent {
        let Ok(node) = doc.get_dictionary(parent_id) else {
            break;
        };
        for key in INHERITED {
            if !page.has(key)
                && let Ok(value) = node.get(key)
            {
                page.set(key, value.clone());
            }
        }
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
    }

    Ok(page)
}
