//! Compositing an overlay page strictly on top of the template page.
//!
//! Policy: the two pages must agree on size (within half a point). The
//! overlay is always rendered at the template's reported size, so a
//! mismatch means the template changed underneath the batch; failing loud
//! beats silently rescaling someone's diploma.

use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};

use crate::error::{Error, Result};
use crate::pdf::{first_page, page_size};

const SIZE_TOLERANCE_PT: f32 = 0.5;

/// Composite the overlay's first page over the template's first page and
/// return the finished single-page document. Neither input is mutated.
pub fn merge_overlay(template_bytes: &[u8], overlay_bytes: &[u8]) -> Result<Vec<u8>> {
    let mut base = Document::load_mem(template_bytes)?;
    let overlay = Document::load_mem(overlay_bytes)?;

    let base_page = first_page(&base)?;
    let overlay_page = first_page(&overlay)?;

    let base_size = page_size(&base, base_page)?;
    let overlay_size = page_size(&overlay, overlay_page)?;
    if (base_size.0 - overlay_size.0).abs() > SIZE_TOLERANCE_PT
        || (base_size.1 - overlay_size.1).abs() > SIZE_TOLERANCE_PT
    {
        return Err(Error::PageSizeMismatch {
            template: base_size,
            overlay: overlay_size,
        });
    }

    // Template content first, overlay second, each isolated in its own
    // graphics-state sandwich so neither leaks transforms into the other.
    let base_content = base.get_page_content(base_page)?;
    let overlay_content = overlay.get_page_content(overlay_page)?;
    let mut combined =
        Vec::with_capacity(base_content.len() + overlay_content.len() + 16);
    combined.extend_from_slice(b"q\n");
    combined.extend_from_slice(&base_content);
    combined.extend_from_slice(b"\nQ\nq\n");
    combined.extend_from_slice(&overlay_content);
    combined.extend_from_slice(b"\nQ\n");
    let combined_id = base.add_object(Stream::new(dictionary! {}, combined));

    let merged_resources = merged_page_resources(&mut base, base_page, &overlay, overlay_page)?;

    let page = base.get_object_mut(base_page)?.as_dict_mut()?;
    page.set("Contents", combined_id);
    page.set("Resources", Object::Dictionary(merged_resources));

    let mut out = Vec::new();
    base.save_to(&mut out)?;
    Ok(out)
}

/// The template page's resources with the overlay page's resources copied
/// in. Overlay resource names are namespaced by the renderer (`Fov*`), so
/// copying under the original names cannot clobber template entries.
fn merged_page_resources(
    base: &mut Document,
    base_page: ObjectId,
    overlay: &Document,
    overlay_page: ObjectId,
) -> Result<Dictionary> {
    let mut resources = match base.get_object(base_page)?.as_dict()?.get(b"Resources") {
        Ok(Object::Reference(id)) => base.get_object(*id)?.as_dict()?.clone(),
        Ok(Object::Dictionary(dict)) => dict.clone(),
        _ => inherited_resources(base, base_page).unwrap_or_else(Dictionary::new),
    };

    let overlay_resources = match overlay.get_object(overlay_page)?.as_dict()?.get(b"Resources") {
        Ok(Object::Reference(id)) => overlay.get_object(*id)?.as_dict()?.clone(),
        Ok(Object::Dictionary(dict)) => dict.clone(),
        _ => Dictionary::new(),
    };

    for (category, value) in overlay_resources.iter() {
        let imported = import_object(base, overlay, value)?;
        // Both sides may carry e.g. a Font dictionary: union the entries.
        let merged_in_place = match resources.get_mut(category) {
            Ok(Object::Dictionary(existing)) => {
                if let Object::Dictionary(incoming) = &imported {
                    for (name, entry) in incoming.iter() {
                        existing.set(name.clone(), entry.clone());
                    }
                    true
                } else {
                    false
                }
            }
            _ => false,
        };
        if !merged_in_place {
            resources.set(category.clone(), imported);
        }
    }

    Ok(resources)
}

/// Resources may live on an ancestor node of the page tree.
fn inherited_resources(doc: &Document, page_id: ObjectId) -> Option<Dictionary> {
    let mut dict = doc.get_object(page_id).ok()?.as_dict().ok()?;
    loop {
        match dict.get(b"Parent") {
            Ok(Object::Reference(parent)) => {
                dict = doc.get_object(*parent).ok()?.as_dict().ok()?;
                match dict.get(b"Resources") {
                    Ok(Object::Reference(id)) => {
                        return doc.get_object(*id).ok()?.as_dict().ok().cloned()
                    }
                    Ok(Object::Dictionary(d)) => return Some(d.clone()),
                    _ => continue,
                }
            }
            _ => return None,
        }
    }
}

/// Deep-copy an object graph from the overlay document into the base
/// document, rewriting references as it goes.
fn import_object(base: &mut Document, overlay: &Document, obj: &Object) -> Result<Object> {
    Ok(match obj {
        Object::Reference(id) => {
            let target = overlay.get_object(*id)?.clone();
            let imported = import_object(base, overlay, &target)?;
            Object::Reference(base.add_object(imported))
        }
        Object::Dictionary(dict) => {
            let mut copied = Dictionary::new();
            for (key, value) in dict.iter() {
                copied.set(key.clone(), import_object(base, overlay, value)?);
            }
            Object::Dictionary(copied)
        }
        Object::Array(items) => Object::Array(
            items
                .iter()
                .map(|item| import_object(base, overlay, item))
                .collect::<Result<Vec<_>>>()?,
        ),
        other => other.clone(),
    })
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::overlay::{render_overlay, OverlayLayout, OverlayValues};
    use chrono::NaiveDate;

    fn overlay_bytes(size: (f32, f32)) -> Vec<u8> {
        let values = OverlayValues {
            student_name: "Juan Pérez",
            folio: "folio-merge-1",
            verify_url: "http://localhost:8000/verificar/folio-merge-1",
            issued_on: NaiveDate::from_ymd_opt(2025, 10, 3).unwrap(),
            issuer: None,
        };
        render_overlay(size, &values, &OverlayLayout::default()).unwrap()
    }

    #[test]
    fn merged_page_keeps_both_layers() {
        let template = tests_support::blank_document(842.0, 595.0, "CONSTANCIA DE ESTUDIOS");
        let merged = merge_overlay(&template, &overlay_bytes((842.0, 595.0))).unwrap();

        let doc = Document::load_mem(&merged).unwrap();
        assert_eq!(doc.get_pages().len(), 1);

        let text = pdf_extract::extract_text_from_mem(&merged).unwrap();
        assert!(text.contains("CONSTANCIA DE ESTUDIOS"), "template layer lost: {text}");
        assert!(text.contains("folio-merge-1"), "overlay layer lost: {text}");
    }

    #[test]
    fn merged_page_size_matches_template() {
        let template = tests_support::blank_document(612.0, 792.0, "FONDO");
        let merged = merge_overlay(&template, &overlay_bytes((612.0, 792.0))).unwrap();
        let doc = Document::load_mem(&merged).unwrap();
        let page = first_page(&doc).unwrap();
        let size = page_size(&doc, page).unwrap();
        assert!((size.0 - 612.0).abs() < 0.01);
        assert!((size.1 - 792.0).abs() < 0.01);
    }

    #[test]
    fn size_mismatch_is_rejected() {
        let template = tests_support::blank_document(842.0, 595.0, "FONDO");
        let err = merge_overlay(&template, &overlay_bytes((612.0, 792.0))).unwrap_err();
        match err {
            Error::PageSizeMismatch { template, overlay } => {
                assert!((template.0 - 842.0).abs() < 0.01);
                assert!((overlay.0 - 612.0).abs() < 0.01);
            }
            other => panic!("expected PageSizeMismatch, got {other:?}"),
        }
    }

    #[test]
    fn template_source_is_not_mutated() {
        let template = tests_support::blank_document(842.0, 595.0, "FONDO");
        let before = template.clone();
        let _ = merge_overlay(&template, &overlay_bytes((842.0, 595.0))).unwrap();
        assert_eq!(template, before);
    }
}
