//! End-to-end exercise of the generation pipeline against a synthetic
//! template: render, merge, hash, publish, and verify the round trip the
//! verification contract depends on.

use chrono::NaiveDate;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

use constancia::diplomas::document_name;
use constancia::hash::{sha256_hex, sha256_hex_reader};
use constancia::pdf::merge::merge_overlay;
use constancia::pdf::overlay::{render_overlay, OverlayLayout, OverlayValues};
use constancia::pdf::Template;
use constancia::storage::{Storage, StorageKind};

/// A stand-in diploma background: one landscape page with a title line.
fn write_template(dir: &std::path::Path, width: f32, height: f32) -> std::path::PathBuf {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let content = Content {
        operations: vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), Object::Real(24.0 as _)]),
            Operation::new(
                "Td",
                vec![Object::Real(72.0 as _), Object::Real((height - 120.0) as _)],
            ),
            Operation::new("Tj", vec![Object::string_literal("RECONOCIMIENTO")]),
            Operation::new("ET", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "MediaBox" => vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Real(width as _),
            Object::Real(height as _),
        ],
        "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
    });
    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => vec![page_id.into()],
        "Count" => 1,
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));
    let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
    doc.trailer.set("Root", catalog_id);

    let path = dir.join("RECONOCIMIENTOv2.pdf");
    doc.save_to(&mut std::fs::File::create(&path).unwrap()).unwrap();
    path
}

#[tokio::test]
async fn issued_document_round_trips_through_storage_and_hash() {
    let dir = tempfile::tempdir().unwrap();
    let template_path = write_template(dir.path(), 842.0, 595.0);

    let template = Template::open(&template_path).unwrap();
    assert!((template.page_size.0 - 842.0).abs() < 0.01);

    let folio = "3f0e8a12-9c1d-4a2b-8e3f-1234567890ab";
    let verify_url = format!("http://localhost:8000/verificar/{}", folio);
    let values = OverlayValues {
        student_name: "Ana Torres",
        folio,
        verify_url: &verify_url,
        issued_on: NaiveDate::from_ymd_opt(2025, 10, 3).unwrap(),
        issuer: Some("Hortensia Depine Corral"),
    };

    let overlay = render_overlay(template.page_size, &values, &OverlayLayout::default()).unwrap();
    let merged = merge_overlay(&template.bytes, &overlay).unwrap();
    assert!(merged.starts_with(b"%PDF"));

    // The digest contract: 64 lowercase hex chars over the published bytes.
    let digest = sha256_hex(&merged);
    assert_eq!(digest.len(), 64);
    assert!(digest.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));

    // Both layers are present in the finished document.
    let text = pdf_extract::extract_text_from_mem(&merged).unwrap();
    assert!(text.contains("RECONOCIMIENTO"), "template layer missing: {text}");
    assert!(text.contains("Ana Torres"), "student name missing: {text}");
    assert!(text.contains(folio), "folio missing: {text}");

    // Publish, fetch back via the locator, recompute: must equal stored.
    let out_dir = tempfile::tempdir().unwrap();
    let storage = Storage::local(out_dir.path().to_path_buf());
    let name = document_name(2, folio);
    let locator = storage.publish(&merged, &name).await.unwrap();
    assert_eq!(locator.kind, StorageKind::Local);

    let fetched = std::fs::File::open(&locator.value).unwrap();
    assert_eq!(sha256_hex_reader(fetched).unwrap(), digest);
}

#[test]
fn overlay_rendered_at_wrong_size_cannot_be_merged() {
    let dir = tempfile::tempdir().unwrap();
    let template_path = write_template(dir.path(), 842.0, 595.0);
    let template = Template::open(&template_path).unwrap();

    let values = OverlayValues {
        student_name: "Juan Pérez",
        folio: "mismatch-folio",
        verify_url: "http://localhost:8000/verificar/mismatch-folio",
        issued_on: NaiveDate::from_ymd_opt(2025, 10, 3).unwrap(),
        issuer: None,
    };
    // Letter-sized overlay against a landscape template.
    let overlay = render_overlay((612.0, 792.0), &values, &OverlayLayout::default()).unwrap();

    let err = merge_overlay(&template.bytes, &overlay).unwrap_err();
    assert!(matches!(
        err,
        constancia::error::Error::PageSizeMismatch { .. }
    ));
}

#[test]
fn distinct_inputs_produce_distinct_documents() {
    let dir = tempfile::tempdir().unwrap();
    let template_path = write_template(dir.path(), 842.0, 595.0);
    let template = Template::open(&template_path).unwrap();
    let layout = OverlayLayout::default();

    let render = |name: &str, folio: &str| {
        let verify_url = format!("http://localhost:8000/verificar/{}", folio);
        let values = OverlayValues {
            student_name: name,
            folio,
            verify_url: &verify_url,
            issued_on: NaiveDate::from_ymd_opt(2025, 10, 3).unwrap(),
            issuer: None,
        };
        let overlay = render_overlay(template.page_size, &values, &layout).unwrap();
        merge_overlay(&template.bytes, &overlay).unwrap()
    };

    let a = render("Ana Torres", "folio-a");
    let b = render("Kevin Santillán", "folio-b");
    assert_ne!(sha256_hex(&a), sha256_hex(&b));
}
