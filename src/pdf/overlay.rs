//! Overlay rendering: the dynamic layer (name, QR, folio, issuer/date)
//! drawn on an otherwise blank page sized to the template.
//!
//! Coordinates are calibration against the template's artwork, not
//! computed layout; the defaults match the production template.

use chrono::NaiveDate;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream, StringFormat};
use qrcode::{Color, QrCode};

use crate::error::Result;

/// Fixed drawing positions, in points from the bottom-left corner.
#[derive(Debug, Clone)]
pub struct OverlayLayout {
    /// Center of the student name line.
    pub name_xy: (f32, f32),
    pub name_font_size: f32,
    /// Bottom-left corner of the QR block.
    pub qr_xy: (f32, f32),
    pub qr_size: f32,
    /// Distance of the folio line from the right and bottom edges.
    pub folio_margin: (f32, f32),
    pub folio_font_size: f32,
    pub issuer_xy: Option<(f32, f32)>,
    pub date_xy: Option<(f32, f32)>,
    pub detail_font_size: f32,
}

impl Default for OverlayLayout {
    fn default() -> Self {
        Self {
            name_xy: (421.0, 315.0),
            name_font_size: 34.0,
            qr_xy: (710.0, 60.0),
            qr_size: 120.0,
            folio_margin: (24.0, 18.0),
            folio_font_size: 8.0,
            issuer_xy: Some((70.0, 54.0)),
            date_xy: Some((70.0, 40.0)),
            detail_font_size: 10.0,
        }
    }
}

/// The value set one diploma is rendered from.
#[derive(Debug)]
pub struct OverlayValues<'a> {
    pub student_name: &'a str,
    pub folio: &'a str,
    /// Full public URL the QR encodes.
    pub verify_url: &'a str,
    pub issued_on: NaiveDate,
    pub issuer: Option<&'a str>,
}

// Resource names are namespaced so the merger can copy them into any
// template page without colliding with the template's own resources.
const FONT_BOLD: &str = "FovB";
const FONT_REGULAR: &str = "FovR";

/// Quiet-zone modules around the QR so it stays scannable on top of the
/// template artwork.
const QR_QUIET_MODULES: usize = 2;

/// Mean Helvetica advance per glyph in em units. Standard-14 metrics are
/// not embedded; centering tolerance here is a few points.
const APPROX_ADVANCE_EM: f32 = 0.54;

/// Render a single transparent page of `page_size` points containing only
/// the drawn elements. No side effects, no network access.
pub fn render_overlay(
    page_size: (f32, f32),
    values: &OverlayValues<'_>,
    layout: &OverlayLayout,
) -> Result<Vec<u8>> {
    let (page_w, _page_h) = page_size;
    let mut ops: Vec<Operation> = Vec::new();

    // Student name, bold, centered on the calibrated point.
    let name_width = approx_text_width(values.student_name, layout.name_font_size);
    draw_text(
        &mut ops,
        FONT_BOLD,
        layout.name_font_size,
        layout.name_xy.0 - name_width / 2.0,
        layout.name_xy.1,
        values.student_name,
    );

    draw_qr(&mut ops, values.verify_url, layout)?;

    // Folio, small, right-aligned near the bottom edge.
    let folio_line = format!("Folio: {}", values.folio);
    let folio_width = approx_text_width(&folio_line, layout.folio_font_size);
    draw_text(
        &mut ops,
        FONT_REGULAR,
        layout.folio_font_size,
        page_w - layout.folio_margin.0 - folio_width,
        layout.folio_margin.1,
        &folio_line,
    );

    if let (Some(issuer), Some((x, y))) = (values.issuer, layout.issuer_xy) {
        draw_text(&mut ops, FONT_REGULAR, layout.detail_font_size, x, y, issuer);
    }
    if let Some((x, y)) = layout.date_xy {
        let date_line = format!("Fecha de emisión: {}", values.issued_on);
        draw_text(&mut ops, FONT_REGULAR, layout.detail_font_size, x, y, &date_line);
    }

    build_single_page(page_size, ops)
}

fn draw_text(ops: &mut Vec<Operation>, font: &str, size: f32, x: f32, y: f32, text: &str) {
    ops.push(Operation::new("BT", vec![]));
    ops.push(Operation::new("Tf", vec![font.into(), real(size)]));
    ops.push(Operation::new("Td", vec![real(x), real(y)]));
    ops.push(Operation::new(
        "Tj",
        vec![Object::String(encode_winansi(text), StringFormat::Literal)],
    ));
    ops.push(Operation::new("ET", vec![]));
}

/// The QR is drawn as filled vector rectangles on a white backing block,
/// one per dark module. No raster image, so the merge stays pure vector.
fn draw_qr(ops: &mut Vec<Operation>, url: &str, layout: &OverlayLayout) -> Result<()> {
    let code = QrCode::new(url.as_bytes())?;
    let modules = code.width();
    let module_pt = layout.qr_size / (modules + 2 * QR_QUIET_MODULES) as f32;
    let (qr_x, qr_y) = layout.qr_xy;

    // White backing, including the quiet zone.
    ops.push(Operation::new("q", vec![]));
    ops.push(Operation::new("rg", vec![real(1.0), real(1.0), real(1.0)]));
    ops.push(Operation::new(
        "re",
        vec![real(qr_x), real(qr_y), real(layout.qr_size), real(layout.qr_size)],
    ));
    ops.push(Operation::new("f", vec![]));
    ops.push(Operation::new("Q", vec![]));

    ops.push(Operation::new("q", vec![]));
    ops.push(Operation::new("rg", vec![real(0.0), real(0.0), real(0.0)]));
    for (i, color) in code.to_colors().into_iter().enumerate() {
        if color != Color::Dark {
            continue;
        }
        let row = i / modules;
        let col = i % modules;
        let x = qr_x + (QR_QUIET_MODULES + col) as f32 * module_pt;
        // Module rows run top-down; the page's y axis runs bottom-up.
        let y = qr_y + layout.qr_size - (QR_QUIET_MODULES + row + 1) as f32 * module_pt;
        ops.push(Operation::new("re", vec![real(x), real(y), real(module_pt), real(module_pt)]));
    }
    ops.push(Operation::new("f", vec![]));
    ops.push(Operation::new("Q", vec![]));
    Ok(())
}

fn build_single_page(page_size: (f32, f32), ops: Vec<Operation>) -> Result<Vec<u8>> {
    let (w, h) = page_size;
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let bold_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
        "Encoding" => "WinAnsiEncoding",
    });
    let regular_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });

    let content = Content { operations: ops };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "MediaBox" => vec![Object::Integer(0), Object::Integer(0), real(w), real(h)],
        "Resources" => dictionary! {
            "Font" => dictionary! {
                FONT_BOLD => bold_id,
                FONT_REGULAR => regular_id,
            },
        },
    });

    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => vec![page_id.into()],
        "Count" => 1,
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf)?;
    Ok(buf)
}

fn real(v: f32) -> Object {
    Object::Real(v as _)
}

fn approx_text_width(text: &str, font_size: f32) -> f32 {
    text.chars().count() as f32 * APPROX_ADVANCE_EM * font_size
}

/// Helvetica with WinAnsiEncoding covers the Latin-1 range, which is all a
/// Spanish-language roster needs. Anything outside degrades to '?'.
fn encode_winansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|ch| match ch as u32 {
            cp @ 0x20..=0x7e => cp as u8,
            cp @ 0xa0..=0xff => cp as u8,
            _ => b'?',
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_values<'a>(folio: &'a str, url: &'a str) -> OverlayValues<'a> {
        OverlayValues {
            student_name: "Ana Torres",
            folio,
            verify_url: url,
            issued_on: NaiveDate::from_ymd_opt(2025, 10, 3).unwrap(),
            issuer: Some("Hortensia Depine Corral"),
        }
    }

    #[test]
    fn renders_single_page_at_requested_size() {
        let values = sample_values("f-123", "http://localhost:8000/verificar/f-123");
        let bytes = render_overlay((842.0, 595.0), &values, &OverlayLayout::default()).unwrap();

        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
        let page = crate::pdf::first_page(&doc).unwrap();
        let size = crate::pdf::page_size(&doc, page).unwrap();
        assert!((size.0 - 842.0).abs() < 0.01);
        assert!((size.1 - 595.0).abs() < 0.01);
    }

    #[test]
    fn visible_fields_survive_rendering() {
        let folio = "3f0e8a12-aaaa-bbbb-cccc-1234567890ab";
        let url = format!("http://localhost:8000/verificar/{}", folio);
        let values = sample_values(folio, &url);
        let bytes = render_overlay((842.0, 595.0), &values, &OverlayLayout::default()).unwrap();

        let text = pdf_extract::extract_text_from_mem(&bytes).unwrap();
        assert!(text.contains("Ana Torres"), "name missing in: {text}");
        assert!(text.contains(folio), "folio missing in: {text}");
    }

    #[test]
    fn rendering_is_deterministic_for_identical_inputs() {
        let values = sample_values("f-9", "http://localhost:8000/verificar/f-9");
        let layout = OverlayLayout::default();
        let a = render_overlay((612.0, 792.0), &values, &layout).unwrap();
        let b = render_overlay((612.0, 792.0), &values, &layout).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn winansi_keeps_spanish_letters() {
        assert_eq!(encode_winansi("Pérez"), vec![b'P', 0xe9, b'r', b'e', b'z']);
        assert_eq!(encode_winansi("emisión")[5], 0xf3);
        // Outside Latin-1 falls back rather than corrupting the stream.
        assert_eq!(encode_winansi("日"), vec![b'?']);
    }
}
