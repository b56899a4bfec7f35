//! First-page attestation overlay
//!
//! Composites an attestation line and a signature image onto page one of a
//! converted PDF at fixed coordinates. Nothing is reflowed: the existing page
//! content is wrapped in a saved graphics state and the overlay is appended
//! as an extra content stream.

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use tracing::{debug, warn};

use crate::error::StampError;
use crate::font::EmbeddedFont;
use crate::image::SignatureImage;

/// Guard against malformed page trees with `Parent` cycles
const MAX_TREE_DEPTH: usize = 64;

/// Fixed placement of the overlay on the first page, in PDF points
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayLayout {
    pub text_x: f32,
    pub text_y: f32,
    pub font_size: f32,
    pub text_color: [f32; 3],
    pub image_x: f32,
    pub image_y: f32,
    /// Image points per source pixel
    pub image_scale: f32,
}

impl Default for OverlayLayout {
    fn default() -> Self {
        Self {
            text_x: 50.0,
            text_y: 100.0,
            font_size: 14.0,
            text_color: [0.0, 0.0, 0.0],
            image_x: 50.0,
            image_y: 150.0,
            image_scale: 0.5,
        }
    }
}

/// Who signed and when, rendered as a single attestation line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attestation {
    pub signer_name: String,
    pub date: String,
}

impl Attestation {
    pub fn new(signer_name: impl Into<String>, date: impl Into<String>) -> Self {
        Self {
            signer_name: signer_name.into(),
            date: date.into(),
        }
    }

    pub fn line(&self) -> String {
        format!("Signed by: {} on: {}", self.signer_name, self.date)
    }
}

/// Stamp the attestation and signature image onto the first page of `pdf_bytes`
pub fn stamp_first_page(
    pdf_bytes: &[u8],
    font: &EmbeddedFont,
    image: &SignatureImage,
    attestation: &Attestation,
    layout: &OverlayLayout,
) -> Result<Vec<u8>, StampError> {
    let mut doc =
        Document::load_mem(pdf_bytes).map_err(|e| StampError::ParseError(e.to_string()))?;

    let page_id = doc
        .get_pages()
        .into_values()
        .next()
        .ok_or(StampError::NoPages)?;

    let text = attestation.line();
    let missing = font.missing_chars(&text);
    if !missing.is_empty() {
        warn!(font = font.base_name(), ?missing, "Font has no glyphs for some characters");
    }

    let font_id = font.embed(&mut doc, &text)?;
    let image_id = image.embed(&mut doc)?;

    let font_name = register_resource(&mut doc, page_id, b"Font", "SigF", font_id)?;
    let image_name = register_resource(&mut doc, page_id, b"XObject", "SigIm", image_id)?;

    let has_content = doc.get_dictionary(page_id)?.has(b"Contents");
    let overlay = overlay_operations(
        font.text_operand(&text),
        &font_name,
        &image_name,
        image,
        layout,
        has_content,
    );
    // Content streams are concatenated, so keep the overlay token-separated
    let mut overlay_bytes = b"\n".to_vec();
    overlay_bytes.extend(
        Content {
            operations: overlay,
        }
        .encode()?,
    );

    append_content(&mut doc, page_id, overlay_bytes, has_content)?;

    debug!(
        signer = %attestation.signer_name,
        font = %font_name,
        image = %image_name,
        transparent = image.has_alpha(),
        "Overlay composited onto first page"
    );

    let mut output = Vec::new();
    doc.save_to(&mut output)
        .map_err(|e| StampError::OperationError(e.to_string()))?;
    Ok(output)
}

fn overlay_operations(
    text: Object,
    font_name: &str,
    image_name: &str,
    image: &SignatureImage,
    layout: &OverlayLayout,
    restore_first: bool,
) -> Vec<Operation> {
    let [r, g, b] = layout.text_color;
    let width = image.width() as f32 * layout.image_scale;
    let height = image.height() as f32 * layout.image_scale;

    let mut ops = Vec::new();
    if restore_first {
        // Balances the `q` prepended ahead of the original content
        ops.push(Operation::new("Q", vec![]));
    }
    ops.extend([
        Operation::new("q", vec![]),
        Operation::new("rg", vec![r.into(), g.into(), b.into()]),
        Operation::new("BT", vec![]),
        Operation::new(
            "Tf",
            vec![Object::Name(font_name.as_bytes().to_vec()), layout.font_size.into()],
        ),
        Operation::new("Td", vec![layout.text_x.into(), layout.text_y.into()]),
        Operation::new("Tj", vec![text]),
        Operation::new("ET", vec![]),
        Operation::new("Q", vec![]),
        Operation::new("q", vec![]),
        Operation::new(
            "cm",
            vec![
                width.into(),
                0.into(),
                0.into(),
                height.into(),
                layout.image_x.into(),
                layout.image_y.into(),
            ],
        ),
        Operation::new("Do", vec![Object::Name(image_name.as_bytes().to_vec())]),
        Operation::new("Q", vec![]),
    ]);
    ops
}

enum ResourceSlot {
    Indirect(ObjectId),
    Inline,
    Missing,
}

/// The page's own resource dictionary, materialising inherited resources if needed
fn page_resources_mut(
    doc: &mut Document,
    page_id: ObjectId,
) -> Result<&mut Dictionary, StampError> {
    let slot = match doc.get_dictionary(page_id)?.get(b"Resources") {
        Ok(Object::Reference(id)) => ResourceSlot::Indirect(*id),
        Ok(Object::Dictionary(_)) => ResourceSlot::Inline,
        _ => ResourceSlot::Missing,
    };

    match slot {
        ResourceSlot::Indirect(id) => Ok(doc.get_object_mut(id)?.as_dict_mut()?),
        ResourceSlot::Inline => Ok(doc
            .get_object_mut(page_id)?
            .as_dict_mut()?
            .get_mut(b"Resources")?
            .as_dict_mut()?),
        ResourceSlot::Missing => {
            let inherited = inherited_resources(doc, page_id);
            let page = doc.get_object_mut(page_id)?.as_dict_mut()?;
            page.set("Resources", Object::Dictionary(inherited));
            Ok(page.get_mut(b"Resources")?.as_dict_mut()?)
        }
    }
}

fn inherited_resources(doc: &Document, page_id: ObjectId) -> Dictionary {
    let parent_of = |id: ObjectId| {
        doc.get_dictionary(id)
            .ok()
            .and_then(|d| d.get(b"Parent").ok())
            .and_then(|p| p.as_reference().ok())
    };

    let mut current = parent_of(page_id);
    for _ in 0..MAX_TREE_DEPTH {
        let Some(node_id) = current else { break };
        if let Ok(node) = doc.get_dictionary(node_id) {
            match node.get(b"Resources") {
                Ok(Object::Dictionary(dict)) => return dict.clone(),
                Ok(Object::Reference(id)) => {
                    if let Ok(dict) = doc.get_dictionary(*id) {
                        return dict.clone();
                    }
                }
                _ => {}
            }
        }
        current = parent_of(node_id);
    }
    Dictionary::new()
}

/// Add `target` under `category` (Font, XObject) with a name unused on this page
fn register_resource(
    doc: &mut Document,
    page_id: ObjectId,
    category: &[u8],
    prefix: &str,
    target: ObjectId,
) -> Result<String, StampError> {
    let existing = page_resources_mut(doc, page_id)?
        .get(category)
        .ok()
        .cloned();

    let mut entries = match existing {
        Some(Object::Dictionary(dict)) => dict,
        Some(Object::Reference(id)) => doc.get_dictionary(id)?.clone(),
        _ => Dictionary::new(),
    };

    let name = unique_name(&entries, prefix);
    entries.set(name.clone(), Object::Reference(target));
    page_resources_mut(doc, page_id)?.set(category.to_vec(), Object::Dictionary(entries));
    Ok(name)
}

fn unique_name(entries: &Dictionary, prefix: &str) -> String {
    (0..)
        .map(|n| format!("{}{}", prefix, n))
        .find(|candidate| !entries.has(candidate.as_bytes()))
        .unwrap_or_else(|| prefix.to_string())
}

fn append_content(
    doc: &mut Document,
    page_id: ObjectId,
    overlay: Vec<u8>,
    wrap_existing: bool,
) -> Result<(), StampError> {
    let overlay_id = doc.add_object(Stream::new(Dictionary::new(), overlay));

    if !wrap_existing {
        doc.get_object_mut(page_id)?
            .as_dict_mut()?
            .set("Contents", Object::Reference(overlay_id));
        return Ok(());
    }

    let save_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));

    let existing = doc
        .get_object_mut(page_id)?
        .as_dict_mut()?
        .remove(b"Contents");

    let mut parts = vec![Object::Reference(save_id)];
    match existing {
        Some(Object::Array(items)) => parts.extend(items),
        Some(Object::Reference(id)) => match doc.get_object(id) {
            // Contents may point at an array of streams
            Ok(Object::Array(items)) => parts.extend(items.iter().cloned()),
            _ => parts.push(Object::Reference(id)),
        },
        Some(other) => parts.push(other),
        None => {}
    }
    parts.push(Object::Reference(overlay_id));

    doc.get_object_mut(page_id)?
        .as_dict_mut()?
        .set("Contents", Object::Array(parts));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::tests::test_font;
    use crate::image::tests::signature_data_url;
    use lopdf::dictionary;
    use pretty_assertions::assert_eq;

    /// Build a PDF with `pages` pages. Resources live on the page tree root
    /// when `inherit` is set, otherwise on each page.
    fn create_test_pdf(pages: usize, inherit: bool) -> Vec<u8> {
        let mut doc = Document::with_version("1.7");
        let helvetica_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources = dictionary! {
            "Font" => dictionary! { "F1" => Object::Reference(helvetica_id) },
        };

        let pages_id = doc.new_object_id();
        let mut kids = Vec::new();
        for n in 0..pages {
            let content = format!("BT /F1 12 Tf 72 720 Td (Page {}) Tj ET", n + 1);
            let content_id =
                doc.add_object(Stream::new(Dictionary::new(), content.into_bytes()));
            let mut page = dictionary! {
                "Type" => "Page",
                "Parent" => Object::Reference(pages_id),
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Contents" => Object::Reference(content_id),
            };
            if !inherit {
                page.set("Resources", resources.clone());
            }
            kids.push(Object::Reference(doc.add_object(page)));
        }

        let mut tree = dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages as i64,
        };
        if inherit {
            tree.set("Resources", resources);
        }
        doc.objects.insert(pages_id, Object::Dictionary(tree));

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(pages_id),
        });
        doc.trailer.set("Root", Object::Reference(catalog_id));

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        buffer
    }

    fn stamp(pdf: &[u8], signer: &str) -> Result<Vec<u8>, StampError> {
        let image = SignatureImage::from_data_url(&signature_data_url()).unwrap();
        stamp_first_page(
            pdf,
            &test_font(),
            &image,
            &Attestation::new(signer, "16.10.2026"),
            &OverlayLayout::default(),
        )
    }

    fn first_page(doc: &Document) -> ObjectId {
        *doc.get_pages().get(&1).unwrap()
    }

    fn page_resources(doc: &Document, page_id: ObjectId) -> &Dictionary {
        match doc.get_dictionary(page_id).unwrap().get(b"Resources").unwrap() {
            Object::Reference(id) => doc.get_dictionary(*id).unwrap(),
            other => other.as_dict().unwrap(),
        }
    }

    fn number(object: &Object) -> f32 {
        match object {
            Object::Integer(i) => *i as f32,
            Object::Real(r) => *r,
            other => panic!("not a number: {:?}", other),
        }
    }

    fn page_operations(doc: &Document, page_id: ObjectId) -> Vec<Operation> {
        let content = doc.get_page_content(page_id).unwrap();
        Content::decode(&content).unwrap().operations
    }

    #[test]
    fn test_attestation_line() {
        let attestation = Attestation::new("Ada Lovelace", "1.2.2026");
        assert_eq!(attestation.line(), "Signed by: Ada Lovelace on: 1.2.2026");
    }

    #[test]
    fn test_stamp_draws_signer_text_run() {
        let pdf = create_test_pdf(1, false);
        let result = stamp(&pdf, "Ada Lovelace").unwrap();
        assert!(result.starts_with(b"%PDF-"));

        let doc = Document::load_mem(&result).unwrap();
        let ops = page_operations(&doc, first_page(&doc));

        let expected = test_font().encode(&Attestation::new("Ada Lovelace", "16.10.2026").line());
        let drawn = ops.iter().any(|op| {
            op.operator == "Tj"
                && matches!(op.operands.first(), Some(Object::String(bytes, _)) if *bytes == expected)
        });
        assert!(drawn, "attestation text run not found");

        // Original content is still there
        assert!(ops.iter().any(|op| op.operator == "Tj"
            && matches!(op.operands.first(), Some(Object::String(bytes, _)) if bytes == b"Page 1")));
    }

    #[test]
    fn test_stamp_embeds_image_with_downscale() {
        let pdf = create_test_pdf(1, false);
        let doc = Document::load_mem(&stamp(&pdf, "Ada").unwrap()).unwrap();
        let page_id = first_page(&doc);

        let resources = page_resources(&doc, page_id);
        let xobjects = resources.get(b"XObject").unwrap().as_dict().unwrap();
        let image_ref = xobjects.get(b"SigIm0").unwrap().as_reference().unwrap();
        let image = doc.get_object(image_ref).unwrap().as_stream().unwrap();
        assert_eq!(image.dict.get(b"Subtype").unwrap().as_name().unwrap(), b"Image");

        let ops = page_operations(&doc, page_id);
        let cm = ops.iter().find(|op| op.operator == "cm").unwrap();
        let numbers: Vec<f32> = cm.operands.iter().map(number).collect();
        assert_eq!(numbers, vec![2.0, 0.0, 0.0, 1.0, 50.0, 150.0]);
        assert!(ops.iter().any(|op| op.operator == "Do"));
    }

    #[test]
    fn test_stamp_keeps_existing_fonts() {
        let pdf = create_test_pdf(1, false);
        let doc = Document::load_mem(&stamp(&pdf, "Ada").unwrap()).unwrap();
        let resources = page_resources(&doc, first_page(&doc));
        let fonts = resources.get(b"Font").unwrap().as_dict().unwrap();
        assert!(fonts.has(b"F1"));
        assert!(fonts.has(b"SigF0"));
    }

    #[test]
    fn test_stamp_materialises_inherited_resources() {
        let pdf = create_test_pdf(1, true);
        let doc = Document::load_mem(&stamp(&pdf, "Ada").unwrap()).unwrap();
        let page = doc.get_dictionary(first_page(&doc)).unwrap();
        let fonts = page
            .get(b"Resources")
            .unwrap()
            .as_dict()
            .unwrap()
            .get(b"Font")
            .unwrap()
            .as_dict()
            .unwrap();
        assert!(fonts.has(b"F1"), "inherited font lost");
        assert!(fonts.has(b"SigF0"));
    }

    #[test]
    fn test_stamp_only_touches_first_page() {
        let pdf = create_test_pdf(2, false);
        let doc = Document::load_mem(&stamp(&pdf, "Ada").unwrap()).unwrap();
        let second = *doc.get_pages().get(&2).unwrap();
        let ops = page_operations(&doc, second);
        assert!(!ops.iter().any(|op| op.operator == "Do"));
        assert_eq!(ops.iter().filter(|op| op.operator == "Tj").count(), 1);
    }

    #[test]
    fn test_graphics_state_is_balanced() {
        let pdf = create_test_pdf(1, false);
        let doc = Document::load_mem(&stamp(&pdf, "Ada").unwrap()).unwrap();
        let ops = page_operations(&doc, first_page(&doc));
        let saves = ops.iter().filter(|op| op.operator == "q").count();
        let restores = ops.iter().filter(|op| op.operator == "Q").count();
        assert_eq!(saves, restores);
    }

    #[test]
    fn test_stamp_hebrew_signer() {
        let pdf = create_test_pdf(1, false);
        let result = stamp(&pdf, "ישראל ישראלי");
        assert!(result.is_ok());
    }

    #[test]
    fn test_unique_name_skips_taken() {
        let mut dict = Dictionary::new();
        dict.set("SigF0", Object::Null);
        dict.set("SigF1", Object::Null);
        assert_eq!(unique_name(&dict, "SigF"), "SigF2");
    }

    #[test]
    fn test_malformed_pdf_is_parse_error() {
        let result = stamp(b"%PDF-1.7 garbage", "Ada");
        assert!(matches!(result, Err(StampError::ParseError(_))));
    }

    #[test]
    fn test_pdf_without_pages_is_rejected() {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.add_object(dictionary! {
            "Type" => "Pages",
            "Kids" => Vec::<Object>::new(),
            "Count" => 0,
        });
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(pages_id),
        });
        doc.trailer.set("Root", Object::Reference(catalog_id));
        let mut pdf = Vec::new();
        doc.save_to(&mut pdf).unwrap();

        assert!(matches!(stamp(&pdf, "Ada"), Err(StampError::NoPages)));
    }
}
