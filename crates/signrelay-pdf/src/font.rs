//! TrueType font embedding
//!
//! The attestation line is drawn with a composite font (Type0 over a
//! CIDFontType2 descendant) using the Identity-H encoding, so every glyph
//! in the font is addressable regardless of script. Text is written as
//! two-byte glyph identifiers and a ToUnicode map keeps it extractable.

use std::collections::BTreeMap;
use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::{dictionary, Document, Object, ObjectId, Stream, StringFormat};
use rusttype::{Font, GlyphId, Scale};

use crate::error::StampError;

/// Maximum entries per `beginbfchar` block allowed by the CMap format
const BFCHAR_BLOCK: usize = 100;

/// A parsed TrueType font ready to be embedded into a PDF
pub struct EmbeddedFont {
    base_name: String,
    data: Vec<u8>,
    font: Font<'static>,
    units_per_em: f32,
    ascent: f32,
    descent: f32,
}

impl std::fmt::Debug for EmbeddedFont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddedFont")
            .field("base_name", &self.base_name)
            .field("bytes", &self.data.len())
            .field("units_per_em", &self.units_per_em)
            .finish()
    }
}

impl EmbeddedFont {
    /// Parse font bytes. `name` becomes the PDF `BaseFont` after sanitising.
    pub fn from_bytes(name: &str, data: Vec<u8>) -> Result<Self, StampError> {
        let font = Font::try_from_vec(data.clone())
            .ok_or_else(|| StampError::FontError(format!("'{}' is not a TrueType font", name)))?;

        let units_per_em = f32::from(font.units_per_em());
        if units_per_em <= 0.0 {
            return Err(StampError::FontError(format!(
                "'{}' reports zero units per em",
                name
            )));
        }
        let metrics = font.v_metrics_unscaled();

        Ok(Self {
            base_name: sanitize_name(name),
            data,
            font,
            units_per_em,
            ascent: metrics.ascent,
            descent: metrics.descent,
        })
    }

    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    /// Map text to glyph identifiers. Characters the font lacks map to glyph 0.
    pub fn glyph_ids(&self, text: &str) -> Vec<u16> {
        text.chars().map(|c| self.font.glyph(c).id().0).collect()
    }

    /// Encode text as the big-endian glyph string used with Identity-H
    pub fn encode(&self, text: &str) -> Vec<u8> {
        self.glyph_ids(text)
            .into_iter()
            .flat_map(|gid| gid.to_be_bytes())
            .collect()
    }

    /// Characters in `text` that have no glyph in this font
    pub fn missing_chars(&self, text: &str) -> Vec<char> {
        text.chars()
            .filter(|c| !c.is_whitespace() && self.font.glyph(*c).id().0 == 0)
            .collect()
    }

    /// Advance width of a glyph in PDF text space units (1/1000 em)
    fn advance(&self, gid: u16) -> i64 {
        // rusttype scales relative to ascent - descent, so this yields font units
        let unit_scale = Scale::uniform(self.ascent - self.descent);
        let advance = self
            .font
            .glyph(GlyphId(gid))
            .scaled(unit_scale)
            .h_metrics()
            .advance_width;
        self.to_text_space(advance).round() as i64
    }

    fn to_text_space(&self, font_units: f32) -> f32 {
        font_units * 1000.0 / self.units_per_em
    }

    /// Add the font program and its dictionaries to `doc`, returning the Type0 font id.
    ///
    /// Widths and the ToUnicode map cover the glyphs used by `text`.
    pub fn embed(&self, doc: &mut Document, text: &str) -> Result<ObjectId, StampError> {
        let mut used: BTreeMap<u16, String> = BTreeMap::new();
        for c in text.chars() {
            used.entry(self.font.glyph(c).id().0)
                .or_default()
                .push(c);
        }

        let font_file = Stream::new(
            dictionary! {
                "Length1" => self.data.len() as i64,
                "Filter" => "FlateDecode",
            },
            deflate(&self.data)?,
        );
        let font_file_id = doc.add_object(font_file);

        let ascent = self.to_text_space(self.ascent);
        let descent = self.to_text_space(self.descent);
        let descriptor_id = doc.add_object(dictionary! {
            "Type" => "FontDescriptor",
            "FontName" => Object::Name(self.base_name.as_bytes().to_vec()),
            "Flags" => 4,
            "FontBBox" => vec![
                Object::Integer(0),
                Object::Real(descent),
                Object::Integer(1000),
                Object::Real(ascent),
            ],
            "ItalicAngle" => 0,
            "Ascent" => Object::Real(ascent),
            "Descent" => Object::Real(descent),
            "CapHeight" => Object::Real(ascent),
            "StemV" => 80,
            "FontFile2" => Object::Reference(font_file_id),
        });

        let mut widths = Vec::with_capacity(used.len() * 2);
        for gid in used.keys() {
            widths.push(Object::Integer(i64::from(*gid)));
            widths.push(Object::Array(vec![Object::Integer(self.advance(*gid))]));
        }

        let descendant_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "CIDFontType2",
            "BaseFont" => Object::Name(self.base_name.as_bytes().to_vec()),
            "CIDSystemInfo" => dictionary! {
                "Registry" => Object::string_literal("Adobe"),
                "Ordering" => Object::string_literal("Identity"),
                "Supplement" => 0,
            },
            "FontDescriptor" => Object::Reference(descriptor_id),
            "DW" => 1000,
            "W" => widths,
            "CIDToGIDMap" => "Identity",
        });

        let to_unicode_id = doc.add_object(Stream::new(dictionary! {}, to_unicode_cmap(&used)));

        Ok(doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type0",
            "BaseFont" => Object::Name(self.base_name.as_bytes().to_vec()),
            "Encoding" => "Identity-H",
            "DescendantFonts" => vec![Object::Reference(descendant_id)],
            "ToUnicode" => Object::Reference(to_unicode_id),
        }))
    }

    /// Glyph string operand for a `Tj` operator
    pub fn text_operand(&self, text: &str) -> Object {
        Object::String(self.encode(text), StringFormat::Hexadecimal)
    }
}

fn sanitize_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    if cleaned.is_empty() {
        "EmbeddedFont".to_string()
    } else {
        cleaned
    }
}

pub(crate) fn deflate(data: &[u8]) -> Result<Vec<u8>, StampError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| StampError::OperationError(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| StampError::OperationError(e.to_string()))
}

fn to_unicode_cmap(used: &BTreeMap<u16, String>) -> Vec<u8> {
    let mut cmap = String::from(
        "/CIDInit /ProcSet findresource begin\n\
12 dict begin\n\
begincmap\n\
/CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n\
/CMapName /Adobe-Identity-UCS def\n\
/CMapType 2 def\n\
1 begincodespacerange\n\
<0000> <FFFF>\n\
endcodespacerange\n",
    );

    let entries: Vec<(&u16, &String)> = used.iter().collect();
    for block in entries.chunks(BFCHAR_BLOCK) {
        cmap.push_str(&format!("{} beginbfchar\n", block.len()));
        for (gid, chars) in block {
            // Several characters can share glyph 0; the first one wins
            let first = chars.chars().next().unwrap_or('\u{FFFD}');
            let mut units = [0u16; 2];
            let hex: String = first
                .encode_utf16(&mut units)
                .iter()
                .map(|u| format!("{:04X}", u))
                .collect();
            cmap.push_str(&format!("<{:04X}> <{}>\n", gid, hex));
        }
        cmap.push_str("endbfchar\n");
    }

    cmap.push_str(
        "endcmap\n\
CMapName currentdict /CMap defineresource pop\n\
end\n\
end\n",
    );
    cmap.into_bytes()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn test_font() -> EmbeddedFont {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../../fonts/DejaVuSans.ttf");
        let data = std::fs::read(path).unwrap();
        EmbeddedFont::from_bytes("DejaVuSans", data).unwrap()
    }

    #[test]
    fn test_rejects_non_font_bytes() {
        let result = EmbeddedFont::from_bytes("Broken", b"not a font".to_vec());
        assert!(matches!(result, Err(StampError::FontError(_))));
    }

    #[test]
    fn test_encode_is_two_bytes_per_char() {
        let font = test_font();
        let encoded = font.encode("Ada");
        assert_eq!(encoded.len(), 6);
        // Same character, same glyph
        assert_eq!(encoded[0..2], font.encode("A")[..]);
    }

    #[test]
    fn test_hebrew_glyphs_are_present() {
        let font = test_font();
        assert!(font.missing_chars("שלום עולם").is_empty());
        assert!(font.glyph_ids("שלום").iter().all(|gid| *gid != 0));
    }

    #[test]
    fn test_sanitize_name_strips_pdf_delimiters() {
        assert_eq!(sanitize_name("Alef Regular (v2)"), "AlefRegularv2");
        assert_eq!(sanitize_name("///"), "EmbeddedFont");
    }

    #[test]
    fn test_embed_builds_type0_font() {
        let font = test_font();
        let mut doc = Document::with_version("1.7");
        let font_id = font.embed(&mut doc, "Signed by: Ada").unwrap();

        let type0 = doc.get_dictionary(font_id).unwrap();
        assert_eq!(type0.get(b"Subtype").unwrap().as_name().unwrap(), b"Type0");
        assert_eq!(
            type0.get(b"Encoding").unwrap().as_name().unwrap(),
            b"Identity-H"
        );
        assert!(type0.has(b"ToUnicode"));
    }

    #[test]
    fn test_to_unicode_maps_every_used_glyph() {
        let mut used = BTreeMap::new();
        used.insert(36u16, "A".to_string());
        used.insert(1500u16, "ש".to_string());
        let cmap = String::from_utf8(to_unicode_cmap(&used)).unwrap();

        assert!(cmap.contains("2 beginbfchar"));
        assert!(cmap.contains("<0024> <0041>"));
        assert!(cmap.contains("<05DC> <05E9>"));
    }

    #[test]
    fn test_advance_is_positive_for_letters() {
        let font = test_font();
        let gid = font.glyph_ids("M")[0];
        let advance = font.advance(gid);
        assert!(advance > 300 && advance < 1200, "advance {}", advance);
    }
}
