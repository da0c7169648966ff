//! Serialize a composed page into a single-page PDF.
//!
//! Nothing time- or randomness-dependent is written: no info dictionary, no file
//! identifier. The same layout and assets always give the same bytes.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat, dictionary};

use super::RenderError;
use super::assets::{JpegImage, RenderAssets};
use super::fonts::{EmbeddedFont, Glyph};
use super::page::{ImageSlot, PAGE_HEIGHT, PAGE_WIDTH, PageLayout};
use super::runs::Script;

const WATERMARK_OPACITY: f32 = 0.08;
const CMAP_CHUNK: usize = 100;

fn font_resource(script: Script) -> &'static str {
    match script {
        Script::Arabic => "F1",
        Script::Latin => "F2",
    }
}

fn image_resource(slot: ImageSlot) -> &'static str {
    match slot {
        ImageSlot::Logo => "Im1",
        ImageSlot::Watermark => "Im2",
        ImageSlot::Stamp => "Im3",
    }
}

/// Glyphs drawn with one font, keyed by glyph id, with the character each came from.
type UsedGlyphs = BTreeMap<u16, (Glyph, char)>;

pub fn write_pdf(layout: &PageLayout, assets: &RenderAssets) -> Result<Vec<u8>, RenderError> {
    let mut used: BTreeMap<&'static str, UsedGlyphs> = BTreeMap::new();
    let mut operations = Vec::new();

    for image in &layout.images {
        operations.push(Operation::new("q", vec![]));
        if image.translucent {
            operations.push(Operation::new("gs", vec!["GS1".into()]));
        }
        operations.push(Operation::new(
            "cm",
            vec![
                image.width.into(),
                0.0f32.into(),
                0.0f32.into(),
                image.height.into(),
                image.x.into(),
                image.y.into(),
            ],
        ));
        operations.push(Operation::new("Do", vec![image_resource(image.slot).into()]));
        operations.push(Operation::new("Q", vec![]));
    }

    for draw in &layout.texts {
        let resource = font_resource(draw.script);
        let font = assets.fonts.for_script(draw.script);
        let glyphs = used.entry(resource).or_default();

        let mut encoded = Vec::with_capacity(draw.text.len() * 2);
        for ch in draw.text.chars() {
            let glyph = font.glyph(ch);
            glyphs.entry(glyph.id).or_insert((glyph, ch));
            encoded.extend_from_slice(&glyph.id.to_be_bytes());
        }

        operations.push(Operation::new("BT", vec![]));
        operations.push(Operation::new("Tf", vec![resource.into(), draw.size.into()]));
        operations.push(Operation::new("Td", vec![draw.x.into(), draw.y.into()]));
        operations.push(Operation::new(
            "Tj",
            vec![Object::String(encoded, StringFormat::Hexadecimal)],
        ));
        operations.push(Operation::new("ET", vec![]));
    }

    if !layout.qr.is_empty() {
        operations.push(Operation::new("q", vec![]));
        operations.push(Operation::new("g", vec![0.0f32.into()]));
        for [x, y, width, height] in &layout.qr {
            operations.push(Operation::new(
                "re",
                vec![(*x).into(), (*y).into(), (*width).into(), (*height).into()],
            ));
        }
        operations.push(Operation::new("f", vec![]));
        operations.push(Operation::new("Q", vec![]));
    }

    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();

    let mut fonts = Dictionary::new();
    for (resource, glyphs) in &used {
        let script = if *resource == "F1" {
            Script::Arabic
        } else {
            Script::Latin
        };
        let font_id = add_font(&mut doc, assets.fonts.for_script(script), glyphs);
        fonts.set(*resource, font_id);
    }

    let mut images = Dictionary::new();
    for (slot, image) in [
        (ImageSlot::Logo, &assets.logo),
        (ImageSlot::Watermark, &assets.watermark),
        (ImageSlot::Stamp, &assets.stamp),
    ] {
        if layout.images.iter().any(|draw| draw.slot == slot) {
            images.set(image_resource(slot), add_image(&mut doc, image));
        }
    }

    let content = Content { operations };
    let content_id = doc.add_object(Stream::new(Dictionary::new(), content.encode()?));

    let resources = dictionary! {
        "Font" => fonts,
        "XObject" => images,
        "ExtGState" => dictionary! {
            "GS1" => dictionary! {
                "Type" => "ExtGState",
                "ca" => WATERMARK_OPACITY,
                "CA" => WATERMARK_OPACITY,
            },
        },
    };

    // MediaBox and Resources live on the page itself so merged copies stay complete
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![
            Object::Real(0.0),
            Object::Real(0.0),
            Object::Real(PAGE_WIDTH),
            Object::Real(PAGE_HEIGHT),
        ],
        "Resources" => resources,
        "Contents" => content_id,
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    doc.compress();
    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)?;
    Ok(bytes)
}

fn add_image(doc: &mut Document, image: &JpegImage) -> ObjectId {
    let stream = Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => i64::from(image.width),
            "Height" => i64::from(image.height),
            "ColorSpace" => image.color_space.pdf_name(),
            "BitsPerComponent" => 8i64,
            "Filter" => "DCTDecode",
        },
        image.data.to_vec(),
    )
    .with_compression(false);
    doc.add_object(stream)
}

/// Type0 font over an Identity-H CIDFontType2, with widths and a ToUnicode map for
/// the glyphs actually drawn.
fn add_font(doc: &mut Document, font: &EmbeddedFont, glyphs: &UsedGlyphs) -> ObjectId {
    let base_name = font.base_name().to_string();

    let file_id = doc.add_object(Stream::new(
        dictionary! { "Length1" => font.data().len() as i64 },
        font.data().to_vec(),
    ));

    let bbox: Vec<Object> = font.bbox().into_iter().map(Object::Integer).collect();
    let descriptor_id = doc.add_object(dictionary! {
        "Type" => "FontDescriptor",
        "FontName" => base_name.as_str(),
        "Flags" => 4i64,
        "FontBBox" => bbox,
        "ItalicAngle" => 0i64,
        "Ascent" => font.ascent(),
        "Descent" => font.descent(),
        "CapHeight" => font.ascent(),
        "StemV" => 80i64,
        "FontFile2" => file_id,
    });

    let mut widths = Vec::with_capacity(glyphs.len() * 2);
    for (id, (glyph, _)) in glyphs {
        widths.push(Object::Integer(i64::from(*id)));
        widths.push(Object::Array(vec![Object::Integer(font.pdf_width(*glyph))]));
    }

    let descendant_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "CIDFontType2",
        "BaseFont" => base_name.as_str(),
        "CIDSystemInfo" => dictionary! {
            "Registry" => Object::string_literal("Adobe"),
            "Ordering" => Object::string_literal("Identity"),
            "Supplement" => 0i64,
        },
        "FontDescriptor" => descriptor_id,
        "CIDToGIDMap" => "Identity",
        "W" => widths,
    });

    let to_unicode_id = doc.add_object(Stream::new(
        Dictionary::new(),
        to_unicode_cmap(glyphs).into_bytes(),
    ));

    doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type0",
        "BaseFont" => base_name.as_str(),
        "Encoding" => "Identity-H",
        "DescendantFonts" => vec![Object::Reference(descendant_id)],
        "ToUnicode" => to_unicode_id,
    })
}

fn to_unicode_cmap(glyphs: &UsedGlyphs) -> String {
    let mut cmap = String::from(
        "/CIDInit /ProcSet findresource begin\n12 dict begin\nbegincmap\n\
         /CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n\
         /CMapName /Adobe-Identity-UCS def\n/CMapType 2 def\n\
         1 begincodespacerange\n<0000> <FFFF>\nendcodespacerange\n",
    );

    let entries: Vec<(&u16, &(Glyph, char))> = glyphs.iter().collect();
    for chunk in entries.chunks(CMAP_CHUNK) {
        let _ = writeln!(cmap, "{} beginbfchar", chunk.len());
        for (id, (_, ch)) in chunk {
            let mut units = [0u16; 2];
            let utf16: String = ch
                .encode_utf16(&mut units)
                .iter()
                .map(|unit| format!("{unit:04X}"))
                .collect();
            let _ = writeln!(cmap, "<{id:04X}> <{utf16}>");
        }
        cmap.push_str("endbfchar\n");
    }

    cmap.push_str("endcmap\nCMapName currentdict /CMap defineresource pop\nend\nend\n");
    cmap
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cmap_maps_glyphs_to_their_characters() {
        let mut glyphs = UsedGlyphs::new();
        glyphs.insert(3, (Glyph { id: 3, advance: 500 }, 'A'));
        glyphs.insert(0x1F2, (Glyph { id: 0x1F2, advance: 600 }, '\u{FEFB}'));

        let cmap = to_unicode_cmap(&glyphs);
        assert!(cmap.contains("2 beginbfchar"));
        assert!(cmap.contains("<0003> <0041>"));
        assert!(cmap.contains("<01F2> <FEFB>"));
    }

    #[test]
    fn cmap_splits_long_tables() {
        let mut glyphs = UsedGlyphs::new();
        for id in 0..150u16 {
            glyphs.insert(id, (Glyph { id, advance: 500 }, 'x'));
        }
        let cmap = to_unicode_cmap(&glyphs);
        assert!(cmap.contains("100 beginbfchar"));
        assert!(cmap.contains("50 beginbfchar"));
    }
}
