//! Font metrics and glyph encoding for embedded TrueType fonts.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::RenderError;
use super::runs::Script;

/// Horizontal measurement of text set in one font.
pub trait TextMeasure {
    /// Advance width in points of `text` at `size`.
    fn width(&self, text: &str, size: f32) -> f32;
}

impl<T: TextMeasure + ?Sized> TextMeasure for Arc<T> {
    fn width(&self, text: &str, size: f32) -> f32 {
        (**self).width(text, size)
    }
}

/// One font per script; runs pick theirs by script.
#[derive(Debug, Clone)]
pub struct FontSet<M> {
    pub arabic: M,
    pub latin: M,
}

impl<M> FontSet<M> {
    pub fn new(arabic: M, latin: M) -> Self {
        Self { arabic, latin }
    }

    pub fn for_script(&self, script: Script) -> &M {
        match script {
            Script::Arabic => &self.arabic,
            Script::Latin => &self.latin,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Glyph {
    pub id: u16,
    pub advance: u16,
}

/// A parsed TrueType font kept whole for embedding.
#[derive(Debug)]
pub struct EmbeddedFont {
    base_name: String,
    data: Arc<Vec<u8>>,
    units_per_em: u16,
    ascent: i16,
    descent: i16,
    bbox: [i16; 4],
    glyphs: BTreeMap<char, Glyph>,
    notdef: Glyph,
}

impl EmbeddedFont {
    pub fn parse(name: &str, data: Vec<u8>) -> Result<Self, RenderError> {
        let face = ttf_parser::Face::parse(&data, 0).map_err(|err| RenderError::Font {
            name: name.to_string(),
            reason: err.to_string(),
        })?;

        let mut glyphs = BTreeMap::new();
        if let Some(cmap) = face.tables().cmap {
            for subtable in cmap.subtables {
                if !subtable.is_unicode() {
                    continue;
                }
                subtable.codepoints(|code_point| {
                    let Some(ch) = char::from_u32(code_point) else {
                        return;
                    };
                    if glyphs.contains_key(&ch) {
                        return;
                    }
                    if let Some(id) = subtable.glyph_index(code_point) {
                        let advance = face.glyph_hor_advance(id).unwrap_or(0);
                        glyphs.insert(ch, Glyph { id: id.0, advance });
                    }
                });
            }
        }
        if glyphs.is_empty() {
            return Err(RenderError::Font {
                name: name.to_string(),
                reason: "no unicode cmap".to_string(),
            });
        }

        let notdef = Glyph {
            id: 0,
            advance: face
                .glyph_hor_advance(ttf_parser::GlyphId(0))
                .unwrap_or(0),
        };
        let rect = face.global_bounding_box();
        let units_per_em = face.units_per_em().max(1);
        let ascent = face.ascender();
        let descent = face.descender();

        Ok(Self {
            base_name: pdf_name(name),
            units_per_em,
            ascent,
            descent,
            bbox: [rect.x_min, rect.y_min, rect.x_max, rect.y_max],
            glyphs,
            notdef,
            data: Arc::new(data),
        })
    }

    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn glyph(&self, ch: char) -> Glyph {
        self.glyphs.get(&ch).copied().unwrap_or(self.notdef)
    }

    /// Advance scaled to the 1000-unit glyph space PDF width arrays use.
    pub fn pdf_width(&self, glyph: Glyph) -> i64 {
        (i64::from(glyph.advance) * 1000) / i64::from(self.units_per_em)
    }

    pub fn ascent(&self) -> i64 {
        self.scale(self.ascent)
    }

    pub fn descent(&self) -> i64 {
        self.scale(self.descent)
    }

    pub fn bbox(&self) -> [i64; 4] {
        self.bbox.map(|value| self.scale(value))
    }

    fn scale(&self, value: i16) -> i64 {
        (i64::from(value) * 1000) / i64::from(self.units_per_em)
    }
}

impl TextMeasure for EmbeddedFont {
    fn width(&self, text: &str, size: f32) -> f32 {
        let units: u32 = text
            .chars()
            .map(|ch| u32::from(self.glyph(ch).advance))
            .sum();
        units as f32 * size / f32::from(self.units_per_em)
    }
}

/// Font file stem reduced to characters valid in a PDF name.
fn pdf_name(name: &str) -> String {
    let stem = name.rsplit('/').next().unwrap_or(name);
    let stem = stem.split('.').next().unwrap_or(stem);
    let cleaned: String = stem
        .chars()
        .filter(|ch| ch.is_ascii_alphanumeric() || *ch == '-')
        .collect();
    if cleaned.is_empty() {
        "Embedded".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Fixed advance per character, for layout tests.
    #[derive(Debug, Clone, Copy)]
    pub struct Mono(pub f32);

    impl TextMeasure for Mono {
        fn width(&self, text: &str, size: f32) -> f32 {
            text.chars().count() as f32 * self.0 * size
        }
    }

    pub fn mono_fonts(arabic: f32, latin: f32) -> FontSet<Mono> {
        FontSet::new(Mono(arabic), Mono(latin))
    }

    #[test]
    fn font_set_selects_by_script() {
        let fonts = mono_fonts(2.0, 1.0);
        assert_eq!(fonts.for_script(Script::Arabic).width("ab", 1.0), 4.0);
        assert_eq!(fonts.for_script(Script::Latin).width("ab", 1.0), 2.0);
    }

    #[test]
    fn pdf_names_drop_paths_and_extensions() {
        assert_eq!(pdf_name("fonts/Amiri-Regular.ttf"), "Amiri-Regular");
        assert_eq!(pdf_name("___.ttf"), "Embedded");
    }

    #[test]
    fn garbage_is_not_a_font() {
        let err = EmbeddedFont::parse("broken.ttf", b"not a font".to_vec()).expect_err("rejected");
        assert!(matches!(err, RenderError::Font { .. }));
    }
}
