//! Resolved fonts and glyph outlines.
//!
//! Font programs are parsed elsewhere; the engine only consumes resolved
//! metadata plus an [`OutlineProvider`] that turns (font, code) pairs
//! into outlines in a normalized glyph space of 1000 units per em.

use std::sync::Arc;

use kurbo::{Affine, BezPath, Rect, Shape};
use rustc_hash::FxHashMap;

/// The size of the normalized glyph space.
pub const UNITS_PER_EM: f32 = 1000.0;

/// A resolved font.
#[derive(Debug, Clone)]
pub struct Font {
    /// A caller-assigned identity, unique per resolved font. Glyph
    /// caching is keyed on it.
    pub id: u64,
    /// The family name, stripped of any subset prefix.
    pub family: Arc<str>,
    /// The font weight (400 regular, 700 bold).
    pub weight: u16,
    /// Whether the font is italic.
    pub italic: bool,
    /// Whether a font program was embedded in the document. Outlines of
    /// non-embedded fonts are stretched to the declared widths.
    pub embedded: bool,
    /// How many bytes one character code occupies (1 or 2).
    pub code_len: u8,
    /// The font matrix mapping glyph space into text space.
    pub matrix: Affine,
    /// Widths declared in the document, in glyph-space units.
    pub widths: FxHashMap<u16, f32>,
    /// The width used for codes missing from `widths`.
    pub default_width: f32,
    /// Unicode mapping for the emitted text primitives.
    pub unicode: Option<Arc<FxHashMap<u16, char>>>,
}

impl Font {
    /// The conventional font matrix scaling 1000 glyph units to one text
    /// space unit.
    pub fn default_matrix() -> Affine {
        Affine::scale(1.0 / UNITS_PER_EM as f64)
    }

    /// Read the next character code from a string operand.
    ///
    /// Returns the code and the number of bytes consumed.
    pub fn read_code(&self, bytes: &[u8], at: usize) -> (u16, usize) {
        match self.code_len {
            2 if at + 1 < bytes.len() => {
                (u16::from_be_bytes([bytes[at], bytes[at + 1]]), 2)
            }
            _ => (bytes[at] as u16, 1),
        }
    }

    /// The declared width of a code, in glyph-space units.
    pub fn width(&self, code: u16) -> f32 {
        self.widths.get(&code).copied().unwrap_or(self.default_width)
    }

    /// The Unicode mapping of a code, if one is known.
    pub fn to_unicode(&self, code: u16) -> Option<char> {
        self.unicode.as_ref().and_then(|m| m.get(&code).copied())
    }

    /// Whether the font renders as bold.
    pub fn is_bold(&self) -> bool {
        self.weight >= 600
    }
}

/// Provides glyph outlines for resolved fonts.
///
/// Outlines are expressed in the 1000-unit glyph space with the y-axis
/// pointing up; the engine caches them per session, so a provider is
/// queried at most once per (font, code) pair.
pub trait OutlineProvider {
    /// The outline of a character code, or `None` when the font has no
    /// glyph for it.
    fn outline(&self, font: &Font, code: u16) -> Option<BezPath>;

    /// Whether the font maps this code to a glyph at all.
    ///
    /// Distinguishes a code with no mapping (drawn as a placeholder box)
    /// from a mapped glyph whose outline could not be extracted (skipped
    /// but still advanced).
    fn maps(&self, font: &Font, code: u16) -> bool {
        let _ = (font, code);
        true
    }

    /// The advance of the glyph as stored in the font program, in
    /// glyph-space units. Used to stretch non-embedded fonts to their
    /// declared widths.
    fn advance(&self, font: &Font, code: u16) -> Option<f32> {
        let _ = (font, code);
        None
    }
}

/// An outline provider with no outlines, for callers that only need
/// text positions.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOutlines;

impl OutlineProvider for NoOutlines {
    fn outline(&self, _: &Font, _: u16) -> Option<BezPath> {
        None
    }
}

/// The hollow box drawn for codes with no glyph mapping.
pub(crate) fn placeholder_outline() -> BezPath {
    let mut path = Rect::new(60.0, 0.0, 560.0, 660.0).to_path(0.1);
    // Inner contour wound the opposite way so the box stays hollow
    // under the non-zero rule.
    let inner = Rect::new(110.0, 50.0, 510.0, 610.0);
    path.move_to((inner.x0, inner.y0));
    path.line_to((inner.x0, inner.y1));
    path.line_to((inner.x1, inner.y1));
    path.line_to((inner.x1, inner.y0));
    path.close_path();

    path
}

#[cfg(test)]
mod tests {
    use super::*;

    fn font(code_len: u8) -> Font {
        Font {
            id: 1,
            family: "Helvetica".into(),
            weight: 400,
            italic: false,
            embedded: true,
            code_len,
            matrix: Font::default_matrix(),
            widths: FxHashMap::from_iter([(65, 722.0)]),
            default_width: 500.0,
            unicode: None,
        }
    }

    #[test]
    fn single_byte_codes() {
        let f = font(1);
        assert_eq!(f.read_code(b"AB", 0), (65, 1));
        assert_eq!(f.read_code(b"AB", 1), (66, 1));
    }

    #[test]
    fn two_byte_codes() {
        let f = font(2);
        assert_eq!(f.read_code(&[0x01, 0x02, 0x03, 0x04], 0), (0x0102, 2));
        assert_eq!(f.read_code(&[0x01, 0x02, 0x03, 0x04], 2), (0x0304, 2));
    }

    #[test]
    fn truncated_two_byte_code_degrades_to_one_byte() {
        let f = font(2);
        assert_eq!(f.read_code(&[0x41], 0), (0x41, 1));
    }

    #[test]
    fn missing_width_falls_back_to_default() {
        let f = font(1);
        assert_eq!(f.width(65), 722.0);
        assert_eq!(f.width(66), 500.0);
    }

    #[test]
    fn placeholder_is_a_closed_hollow_box() {
        let p = placeholder_outline();
        assert!(p.bounding_box().width() > 0.0);
        assert_eq!(
            p.elements()
                .iter()
                .filter(|e| matches!(e, kurbo::PathEl::ClosePath))
                .count(),
            2
        );
    }
}
