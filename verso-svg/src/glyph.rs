//! Text primitive staging.

use kurbo::Affine;
use rustc_hash::FxHashMap;
use siphasher::sip128::{Hasher128, SipHasher13};
use std::hash::{Hash, Hasher};
use verso_interpret::font::UNITS_PER_EM;
use verso_interpret::{GlyphDrawMode, PlacedGlyph};

use crate::paint::NONE;
use crate::path::{round2, to_svg_d};
use crate::{ClipId, GlyphDef, GlyphId, Sink, SvgText};

/// Rotations and shears below this are treated as upright text.
const ROTATION_EPSILON: f64 = 1e-3;

#[derive(Debug, Default)]
pub(crate) struct GlyphRegistry {
    by_glyph: FxHashMap<u128, GlyphId>,
}

impl GlyphRegistry {
    fn id_for(&mut self, glyph: &PlacedGlyph<'_>, sink: &mut impl Sink) -> Option<GlyphId> {
        let outline = glyph.outline?;

        let mut hasher = SipHasher13::new();
        (glyph.font.id, glyph.code).hash(&mut hasher);
        let key = hasher.finish128().as_u128();

        if let Some(id) = self.by_glyph.get(&key) {
            return Some(*id);
        }

        let id = GlyphId(self.by_glyph.len() as u32);
        self.by_glyph.insert(key, id);
        sink.define_glyph(GlyphDef {
            id,
            d: to_svg_d(outline),
        });

        Some(id)
    }
}

/// Stage one placed glyph as a text primitive.
pub(crate) fn stage_glyph(
    registry: &mut GlyphRegistry,
    glyph: &PlacedGlyph<'_>,
    transform: Affine,
    mode: &GlyphDrawMode,
    paint: String,
    clip: Option<ClipId>,
    sink: &mut impl Sink,
) -> SvgText {
    // Glyph space to device space.
    let full = transform * glyph.glyph_transform;
    let c = full.as_coeffs();

    let origin = full * kurbo::Point::ZERO;
    let scale_x = (c[0] * c[0] + c[1] * c[1]).sqrt();
    let scale_y = (c[2] * c[2] + c[3] * c[3]).sqrt();
    let scale = (scale_x * scale_y).sqrt();
    let font_size = round2(scale * UNITS_PER_EM as f64);

    // Rotated or sheared text keeps its transform inspectable instead of
    // having the rotation baked into coordinates.
    let rotation = if c[1].abs() > ROTATION_EPSILON * scale || c[2].abs() > ROTATION_EPSILON * scale
    {
        let rot = Affine::translate(origin.to_vec2())
            * Affine::new([c[0] / scale, c[1] / scale, c[2] / scale, c[3] / scale, 0.0, 0.0])
            * Affine::translate(-origin.to_vec2());
        Some(rot.as_coeffs())
    } else {
        None
    };

    let glyph_ref = registry
        .id_for(glyph, sink)
        .map(|id| (id, full.as_coeffs()));

    let (fill, stroke, stroke_width) = match mode {
        GlyphDrawMode::Fill => (paint, NONE.to_string(), None),
        GlyphDrawMode::Stroke(props) => (
            NONE.to_string(),
            paint,
            Some(round2(props.line_width as f64)),
        ),
        GlyphDrawMode::Invisible => (NONE.to_string(), NONE.to_string(), None),
    };

    SvgText {
        x: round2(origin.x),
        y: round2(origin.y),
        unicode: glyph.unicode.map(|c| c.to_string()),
        font_family: glyph.font.family.to_string(),
        font_size,
        bold: glyph.font.is_bold(),
        italic: glyph.font.italic,
        fill,
        stroke,
        stroke_width,
        width: round2(glyph.advance as f64),
        rotation,
        glyph: glyph_ref,
        placeholder: glyph.is_placeholder,
        clip,
    }
}
