//! Paint conversion.

use log::debug;
use verso_interpret::{Color, Paint, PaintKind};

/// The colour of a paint as a `#rrggbb` string plus its alpha.
///
/// Shadings degrade to their mean colour here; gradient synthesis is
/// beyond the primitive boundary.
pub(crate) fn convert_paint(paint: &Paint) -> (String, f32) {
    let color = match &paint.kind {
        PaintKind::Color(c) => *c,
        PaintKind::Shading(s) => {
            debug!("staging shading {} as its mean color", s.id);
            s.mean_color
        }
    };

    (hex_color(color), color.alpha)
}

pub(crate) fn hex_color(color: Color) -> String {
    let [r, g, b, _] = color.to_rgba8();
    format!("#{r:02x}{g:02x}{b:02x}")
}

/// The paint string for an element that does not paint.
pub(crate) const NONE: &str = "none";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colors_format_as_hex() {
        let c = Color {
            rgb: [1.0, 0.0, 0.501],
            alpha: 1.0,
        };
        assert_eq!(hex_color(c), "#ff0080");
    }

    #[test]
    fn alpha_is_reported_separately() {
        let paint = Paint::solid(Color {
            rgb: [0.0, 0.0, 0.0],
            alpha: 0.25,
        });
        let (fill, alpha) = convert_paint(&paint);
        assert_eq!(fill, "#000000");
        assert_eq!(alpha, 0.25);
    }
}
