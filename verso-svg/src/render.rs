//! The device implementation staging SVG primitives.

use kurbo::{Affine, BezPath};
use log::warn;
use verso_interpret::{
    ClipRegion, Device, FillProps, FillRule, GlyphDrawMode, LumaData, Paint, PlacedGlyph,
    RgbaData, StrokeProps,
};

use crate::clip::ClipRegistry;
use crate::glyph::{GlyphRegistry, stage_glyph};
use crate::image::rgba_to_data_url;
use crate::paint::{NONE, convert_paint};
use crate::path::{fmt_number, round2, to_svg_d};
use crate::{ClipId, Sink, SvgElement, SvgImage, SvgPath, SvgText};

/// A [`Device`] that stages SVG-like primitives into a [`Sink`].
///
/// Geometry is baked into device coordinates at two decimal places;
/// transforms only survive where they carry inspectable meaning
/// (rotated text, image placement).
pub struct SvgDevice<'a, S: Sink> {
    sink: &'a mut S,
    clips: ClipRegistry,
    glyphs: GlyphRegistry,
    current_clip: Option<ClipId>,
}

impl<'a, S: Sink> SvgDevice<'a, S> {
    /// Create a device staging into the sink.
    pub fn new(sink: &'a mut S) -> Self {
        Self {
            sink,
            clips: ClipRegistry::default(),
            glyphs: GlyphRegistry::default(),
            current_clip: None,
        }
    }

    fn device_path(&self, path: &BezPath, transform: Affine) -> String {
        to_svg_d(&(transform * path.clone()))
    }

    fn opacity(alpha: f32) -> Option<f32> {
        (alpha < 1.0).then_some(alpha)
    }
}

impl<S: Sink> Device for SvgDevice<'_, S> {
    fn set_clip(&mut self, clip: &ClipRegion) {
        self.current_clip = self.clips.id_for(clip, self.sink);
    }

    fn fill_path(&mut self, path: &BezPath, transform: Affine, paint: &Paint, props: &FillProps) {
        let (fill, alpha) = convert_paint(paint);

        self.sink.element(SvgElement::Path(SvgPath {
            d: self.device_path(path, transform),
            fill,
            fill_rule: props.fill_rule,
            fill_opacity: Self::opacity(alpha),
            stroke: NONE.to_string(),
            stroke_opacity: None,
            stroke_width: None,
            stroke_dash: None,
            clip: self.current_clip,
            crisp: !props.anti_alias,
        }));
    }

    fn stroke_path(
        &mut self,
        path: &BezPath,
        transform: Affine,
        paint: &Paint,
        props: &StrokeProps,
    ) {
        let (stroke, alpha) = convert_paint(paint);

        let dash = (!props.dash_array.is_empty()).then(|| {
            props
                .dash_array
                .iter()
                .map(|d| fmt_number(*d as f64))
                .collect::<Vec<_>>()
                .join(" ")
        });

        self.sink.element(SvgElement::Path(SvgPath {
            d: self.device_path(path, transform),
            fill: NONE.to_string(),
            fill_rule: FillRule::NonZero,
            fill_opacity: None,
            stroke,
            stroke_opacity: Self::opacity(alpha),
            stroke_width: Some(round2(props.line_width as f64)),
            stroke_dash: dash,
            clip: self.current_clip,
            crisp: false,
        }));
    }

    fn draw_glyph(
        &mut self,
        glyph: &PlacedGlyph<'_>,
        transform: Affine,
        paint: &Paint,
        mode: &GlyphDrawMode,
    ) {
        let (color, _) = convert_paint(paint);
        let text: SvgText = stage_glyph(
            &mut self.glyphs,
            glyph,
            transform,
            mode,
            color,
            self.current_clip,
            self.sink,
        );

        self.sink.element(SvgElement::Text(text));
    }

    fn draw_image(&mut self, image: &RgbaData, transform: Affine) {
        let Some(href) = rgba_to_data_url(&image.data, image.width, image.height) else {
            warn!("dropping image with inconsistent dimensions");

            return;
        };

        self.sink.element(SvgElement::Image(SvgImage {
            href,
            width: image.width,
            height: image.height,
            transform: transform.as_coeffs(),
            smooth: image.interpolate,
            clip: self.current_clip,
        }));
    }

    fn draw_stencil(&mut self, stencil: &LumaData, transform: Affine, paint: &Paint) {
        // A stencil is its paint, masked by the coverage samples.
        let color = match paint.as_color() {
            Some(c) => c,
            None => {
                warn!("stencil with a non-flat paint; approximating");
                verso_interpret::Color::BLACK
            }
        };

        let rgba8 = color.to_rgba8();
        let data = stencil
            .data
            .iter()
            .flat_map(|coverage| {
                let alpha = (*coverage as u16 * rgba8[3] as u16 / 255) as u8;
                [rgba8[0], rgba8[1], rgba8[2], alpha]
            })
            .collect::<Vec<u8>>();

        let Some(href) = rgba_to_data_url(&data, stencil.width, stencil.height) else {
            warn!("dropping stencil with inconsistent dimensions");

            return;
        };

        self.sink.element(SvgElement::Image(SvgImage {
            href,
            width: stencil.width,
            height: stencil.height,
            transform: transform.as_coeffs(),
            smooth: stencil.interpolate,
            clip: self.current_clip,
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CollectSink;
    use kurbo::{Rect, Shape};
    use verso_interpret::Color;

    fn red() -> Paint {
        Paint::solid(Color {
            rgb: [1.0, 0.0, 0.0],
            alpha: 1.0,
        })
    }

    #[test]
    fn fills_bake_device_coordinates() {
        let mut sink = CollectSink::default();
        let mut device = SvgDevice::new(&mut sink);

        let path = Rect::new(0.0, 0.0, 10.0, 10.0).to_path(0.1);
        // The page flip of a height-100 page.
        let flip = Affine::new([1.0, 0.0, 0.0, -1.0, 0.0, 100.0]);
        device.fill_path(&path, flip, &red(), &FillProps::default());

        match &sink.elements[0] {
            SvgElement::Path(p) => {
                assert!(p.d.contains("90"), "flipped y expected in {}", p.d);
                assert_eq!(p.fill, "#ff0000");
                assert_eq!(p.stroke, "none");
            }
            _ => panic!("expected a path"),
        }
    }

    #[test]
    fn strokes_carry_width_and_dash() {
        let mut sink = CollectSink::default();
        let mut device = SvgDevice::new(&mut sink);

        let mut path = BezPath::new();
        path.move_to((0.0, 0.0));
        path.line_to((10.0, 0.0));

        let props = StrokeProps {
            line_width: 2.5,
            dash_array: [3.0, 1.0].into_iter().collect(),
            ..StrokeProps::default()
        };
        device.stroke_path(&path, Affine::IDENTITY, &red(), &props);

        match &sink.elements[0] {
            SvgElement::Path(p) => {
                assert_eq!(p.stroke_width, Some(2.5));
                assert_eq!(p.stroke_dash.as_deref(), Some("3 1"));
                assert_eq!(p.fill, "none");
            }
            _ => panic!("expected a path"),
        }
    }
}
