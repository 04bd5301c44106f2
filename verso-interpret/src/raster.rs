//! The offscreen raster target the compositor renders groups into.
//!
//! This is deliberately a second, private implementation of [`Device`]:
//! transparency groups and soft masks are defined in terms of pixels, so
//! their content is drawn here and composited back into the vector
//! output as an image.

use kurbo::{Affine, BezPath, Cap, Join, PathEl};
use log::debug;
use tiny_skia::{
    FilterQuality, Mask, Paint as SkiaPaint, PathBuilder, Pixmap, PixmapPaint, Stroke, StrokeDash,
    Transform,
};

use crate::clip::ClipRegion;
use crate::color::Color;
use crate::device::{Device, GlyphDrawMode, LumaData, PlacedGlyph, RgbaData};
use crate::paint::{FillProps, FillRule, Paint, PaintKind, StrokeProps};

pub(crate) struct RasterDevice {
    pixmap: Pixmap,
    // Maps device space into buffer space (origin shift + raster scale).
    device_transform: Affine,
    clip: Option<Mask>,
}

impl RasterDevice {
    /// Create a buffer of the given pixel size. `device_transform` maps
    /// device space into the buffer; `backdrop` pre-fills it.
    pub(crate) fn new(
        width: u32,
        height: u32,
        device_transform: Affine,
        backdrop: Option<Color>,
    ) -> Option<Self> {
        let mut pixmap = Pixmap::new(width, height)?;

        if let Some(color) = backdrop {
            let [r, g, b, a] = [color.rgb[0], color.rgb[1], color.rgb[2], color.alpha];
            pixmap.fill(tiny_skia::Color::from_rgba(r, g, b, a)?);
        }

        Some(Self {
            pixmap,
            device_transform,
            clip: None,
        })
    }

    pub(crate) fn into_pixmap(self) -> Pixmap {
        self.pixmap
    }

    fn buffer_transform(&self, device_side: Affine) -> Transform {
        to_skia_transform(self.device_transform * device_side)
    }

    fn fill_impl(&mut self, path: &BezPath, transform: Affine, paint: &Paint, props: &FillProps) {
        let Some(skia_path) = to_skia_path(path) else {
            return;
        };

        let skia_paint = convert_paint(paint, props.anti_alias);
        self.pixmap.fill_path(
            &skia_path,
            &skia_paint,
            convert_fill_rule(props.fill_rule),
            self.buffer_transform(transform),
            self.clip.as_ref(),
        );
    }

    fn stroke_impl(
        &mut self,
        path: &BezPath,
        transform: Affine,
        paint: &Paint,
        props: &StrokeProps,
    ) {
        // Transform the path into device space first; the stroke width
        // is a device-unit quantity and must not be scaled by the CTM
        // again.
        let device_path = transform * path.clone();
        let Some(skia_path) = to_skia_path(&device_path) else {
            return;
        };

        let dash = if props.dash_array.is_empty() {
            None
        } else {
            StrokeDash::new(dash_intervals(&props.dash_array), props.dash_offset)
        };

        let stroke = Stroke {
            width: props.line_width.max(f32::EPSILON),
            miter_limit: props.miter_limit,
            line_cap: match props.line_cap {
                Cap::Butt => tiny_skia::LineCap::Butt,
                Cap::Round => tiny_skia::LineCap::Round,
                Cap::Square => tiny_skia::LineCap::Square,
            },
            line_join: match props.line_join {
                Join::Miter => tiny_skia::LineJoin::Miter,
                Join::Round => tiny_skia::LineJoin::Round,
                Join::Bevel => tiny_skia::LineJoin::Bevel,
            },
            dash,
        };

        let skia_paint = convert_paint(paint, true);
        self.pixmap.stroke_path(
            &skia_path,
            &skia_paint,
            &stroke,
            to_skia_transform(self.device_transform),
            self.clip.as_ref(),
        );
    }

    fn draw_rgba(&mut self, data: &[u8], width: u32, height: u32, smooth: bool, full: Affine) {
        let Some(source) = pixmap_from_rgba(data, width, height) else {
            return;
        };

        let paint = PixmapPaint {
            quality: if smooth {
                FilterQuality::Bilinear
            } else {
                FilterQuality::Nearest
            },
            ..PixmapPaint::default()
        };

        self.pixmap.draw_pixmap(
            0,
            0,
            source.as_ref(),
            &paint,
            to_skia_transform(full),
            self.clip.as_ref(),
        );
    }
}

impl Device for RasterDevice {
    fn set_clip(&mut self, clip: &ClipRegion) {
        let paths = clip.paths();
        if paths.is_empty() {
            self.clip = None;
            return;
        }

        let mut mask = match Mask::new(self.pixmap.width(), self.pixmap.height()) {
            Some(mask) => mask,
            None => return,
        };

        let transform = to_skia_transform(self.device_transform);
        for (i, (path, rule)) in paths.iter().enumerate() {
            let Some(skia_path) = to_skia_path(path) else {
                continue;
            };
            if i == 0 {
                mask.fill_path(&skia_path, convert_fill_rule(*rule), true, transform);
            } else {
                mask.intersect_path(&skia_path, convert_fill_rule(*rule), true, transform);
            }
        }

        self.clip = Some(mask);
    }

    fn fill_path(&mut self, path: &BezPath, transform: Affine, paint: &Paint, props: &FillProps) {
        self.fill_impl(path, transform, paint, props);
    }

    fn stroke_path(
        &mut self,
        path: &BezPath,
        transform: Affine,
        paint: &Paint,
        props: &StrokeProps,
    ) {
        self.stroke_impl(path, transform, paint, props);
    }

    fn draw_glyph(
        &mut self,
        glyph: &PlacedGlyph<'_>,
        transform: Affine,
        paint: &Paint,
        mode: &GlyphDrawMode,
    ) {
        let Some(outline) = glyph.outline else {
            return;
        };
        let path = glyph.glyph_transform * outline.clone();

        match mode {
            GlyphDrawMode::Fill => {
                self.fill_impl(&path, transform, paint, &FillProps::default());
            }
            GlyphDrawMode::Stroke(props) => self.stroke_impl(&path, transform, paint, props),
            GlyphDrawMode::Invisible => {}
        }
    }

    fn draw_image(&mut self, image: &RgbaData, transform: Affine) {
        let full = self.device_transform * transform;
        self.draw_rgba(&image.data, image.width, image.height, image.interpolate, full);
    }

    fn draw_stencil(&mut self, stencil: &LumaData, transform: Affine, paint: &Paint) {
        let color = paint_color(paint);
        let rgba = stencil
            .data
            .iter()
            .flat_map(|coverage| {
                let mut c = color;
                c.alpha *= *coverage as f32 / 255.0;
                c.to_rgba8()
            })
            .collect::<Vec<u8>>();

        let full = self.device_transform * transform;
        self.draw_rgba(&rgba, stencil.width, stencil.height, stencil.interpolate, full);
    }
}

fn paint_color(paint: &Paint) -> Color {
    match &paint.kind {
        PaintKind::Color(c) => *c,
        PaintKind::Shading(s) => {
            // Inside a mask buffer a shading can only be approximated.
            debug!("approximating shading with its mean color in a raster buffer");
            s.mean_color
        }
    }
}

fn convert_paint(paint: &Paint, anti_alias: bool) -> SkiaPaint<'static> {
    let color = paint_color(paint);
    let mut skia_paint = SkiaPaint::default();
    skia_paint.set_color_rgba8(
        (color.rgb[0].clamp(0.0, 1.0) * 255.0 + 0.5) as u8,
        (color.rgb[1].clamp(0.0, 1.0) * 255.0 + 0.5) as u8,
        (color.rgb[2].clamp(0.0, 1.0) * 255.0 + 0.5) as u8,
        (color.alpha.clamp(0.0, 1.0) * 255.0 + 0.5) as u8,
    );
    skia_paint.anti_alias = anti_alias;

    skia_paint
}

fn convert_fill_rule(rule: FillRule) -> tiny_skia::FillRule {
    match rule {
        FillRule::NonZero => tiny_skia::FillRule::Winding,
        FillRule::EvenOdd => tiny_skia::FillRule::EvenOdd,
    }
}

pub(crate) fn to_skia_transform(affine: Affine) -> Transform {
    let c = affine.as_coeffs();
    Transform::from_row(
        c[0] as f32,
        c[1] as f32,
        c[2] as f32,
        c[3] as f32,
        c[4] as f32,
        c[5] as f32,
    )
}

fn to_skia_path(path: &BezPath) -> Option<tiny_skia::Path> {
    let mut builder = PathBuilder::new();

    for el in path.elements() {
        match *el {
            PathEl::MoveTo(p) => builder.move_to(p.x as f32, p.y as f32),
            PathEl::LineTo(p) => builder.line_to(p.x as f32, p.y as f32),
            PathEl::QuadTo(p1, p2) => {
                builder.quad_to(p1.x as f32, p1.y as f32, p2.x as f32, p2.y as f32);
            }
            PathEl::CurveTo(p1, p2, p3) => builder.cubic_to(
                p1.x as f32,
                p1.y as f32,
                p2.x as f32,
                p2.y as f32,
                p3.x as f32,
                p3.y as f32,
            ),
            PathEl::ClosePath => builder.close(),
        }
    }

    builder.finish()
}

/// Build a premultiplied pixmap from straight-alpha RGBA samples.
fn pixmap_from_rgba(data: &[u8], width: u32, height: u32) -> Option<Pixmap> {
    let len = width as usize * height as usize * 4;
    if data.len() < len {
        return None;
    }

    let mut premultiplied = Vec::with_capacity(len);
    for px in data[..len].chunks_exact(4) {
        let a = px[3] as u16;
        premultiplied.extend_from_slice(&[
            ((px[0] as u16 * a) / 255) as u8,
            ((px[1] as u16 * a) / 255) as u8,
            ((px[2] as u16 * a) / 255) as u8,
            px[3],
        ]);
    }

    Pixmap::from_vec(
        premultiplied,
        tiny_skia::IntSize::from_wh(width, height)?,
    )
}

/// A dash array must have even length for the rasterizer; odd arrays
/// repeat, as the imaging model specifies.
fn dash_intervals(dash: &[f32]) -> Vec<f32> {
    if dash.len() % 2 == 0 {
        dash.to_vec()
    } else {
        dash.iter().chain(dash.iter()).copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Rect;
    use kurbo::Shape;

    fn solid(rgb: [f32; 3]) -> Paint {
        Paint::solid(Color { rgb, alpha: 1.0 })
    }

    #[test]
    fn fills_land_in_the_buffer() {
        let mut device = RasterDevice::new(10, 10, Affine::IDENTITY, None).unwrap();
        let path = Rect::new(0.0, 0.0, 10.0, 10.0).to_path(0.1);
        device.fill_path(
            &path,
            Affine::IDENTITY,
            &solid([1.0, 0.0, 0.0]),
            &FillProps::default(),
        );

        let pixmap = device.into_pixmap();
        let px = pixmap.pixel(5, 5).unwrap();
        assert_eq!((px.red(), px.green(), px.blue(), px.alpha()), (255, 0, 0, 255));
    }

    #[test]
    fn device_transform_offsets_drawing() {
        // Buffer anchored at device (100, 100).
        let mut device =
            RasterDevice::new(10, 10, Affine::translate((-100.0, -100.0)), None).unwrap();
        let path = Rect::new(100.0, 100.0, 105.0, 105.0).to_path(0.1);
        device.fill_path(
            &path,
            Affine::IDENTITY,
            &solid([0.0, 1.0, 0.0]),
            &FillProps::default(),
        );

        let pixmap = device.into_pixmap();
        assert!(pixmap.pixel(2, 2).unwrap().alpha() > 0);
        assert_eq!(pixmap.pixel(8, 8).unwrap().alpha(), 0);
    }

    #[test]
    fn clip_masks_fills() {
        let mut device = RasterDevice::new(10, 10, Affine::IDENTITY, None).unwrap();
        let clip = ClipRegion::page(Rect::new(0.0, 0.0, 10.0, 10.0)).intersect(
            Rect::new(0.0, 0.0, 4.0, 10.0).to_path(0.1),
            FillRule::NonZero,
        );
        device.set_clip(&clip);

        let path = Rect::new(0.0, 0.0, 10.0, 10.0).to_path(0.1);
        device.fill_path(
            &path,
            Affine::IDENTITY,
            &solid([0.0, 0.0, 1.0]),
            &FillProps::default(),
        );

        let pixmap = device.into_pixmap();
        assert!(pixmap.pixel(2, 5).unwrap().alpha() > 0);
        assert_eq!(pixmap.pixel(8, 5).unwrap().alpha(), 0);
    }

    #[test]
    fn stroke_width_is_not_rescaled_by_the_ctm() {
        // A 2x CTM scale with a 1-unit device stroke width must yield a
        // ~1 pixel line, not 2.
        let mut device = RasterDevice::new(20, 20, Affine::IDENTITY, None).unwrap();
        let mut path = BezPath::new();
        path.move_to((0.0, 5.0));
        path.line_to((10.0, 5.0));

        let props = StrokeProps {
            line_width: 1.0,
            ..StrokeProps::default()
        };
        device.stroke_path(&path, Affine::scale(2.0), &solid([1.0, 1.0, 1.0]), &props);

        let pixmap = device.into_pixmap();
        // On the line.
        assert!(pixmap.pixel(5, 10).unwrap().alpha() > 0);
        // Two pixels off the line must be clear for a 1px stroke.
        assert_eq!(pixmap.pixel(5, 13).unwrap().alpha(), 0);
    }
}
