//! Transparency groups and soft masks.
//!
//! Both are realized by re-invoking the interpreter against a private
//! offscreen raster target and compositing the resulting buffer back
//! into the parent device as an image. Nested invocations get a fresh
//! [`Context`]; the parent's transform, clip and page geometry are never
//! touched, so they are intact on every exit path.

use kurbo::{Affine, BezPath, Rect, Shape};
use log::debug;

use crate::clip::ClipRegion;
use crate::color::{Color, ColorSpace};
use crate::context::Context;
use crate::coords::remap_rect_for_rotation;
use crate::device::{Device, RgbaData};
use crate::error::Error;
use crate::interpret;
use crate::paint::{FillProps, Paint, StrokeProps};
use crate::raster::RasterDevice;
use crate::resource::{FormXObject, ImageXObject};
use crate::soft_mask::{MaskKind, SoftMask};

/// The realized content of a transparency group.
///
/// Owned by the invocation that produced it and dropped as soon as the
/// composite into the parent is done.
pub(crate) struct TransparencyGroupResult {
    pub(crate) pixels: GroupPixels,
    /// Where the buffer lands in device space.
    pub(crate) placement: Rect,
}

/// The pixel storage of a group buffer.
///
/// Gray groups keep only luma and alpha, which halves the resident size
/// of the ephemeral buffer; everything else stays RGBA.
pub(crate) enum GroupPixels {
    Rgba {
        data: Vec<u8>,
        width: u32,
        height: u32,
    },
    GrayAlpha {
        data: Vec<u8>,
        width: u32,
        height: u32,
    },
}

impl GroupPixels {
    fn from_rgba(data: Vec<u8>, width: u32, height: u32, gray: bool) -> Self {
        if gray {
            let data = data
                .chunks_exact(4)
                .flat_map(|px| {
                    let luma = (0.299 * px[0] as f32
                        + 0.587 * px[1] as f32
                        + 0.114 * px[2] as f32) as u8;
                    [luma, px[3]]
                })
                .collect();
            Self::GrayAlpha {
                data,
                width,
                height,
            }
        } else {
            Self::Rgba {
                data,
                width,
                height,
            }
        }
    }

    pub(crate) fn dimensions(&self) -> (u32, u32) {
        match self {
            Self::Rgba { width, height, .. } | Self::GrayAlpha { width, height, .. } => {
                (*width, *height)
            }
        }
    }

    pub(crate) fn to_rgba(&self) -> Vec<u8> {
        match self {
            Self::Rgba { data, .. } => data.clone(),
            Self::GrayAlpha { data, .. } => data
                .chunks_exact(2)
                .flat_map(|px| [px[0], px[0], px[0], px[1]])
                .collect(),
        }
    }
}

/// A realized soft mask: per-pixel coverage over a device-space rect.
pub(crate) struct MaskBuffer {
    coverage: Vec<u8>,
    width: u32,
    height: u32,
    rect: Rect,
}

impl MaskBuffer {
    /// The mask value at a device-space position. Outside the mask's
    /// extent everything is masked out.
    fn coverage_at(&self, x: f64, y: f64) -> f32 {
        if !self.rect.contains((x, y)) || self.rect.width() <= 0.0 {
            return 0.0;
        }

        let px = ((x - self.rect.x0) / self.rect.width() * self.width as f64) as u32;
        let py = ((y - self.rect.y0) / self.rect.height() * self.height as f64) as u32;
        let px = px.min(self.width - 1);
        let py = py.min(self.height - 1);

        self.coverage[(py * self.width + px) as usize] as f32 / 255.0
    }
}

/// Render a form's content into an offscreen buffer.
///
/// `transform` maps form space into the frame the buffer is rendered
/// in; `frame` maps device space into that frame (identity for groups,
/// the rotation-stripping transform for masks) and carries the parent
/// clip across. Returns `None` when the clipped bounding box is empty;
/// nothing is allocated in that case.
fn render_to_buffer(
    form: &FormXObject,
    transform: Affine,
    frame: Affine,
    context: &Context,
    backdrop: Option<Color>,
) -> Result<Option<(tiny_skia::Pixmap, Rect)>, Error> {
    let group_bbox = (transform * form.bbox.to_path(0.1)).bounding_box();

    // Clip the bbox so an unbounded group cannot allocate an unbounded
    // buffer.
    let clip_bbox = (frame * context.get().clip.bbox().to_path(0.1)).bounding_box();
    let bounds = group_bbox.intersect(clip_bbox);
    if bounds.width() <= 0.0 || bounds.height() <= 0.0 {
        return Ok(None);
    }

    let scale = context.settings.raster_scale.max(0.05) as f64;
    let width = (bounds.width() * scale).ceil().max(1.0) as u32;
    let height = (bounds.height() * scale).ceil().max(1.0) as u32;

    let buffer_from_frame = Affine::scale(scale) * Affine::translate((-bounds.x0, -bounds.y0));

    let Some(mut raster) = RasterDevice::new(width, height, buffer_from_frame, backdrop) else {
        return Ok(None);
    };

    // The nested rendition owns its own state stack and path builder;
    // the parent context is read, never written.
    let mut nested = Context::new_with(
        context.geometry,
        context.session.clone(),
        context.settings.clone(),
        transform,
        mapped_clip(&context.get().clip, frame, bounds),
    );

    interpret::interpret(&form.content, &*form.resources, &mut nested, &mut raster)?;

    Ok(Some((raster.into_pixmap(), bounds)))
}

/// Carry the parent clip into the buffer's frame.
fn mapped_clip(clip: &ClipRegion, frame: Affine, frame_rect: Rect) -> std::sync::Arc<ClipRegion> {
    let mut region = ClipRegion::page(frame_rect);
    for (path, rule) in clip.paths() {
        region = region.intersect(frame * path.clone(), *rule);
    }

    region
}

fn unpremultiplied_rgba(pixmap: &tiny_skia::Pixmap) -> Vec<u8> {
    pixmap
        .pixels()
        .iter()
        .flat_map(|px| {
            let c = px.demultiply();
            [c.red(), c.green(), c.blue(), c.alpha()]
        })
        .collect()
}

/// Draw a form as a transparency group: render offscreen, apply the
/// group alpha and any outer soft mask, then composite the buffer back
/// as an image.
pub(crate) fn draw_transparency_group(
    form: &FormXObject,
    context: &mut Context,
    device: &mut impl Device,
) -> Result<(), Error> {
    // The form matrix is already folded into the CTM by the caller.
    let ctm = context.get().ctm;

    let Some((pixmap, placement)) = render_to_buffer(form, ctm, Affine::IDENTITY, context, None)?
    else {
        // Empty group: no buffer, no output.
        return Ok(());
    };

    let mut rgba = unpremultiplied_rgba(&pixmap);

    let alpha = context.get().fill_alpha.clamp(0.0, 1.0);
    let mask = match &context.get().soft_mask {
        Some(soft_mask) => render_soft_mask(soft_mask, context)?,
        None => None,
    };

    apply_alpha_and_mask(
        &mut rgba,
        pixmap.width(),
        pixmap.height(),
        placement,
        alpha,
        mask.as_ref(),
    );

    let gray = form.group.map(|g| g.gray).unwrap_or(false);
    let result = TransparencyGroupResult {
        pixels: GroupPixels::from_rgba(rgba, pixmap.width(), pixmap.height(), gray),
        placement,
    };

    emit_buffer(context, device, &result);

    Ok(())
}

/// Realize a soft mask as a per-pixel coverage buffer.
///
/// The group is rendered in the unrotated frame; under page rotation
/// the buffer is counter-rotated by quadrant and its placement rect
/// remapped before it is used for compositing.
///
/// Returns `None` when the mask's content produced nothing: an empty
/// mask indicates an ignorable group, not full masking, so the caller
/// paints unmasked rather than with the backdrop.
pub(crate) fn render_soft_mask(
    mask: &SoftMask,
    context: &Context,
) -> Result<Option<MaskBuffer>, Error> {
    let rotation = context.geometry.rotation;
    let frame = if rotation == 0 {
        Affine::IDENTITY
    } else {
        context.geometry.unrotated().base_transform() * context.geometry.inverse_transform()
    };

    let backdrop = match (&mask.kind, &mask.backdrop) {
        (MaskKind::Luminosity, Some(components)) => Some(backdrop_color(components)),
        _ => None,
    };

    let transform = frame * mask.ctm * mask.group.matrix;
    let Some((pixmap, bounds)) = render_to_buffer(&mask.group, transform, frame, context, backdrop)?
    else {
        return Ok(None);
    };

    let coverage: Vec<u8> = match mask.kind {
        MaskKind::Luminosity => pixmap
            .pixels()
            .iter()
            .map(|px| {
                // Premultiplied samples are exactly "composited over
                // black" (or over the opaque backdrop pre-fill).
                (0.299 * px.red() as f32 + 0.587 * px.green() as f32 + 0.114 * px.blue() as f32)
                    as u8
            })
            .collect(),
        MaskKind::Alpha => pixmap.pixels().iter().map(|px| px.alpha()).collect(),
    };

    let (coverage, width, height) =
        rotate_coverage(coverage, pixmap.width(), pixmap.height(), rotation);
    let rect = remap_rect_for_rotation(
        bounds,
        context.geometry.unrotated().device_size(),
        rotation,
    );

    Ok(Some(MaskBuffer {
        coverage,
        width,
        height,
        rect,
    }))
}

fn backdrop_color(components: &[f32]) -> Color {
    let cs = match components.len() {
        1 => ColorSpace::device_gray(),
        4 => ColorSpace::device_cmyk(),
        _ => ColorSpace::device_rgb(),
    };

    Color::from_components(&cs, components, 1.0)
}

/// Counter-rotate a coverage buffer by the page-rotation quadrant.
fn rotate_coverage(data: Vec<u8>, width: u32, height: u32, rotation: u16) -> (Vec<u8>, u32, u32) {
    let (w, h) = (width as usize, height as usize);
    match rotation {
        90 => {
            let mut out = vec![0; data.len()];
            for y in 0..h {
                for x in 0..w {
                    let out_x = h - 1 - y;
                    let out_y = x;
                    out[out_y * h + out_x] = data[y * w + x];
                }
            }
            (out, height, width)
        }
        180 => {
            let mut out = vec![0; data.len()];
            for y in 0..h {
                for x in 0..w {
                    out[(h - 1 - y) * w + (w - 1 - x)] = data[y * w + x];
                }
            }
            (out, width, height)
        }
        270 => {
            let mut out = vec![0; data.len()];
            for y in 0..h {
                for x in 0..w {
                    let out_x = y;
                    let out_y = w - 1 - x;
                    out[out_y * h + out_x] = data[y * w + x];
                }
            }
            (out, height, width)
        }
        _ => (data, width, height),
    }
}

/// Multiply constant alpha and mask coverage into straight-alpha RGBA
/// samples placed at `rect`.
fn apply_alpha_and_mask(
    rgba: &mut [u8],
    width: u32,
    height: u32,
    rect: Rect,
    alpha: f32,
    mask: Option<&MaskBuffer>,
) {
    if alpha >= 1.0 && mask.is_none() {
        return;
    }

    for y in 0..height {
        for x in 0..width {
            let i = ((y * width + x) * 4 + 3) as usize;
            let mut a = rgba[i] as f32 / 255.0 * alpha;

            if let Some(mask) = mask {
                let dx = rect.x0 + (x as f64 + 0.5) / width as f64 * rect.width();
                let dy = rect.y0 + (y as f64 + 0.5) / height as f64 * rect.height();
                a *= mask.coverage_at(dx, dy);
            }

            rgba[i] = (a * 255.0 + 0.5) as u8;
        }
    }
}

fn emit_buffer(
    context: &mut Context,
    device: &mut impl Device,
    result: &TransparencyGroupResult,
) {
    let (width, height) = result.pixels.dimensions();
    let transform = Affine::translate((result.placement.x0, result.placement.y0))
        * Affine::scale_non_uniform(
            result.placement.width() / width as f64,
            result.placement.height() / height as f64,
        );

    context.sync_clip(device);
    device.draw_image(
        &RgbaData {
            data: result.pixels.to_rgba(),
            width,
            height,
            interpolate: true,
        },
        transform,
    );
}

/// Realize the active soft mask, if there is one worth applying.
///
/// A mask whose content renders to nothing is dropped here: the parent
/// paint proceeds unmodified rather than being replaced by the backdrop.
fn realize_active_mask(context: &Context) -> Result<Option<MaskBuffer>, Error> {
    let Some(soft_mask) = context.get().soft_mask.clone() else {
        return Ok(None);
    };

    match render_soft_mask(&soft_mask, context)? {
        Some(mask) => Ok(Some(mask)),
        None => {
            debug!("ignoring soft mask with empty content");
            Ok(None)
        }
    }
}

/// Fill a path whose paint is subject to the active soft mask: the fill
/// is rasterized over the masked area and composited as an image.
pub(crate) fn masked_fill(
    context: &mut Context,
    device: &mut impl Device,
    path: &BezPath,
    transform: Affine,
    paint: &Paint,
    props: &FillProps,
) -> Result<(), Error> {
    let Some(mask) = realize_active_mask(context)? else {
        context.sync_clip(device);
        device.fill_path(path, transform, paint, props);
        return Ok(());
    };

    let device_bounds = (transform * path.clone()).bounding_box();
    rasterize_masked(context, device, device_bounds, mask, |raster| {
        raster.fill_path(path, transform, paint, props);
    })
}

/// Stroke a path whose paint is subject to the active soft mask.
pub(crate) fn masked_stroke(
    context: &mut Context,
    device: &mut impl Device,
    path: &BezPath,
    transform: Affine,
    paint: &Paint,
    props: &StrokeProps,
) -> Result<(), Error> {
    let Some(mask) = realize_active_mask(context)? else {
        context.sync_clip(device);
        device.stroke_path(path, transform, paint, props);
        return Ok(());
    };

    // Bound by the stroked extent, not the bare path.
    let grow = props.line_width as f64;
    let device_bounds = (transform * path.clone()).bounding_box().inflate(grow, grow);
    rasterize_masked(context, device, device_bounds, mask, |raster| {
        raster.stroke_path(path, transform, paint, props);
    })
}

/// Draw an image whose paint is subject to the active soft mask.
pub(crate) fn masked_image(
    image: &ImageXObject,
    context: &mut Context,
    device: &mut impl Device,
    transform: Affine,
) -> Result<(), Error> {
    let rgba = RgbaData {
        data: image.to_rgba8(),
        width: image.width,
        height: image.height,
        interpolate: image.interpolate,
    };

    let Some(mask) = realize_active_mask(context)? else {
        context.sync_clip(device);
        device.draw_image(&rgba, transform);
        return Ok(());
    };

    let pixel_rect = Rect::new(0.0, 0.0, image.width as f64, image.height as f64);
    let device_bounds = (transform * pixel_rect.to_path(0.1)).bounding_box();
    rasterize_masked(context, device, device_bounds, mask, |raster| {
        raster.draw_image(&rgba, transform);
    })
}

/// Rasterize one paint operation over its masked extent and composite
/// the result back as an image.
fn rasterize_masked(
    context: &mut Context,
    device: &mut impl Device,
    device_bounds: Rect,
    mask: MaskBuffer,
    draw: impl FnOnce(&mut RasterDevice),
) -> Result<(), Error> {
    let bounds = device_bounds
        .intersect(context.get().clip.bbox())
        .intersect(mask.rect);
    if bounds.width() <= 0.0 || bounds.height() <= 0.0 {
        return Ok(());
    }

    let scale = context.settings.raster_scale.max(0.05) as f64;
    let width = (bounds.width() * scale).ceil().max(1.0) as u32;
    let height = (bounds.height() * scale).ceil().max(1.0) as u32;
    let buffer_from_device = Affine::scale(scale) * Affine::translate((-bounds.x0, -bounds.y0));

    let Some(mut raster) = RasterDevice::new(width, height, buffer_from_device, None) else {
        return Ok(());
    };
    raster.set_clip(&context.get().clip);
    draw(&mut raster);

    let pixmap = raster.into_pixmap();
    let mut rgba = unpremultiplied_rgba(&pixmap);
    apply_alpha_and_mask(&mut rgba, width, height, bounds, 1.0, Some(&mask));

    let result = TransparencyGroupResult {
        pixels: GroupPixels::Rgba {
            data: rgba,
            width,
            height,
        },
        placement: bounds,
    };
    emit_buffer(context, device, &result);

    Ok(())
}
