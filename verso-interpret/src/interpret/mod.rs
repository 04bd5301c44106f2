//! The operator dispatcher.

use std::sync::Arc;

use kurbo::{Affine, Point, Shape};
use smallvec::smallvec;
use log::warn;

use crate::color::ColorSpace;
use crate::compositor;
use crate::context::Context;
use crate::device::Device;
use crate::error::{Error, InterpreterWarning, StructuralError, WarningSinkFn};
use crate::font::{NoOutlines, OutlineProvider};
use crate::interpret::path::{
    append_rectangle, end_path, fill_path, fill_stroke_path, stroke_path,
};
use crate::interpret::state::{convert_line_cap, convert_line_join, handle_gs};
use crate::interpret::text::TextRenderingMode;
use crate::ops::{Decoded, Op, RawOperation, TextItem};
use crate::paint::{FillProps, FillRule, Paint, PaintKind};
use crate::resource::{ResourceResolver, ResourceResult, Shading, XObject};
use crate::x_object::{draw_form_xobject, draw_image_xobject};

pub(crate) mod path;
pub(crate) mod state;
pub(crate) mod text;

/// Settings that apply to one interpretation run.
#[derive(Clone)]
pub struct InterpreterSettings {
    /// Supplies glyph outlines for resolved fonts.
    pub outline_provider: Arc<dyn OutlineProvider + Send + Sync>,
    /// Receives warnings about degraded output.
    pub warning_sink: WarningSinkFn,
    /// Disable antialiasing on large rectangular fills, which are
    /// typically slices of a piecewise gradient and would otherwise show
    /// seams. Purely a quality hint.
    pub gradient_seam_workaround: bool,
    /// Resolution multiplier for offscreen compositing buffers.
    pub raster_scale: f32,
}

impl Default for InterpreterSettings {
    fn default() -> Self {
        Self {
            outline_provider: Arc::new(NoOutlines),
            warning_sink: Arc::new(|_| {}),
            gradient_seam_workaround: true,
            raster_scale: 1.0,
        }
    }
}

/// Unwrap a resource lookup, distinguishing "not there" (degrade with a
/// warning) from "resolution broke" (fail the page).
fn resolve<T>(what: &str, name: &str, result: ResourceResult<T>) -> Result<Option<T>, Error> {
    match result {
        Ok(Some(value)) => Ok(Some(value)),
        Ok(None) => {
            warn!("missing {what} {name}");
            Ok(None)
        }
        Err(err) => Err(err.into()),
    }
}

/// Interpret a decoded content stream against the given resources,
/// rendering into the device.
///
/// The state stack is balanced on exit; a stream that restores more
/// than it saved fails with a [`StructuralError`].
pub fn interpret(
    content: &[RawOperation],
    resources: &dyn ResourceResolver,
    context: &mut Context,
    device: &mut impl Device,
) -> Result<(), Error> {
    let baseline = context.num_states();
    context.save_state();

    let result = interpret_ops(content, resources, context, device, baseline + 1);

    while context.num_states() > baseline {
        let _ = context.restore_state();
    }

    result
}

fn interpret_ops(
    content: &[RawOperation],
    resources: &dyn ResourceResolver,
    context: &mut Context,
    device: &mut impl Device,
    floor: usize,
) -> Result<(), Error> {
    for raw in content {
        let op = match Op::decode(raw) {
            Decoded::Op(op) => op,
            Decoded::Unknown => {
                context.warn(InterpreterWarning::UnknownOperator(
                    raw.operator.as_str().into(),
                ));
                continue;
            }
            Decoded::Malformed => {
                context.warn(InterpreterWarning::MalformedOperands(
                    raw.operator.as_str().into(),
                ));
                continue;
            }
        };

        match op {
            Op::SaveState => context.save_state(),
            Op::RestoreState => {
                if context.num_states() <= floor {
                    return Err(StructuralError::UnbalancedRestore.into());
                }
                context.restore_state()?;
            }
            Op::Transform(t) => context.pre_concat_transform(t),
            Op::LineWidth(w) => context.get_mut().stroke_props.line_width = w,
            Op::LineCap(c) => context.get_mut().stroke_props.line_cap = convert_line_cap(c),
            Op::LineJoin(j) => context.get_mut().stroke_props.line_join = convert_line_join(j),
            Op::MiterLimit(m) => context.get_mut().stroke_props.miter_limit = m,
            Op::DashPattern(array, phase) => {
                let props = &mut context.get_mut().stroke_props;
                props.dash_array = array;
                props.dash_offset = phase;
            }
            Op::RenderingIntent | Op::Flatness => {
                // Ignored.
            }
            Op::SetGraphicsState(name) => {
                if let Some(gs) = resolve("graphics state", &name, resources.ext_g_state(&name))? {
                    handle_gs(&gs, context)?;
                }
            }

            Op::MoveTo(p) => {
                context.set_last_point(p);
                context.set_sub_path_start(p);
                context.path_mut().move_to(p);
            }
            Op::LineTo(p) => {
                if !context.path().elements().is_empty() {
                    let mut p = p;
                    let last = context.last_point();
                    context.set_last_point(p);
                    if last == p {
                        // A small delta so zero-length lines can still
                        // carry a round cap.
                        p.x += 0.0001;
                    }
                    context.path_mut().line_to(p);
                }
            }
            Op::CubicTo(p1, p2, p3) => {
                if !context.path().elements().is_empty() {
                    context.set_last_point(p3);
                    context.path_mut().curve_to(p1, p2, p3);
                }
            }
            Op::CubicStartTo(p2, p3) => {
                if !context.path().elements().is_empty() {
                    let p1 = context.last_point();
                    context.set_last_point(p3);
                    context.path_mut().curve_to(p1, p2, p3);
                }
            }
            Op::CubicEndTo(p2, p3) => {
                if !context.path().elements().is_empty() {
                    context.set_last_point(p3);
                    context.path_mut().curve_to(p2, p3, p3);
                }
            }
            Op::ClosePath => {
                context.path_mut().close_path();
                let start = context.sub_path_start();
                context.set_last_point(start);
            }
            Op::RectPath(x, y, w, h) => {
                append_rectangle(context.path_mut(), x, y, w, h);
                let p = Point::new(x, y);
                context.set_last_point(p);
                context.set_sub_path_start(p);
            }

            Op::StrokePath => stroke_path(context, device)?,
            Op::CloseAndStrokePath => {
                context.path_mut().close_path();
                stroke_path(context, device)?;
            }
            Op::FillNonZero | Op::FillNonZeroCompatibility => {
                fill_path(context, device, FillRule::NonZero)?;
            }
            Op::FillEvenOdd => fill_path(context, device, FillRule::EvenOdd)?,
            Op::FillAndStrokeNonZero => fill_stroke_path(context, device, FillRule::NonZero)?,
            Op::FillAndStrokeEvenOdd => fill_stroke_path(context, device, FillRule::EvenOdd)?,
            Op::CloseFillAndStrokeNonZero => {
                context.path_mut().close_path();
                fill_stroke_path(context, device, FillRule::NonZero)?;
            }
            Op::CloseFillAndStrokeEvenOdd => {
                context.path_mut().close_path();
                fill_stroke_path(context, device, FillRule::EvenOdd)?;
            }
            Op::EndPath => end_path(context)?,
            Op::ClipNonZero => context.set_pending_clip(Some(FillRule::NonZero)),
            Op::ClipEvenOdd => context.set_pending_clip(Some(FillRule::EvenOdd)),

            Op::ColorSpaceStroke(name) => {
                let cs = lookup_color_space(resources, &name)?;
                context.get_mut().stroke_color = cs.initial_color();
                if !cs.is_pattern() {
                    context.get_mut().stroke_pattern = None;
                }
                context.get_mut().stroke_cs = cs;
            }
            Op::ColorSpaceNonStroke(name) => {
                let cs = lookup_color_space(resources, &name)?;
                context.get_mut().fill_color = cs.initial_color();
                if !cs.is_pattern() {
                    context.get_mut().fill_pattern = None;
                }
                context.get_mut().fill_cs = cs;
            }
            Op::StrokeColor(c) => context.get_mut().stroke_color = c,
            Op::NonStrokeColor(c) => context.get_mut().fill_color = c,
            Op::StrokeColorNamed(c, pattern) => {
                context.get_mut().stroke_color = c;
                if let Some(name) = pattern {
                    context.get_mut().stroke_pattern =
                        resolve("pattern", &name, resources.pattern(&name))?;
                }
            }
            Op::NonStrokeColorNamed(c, pattern) => {
                context.get_mut().fill_color = c;
                if let Some(name) = pattern {
                    context.get_mut().fill_pattern =
                        resolve("pattern", &name, resources.pattern(&name))?;
                }
            }
            Op::StrokeGray(g) => {
                context.get_mut().stroke_cs = ColorSpace::device_gray();
                context.get_mut().stroke_color = smallvec![g];
            }
            Op::NonStrokeGray(g) => {
                context.get_mut().fill_cs = ColorSpace::device_gray();
                context.get_mut().fill_color = smallvec![g];
            }
            Op::StrokeRgb(r, g, b) => {
                context.get_mut().stroke_cs = ColorSpace::device_rgb();
                context.get_mut().stroke_color = smallvec![r, g, b];
            }
            Op::NonStrokeRgb(r, g, b) => {
                context.get_mut().fill_cs = ColorSpace::device_rgb();
                context.get_mut().fill_color = smallvec![r, g, b];
            }
            Op::StrokeCmyk(c, m, y, k) => {
                context.get_mut().stroke_cs = ColorSpace::device_cmyk();
                context.get_mut().stroke_color = smallvec![c, m, y, k];
            }
            Op::NonStrokeCmyk(c, m, y, k) => {
                context.get_mut().fill_cs = ColorSpace::device_cmyk();
                context.get_mut().fill_color = smallvec![c, m, y, k];
            }

            Op::Shading(name) => {
                match resolve("shading", &name, resources.shading(&name))? {
                    Some(shading) => shading_fill(context, device, shading)?,
                    None => {
                        context.warn(InterpreterWarning::MissingShading(name.as_str().into()));
                    }
                }
            }
            Op::XObject(name) => {
                match resolve("xobject", &name, resources.x_object(&name))? {
                    Some(XObject::Form(form)) => draw_form_xobject(&form, context, device)?,
                    Some(XObject::Image(image)) => draw_image_xobject(&image, context, device)?,
                    None => {}
                }
            }
            Op::InlineImage(image) => draw_image_xobject(&image, context, device)?,
            Op::InlineImagePrelude => {}

            Op::CharSpacing(c) => context.get_mut().text_state.char_space = c,
            Op::WordSpacing(w) => context.get_mut().text_state.word_space = w,
            Op::HorizontalScaling(h) => context.get_mut().text_state.horizontal_scaling = h,
            Op::TextLeading(l) => context.get_mut().text_state.leading = l,
            Op::TextFont(name, size) => {
                let font = resolve("font", &name, resources.font(&name))?;
                context.get_mut().text_state.font = font;
                context.get_mut().text_state.font_size = size;
            }
            Op::TextRenderingMode(mode) => {
                let mode = TextRenderingMode::from_i32(mode).unwrap_or_else(|| {
                    warn!("unknown text rendering mode {mode}");

                    TextRenderingMode::Fill
                });
                context.get_mut().text_state.render_mode = mode;
            }
            Op::TextRise(r) => context.get_mut().text_state.rise = r,
            Op::BeginText => {
                context.get_mut().text_state.text_matrix = Affine::IDENTITY;
                context.get_mut().text_state.text_line_matrix = Affine::IDENTITY;
            }
            Op::EndText => text::end_text(context),
            Op::NextLine(tx, ty) => text::next_line(context, tx, ty),
            Op::NextLineAndSetLeading(tx, ty) => {
                context.get_mut().text_state.leading = -ty as f32;
                text::next_line(context, tx, ty);
            }
            Op::SetTextMatrix(m) => {
                context.get_mut().text_state.text_line_matrix = m;
                context.get_mut().text_state.text_matrix = m;
            }
            Op::NextLineUsingLeading => {
                let leading = context.get().text_state.leading;
                text::next_line(context, 0.0, -leading as f64);
            }
            Op::ShowText(s) => text::show_text_string(context, device, &s)?,
            Op::NextLineAndShowText(s) => {
                let leading = context.get().text_state.leading;
                text::next_line(context, 0.0, -leading as f64);
                text::show_text_string(context, device, &s)?;
            }
            Op::ShowTextWithParameters(word_space, char_space, s) => {
                context.get_mut().text_state.word_space = word_space;
                context.get_mut().text_state.char_space = char_space;
                let leading = context.get().text_state.leading;
                text::next_line(context, 0.0, -leading as f64);
                text::show_text_string(context, device, &s)?;
            }
            Op::ShowTexts(items) => {
                for item in items {
                    match item {
                        TextItem::Adjust(a) => {
                            context.get_mut().text_state.apply_adjustment(a);
                        }
                        TextItem::Show(s) => text::show_text_string(context, device, &s)?,
                    }
                }
            }

            Op::MarkedContent | Op::Compatibility | Op::GlyphMetrics => {}
        }
    }

    Ok(())
}

fn lookup_color_space(
    resources: &dyn ResourceResolver,
    name: &str,
) -> Result<ColorSpace, Error> {
    if let Some(named) = ColorSpace::from_name(name) {
        return Ok(named);
    }

    Ok(
        resolve("color space", name, resources.color_space(name))?
            .unwrap_or_else(ColorSpace::device_gray),
    )
}

/// Fill the current clip region with a shading (`sh`).
///
/// The painted region is the clip bound intersected with the shading's
/// own bounding box, both in device space.
fn shading_fill(
    context: &mut Context,
    device: &mut impl Device,
    shading: Arc<Shading>,
) -> Result<(), Error> {
    let ctm = context.get().ctm;
    let clip_bbox = context.get().clip.bbox();

    let region = match shading.bbox {
        Some(bbox) => clip_bbox.intersect((ctm * bbox.to_path(0.1)).bounding_box()),
        None => clip_bbox,
    };

    if region.width() <= 0.0 || region.height() <= 0.0 {
        return Ok(());
    }

    let paint = Paint {
        paint_transform: ctm,
        kind: PaintKind::Shading(shading),
    };
    let props = FillProps::default();
    let path = region.to_path(0.1);

    if context.get().soft_mask.is_some() {
        return compositor::masked_fill(context, device, &path, Affine::IDENTITY, &paint, &props);
    }

    context.sync_clip(device);
    device.fill_path(&path, Affine::IDENTITY, &paint, &props);

    Ok(())
}
