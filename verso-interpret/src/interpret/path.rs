use kurbo::{Affine, BezPath, PathEl, Shape};

use crate::color::Color;
use crate::compositor;
use crate::context::Context;
use crate::device::Device;
use crate::error::{Error, InterpreterWarning, StructuralError};
use crate::interpret::state::State;
use crate::paint::{FillProps, FillRule, Paint, PaintKind, StrokeProps};
use crate::resource::Pattern;
use crate::util::uniform_scale;

/// The minimum stroke width in device units. Thinner strokes would
/// disappear entirely at common raster resolutions.
const MIN_LINE_WIDTH: f32 = 0.25;

/// The minimum length of a non-zero dash entry in device units.
const MIN_DASH_LENGTH: f32 = 0.035;

pub(crate) fn fill_path(
    context: &mut Context,
    device: &mut impl Device,
    rule: FillRule,
) -> Result<(), Error> {
    if context.path().elements().is_empty() {
        return Err(StructuralError::PaintWithoutPath.into());
    }

    fill_path_impl(context, device, rule, None)?;
    finish_path(context);

    Ok(())
}

pub(crate) fn stroke_path(context: &mut Context, device: &mut impl Device) -> Result<(), Error> {
    if context.path().elements().is_empty() {
        return Err(StructuralError::PaintWithoutPath.into());
    }

    stroke_path_impl(context, device, None)?;
    finish_path(context);

    Ok(())
}

pub(crate) fn fill_stroke_path(
    context: &mut Context,
    device: &mut impl Device,
    rule: FillRule,
) -> Result<(), Error> {
    if context.path().elements().is_empty() {
        return Err(StructuralError::PaintWithoutPath.into());
    }

    // Filling must never disturb the geometry the stroke sees, so both
    // passes read the builder and only `finish_path` clears it.
    fill_path_impl(context, device, rule, None)?;
    stroke_path_impl(context, device, None)?;
    finish_path(context);

    Ok(())
}

/// Apply a pending clip and reset the path builder.
pub(crate) fn end_path(context: &mut Context) -> Result<(), Error> {
    if let Some(rule) = context.pending_clip() {
        if context.path().elements().is_empty() {
            return Err(StructuralError::PaintWithoutPath.into());
        }

        let clip_path = context.get().ctm * context.path().clone();
        context.intersect_clip(clip_path, rule);
        context.set_pending_clip(None);
    }

    context.path_mut().truncate(0);

    Ok(())
}

fn finish_path(context: &mut Context) {
    // A clip that was pending across the paint takes effect now that
    // the path is fully described.
    if let Some(rule) = context.pending_clip() {
        let clip_path = context.get().ctm * context.path().clone();
        context.intersect_clip(clip_path, rule);
        context.set_pending_clip(None);
    }

    context.path_mut().truncate(0);
}

pub(crate) fn fill_path_impl(
    context: &mut Context,
    device: &mut impl Device,
    rule: FillRule,
    path: Option<&BezPath>,
) -> Result<(), Error> {
    let transform = context.get().ctm;
    let paint = get_paint(context, false)?;
    let path = path.unwrap_or(context.path()).clone();

    let props = FillProps {
        fill_rule: rule,
        anti_alias: !disable_anti_alias(context, &path, transform),
    };

    if context.get().soft_mask.is_some() {
        return compositor::masked_fill(context, device, &path, transform, &paint, &props);
    }

    context.sync_clip(device);

    match shading_constraint(context, &paint, &path, transform) {
        ShadingConstraint::Unconstrained => {
            device.fill_path(&path, transform, &paint, &props);
        }
        ShadingConstraint::Clipped(region) => {
            // The region is already in device space.
            device.fill_path(&region, Affine::IDENTITY, &paint, &props);
        }
        ShadingConstraint::Empty => {}
    }

    Ok(())
}

pub(crate) fn stroke_path_impl(
    context: &mut Context,
    device: &mut impl Device,
    path: Option<&BezPath>,
) -> Result<(), Error> {
    let transform = context.get().ctm;
    let paint = get_paint(context, true)?;
    let props = device_stroke_props(context.get());
    let path = path.unwrap_or(context.path()).clone();

    if context.get().soft_mask.is_some() {
        return compositor::masked_stroke(context, device, &path, transform, &paint, &props);
    }

    context.sync_clip(device);
    device.stroke_path(&path, transform, &paint, &props);

    Ok(())
}

/// The paint for the current fill or stroke.
///
/// Tiling patterns are refused: an approximation would look plausible
/// and be wrong. A missing shading degrades to a fully transparent fill.
pub(crate) fn get_paint(context: &mut Context, is_stroke: bool) -> Result<Paint, Error> {
    let data = context.get().paint_data(is_stroke);

    if data.color_space.is_pattern() {
        match data.pattern.as_deref() {
            Some(Pattern::Shading(sp)) => Ok(Paint {
                paint_transform: context.root_transform() * sp.matrix,
                kind: PaintKind::Shading(sp.shading.clone()),
            }),
            Some(Pattern::Tiling { paint_type }) => {
                Err(crate::error::UnsupportedFeature::TilingPattern(*paint_type).into())
            }
            None => {
                context.warn(InterpreterWarning::MissingShading("<pattern>".into()));
                Ok(Paint::solid(Color {
                    rgb: [0.0, 0.0, 0.0],
                    alpha: 0.0,
                }))
            }
        }
    } else {
        Ok(Paint::solid(Color::from_components(
            &data.color_space,
            &data.color,
            data.alpha,
        )))
    }
}

/// Stroke properties scaled into device units.
pub(crate) fn device_stroke_props(state: &State) -> StrokeProps {
    let scale = uniform_scale(&state.ctm);
    let props = &state.stroke_props;

    let line_width = (props.line_width * scale).max(MIN_LINE_WIDTH);

    let mut dash_array = props.dash_array.clone();
    let mut solid = dash_array.is_empty();
    let mut all_zero = true;
    for entry in dash_array.iter_mut() {
        *entry *= scale;
        if *entry != 0.0 {
            *entry = entry.max(MIN_DASH_LENGTH);
            all_zero = false;
        }
        if !entry.is_finite() {
            solid = true;
        }
    }
    let dash_offset = props.dash_offset * scale;
    if !dash_offset.is_finite() || all_zero {
        solid = true;
    }

    if solid {
        dash_array.clear();
    }

    StrokeProps {
        line_width,
        line_cap: props.line_cap,
        line_join: props.line_join,
        miter_limit: props.miter_limit,
        dash_array,
        dash_offset: if solid { 0.0 } else { dash_offset },
    }
}

enum ShadingConstraint {
    Unconstrained,
    Clipped(BezPath),
    Empty,
}

/// Bound a shading fill by the shading's own bounding box and the
/// current clip, so an oversized path cannot bleed the paint across the
/// page.
fn shading_constraint(
    context: &Context,
    paint: &Paint,
    path: &BezPath,
    transform: Affine,
) -> ShadingConstraint {
    let PaintKind::Shading(shading) = &paint.kind else {
        return ShadingConstraint::Unconstrained;
    };
    let Some(bbox) = shading.bbox else {
        return ShadingConstraint::Unconstrained;
    };

    let device_bbox = (paint.paint_transform * bbox.to_path(0.1)).bounding_box();
    let path_bounds = (transform * path.clone()).bounding_box();
    let clip_bounds = context.get().clip.bbox();

    let region = device_bbox.intersect(path_bounds).intersect(clip_bounds);
    if region.width() <= 0.0 || region.height() <= 0.0 {
        return ShadingConstraint::Empty;
    }

    if device_bbox.contains_rect(path_bounds) {
        ShadingConstraint::Unconstrained
    } else {
        ShadingConstraint::Clipped(region.to_path(0.1))
    }
}

/// Whether antialiasing should be disabled for this fill.
///
/// Large rectangular fills are used to simulate piecewise gradients;
/// antialiasing them produces visible seams between the slices. Small
/// fills are left alone, since those are usually strokes drawn as fills.
fn disable_anti_alias(context: &Context, path: &BezPath, transform: Affine) -> bool {
    if !context.settings.gradient_seam_workaround {
        return false;
    }

    let device_path = transform * path.clone();
    let bounds = device_path.bounding_box();

    is_rectangular(&device_path) && bounds.width() > 1.0 && bounds.height() > 1.0
}

/// Whether the path is a single four-point contour of axis-aligned (or
/// nearly axis-aligned) line segments.
pub(crate) fn is_rectangular(path: &BezPath) -> bool {
    let mut count = 0;
    let mut xs = [0i64; 4];
    let mut ys = [0i64; 4];

    for el in path.elements() {
        match el {
            PathEl::MoveTo(p) => {
                if count != 0 {
                    return false;
                }
                xs[count] = p.x.floor() as i64;
                ys[count] = p.y.floor() as i64;
                count += 1;
            }
            PathEl::LineTo(p) => {
                if count >= 4 {
                    return false;
                }
                xs[count] = p.x.floor() as i64;
                ys[count] = p.y.floor() as i64;
                count += 1;
            }
            PathEl::QuadTo(..) | PathEl::CurveTo(..) => return false,
            PathEl::ClosePath => {}
        }
    }

    count == 4 && (xs[0] == xs[1] || xs[0] == xs[2] || ys[0] == ys[1] || ys[0] == ys[3])
}

/// Append a rectangle as four explicit corners plus a close.
///
/// Spelled out as line segments so the winding direction follows the
/// corners exactly; even-odd fills rely on it to punch holes.
pub(crate) fn append_rectangle(path: &mut BezPath, x: f64, y: f64, w: f64, h: f64) {
    path.move_to((x, y));
    path.line_to((x + w, y));
    path.line_to((x + w, y + h));
    path.line_to((x, y + h));
    path.close_path();
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::{Cap, Join, Rect};

    fn rect_path() -> BezPath {
        let mut p = BezPath::new();
        append_rectangle(&mut p, 10.0, 10.0, 100.0, 50.0);
        p
    }

    #[test]
    fn four_point_axis_aligned_path_is_rectangular() {
        assert!(is_rectangular(&rect_path()));
    }

    #[test]
    fn cubic_segments_are_never_rectangular() {
        let mut p = BezPath::new();
        p.move_to((0.0, 0.0));
        p.line_to((10.0, 0.0));
        p.curve_to((12.0, 2.0), (12.0, 8.0), (10.0, 10.0));
        p.line_to((0.0, 10.0));
        p.close_path();
        assert!(!is_rectangular(&p));
    }

    #[test]
    fn five_point_paths_are_not_rectangular() {
        let mut p = BezPath::new();
        p.move_to((0.0, 0.0));
        p.line_to((10.0, 0.0));
        p.line_to((10.0, 10.0));
        p.line_to((0.0, 10.0));
        p.line_to((0.0, 0.0));
        p.close_path();
        assert!(!is_rectangular(&p));
    }

    #[test]
    fn rectangle_winding_follows_the_corners() {
        let p = rect_path();
        let els = p.elements();
        assert!(matches!(els[0], PathEl::MoveTo(_)));
        assert_eq!(
            els.iter()
                .filter(|e| matches!(e, PathEl::LineTo(_)))
                .count(),
            3
        );
        assert!(matches!(els.last(), Some(PathEl::ClosePath)));
    }

    fn state_with(width: f32, dash: &[f32], scale: f64) -> State {
        use crate::clip::ClipRegion;
        let mut state = State::new(
            Affine::scale(scale),
            ClipRegion::page(Rect::new(0.0, 0.0, 612.0, 792.0)),
        );
        state.stroke_props = StrokeProps {
            line_width: width,
            line_cap: Cap::Butt,
            line_join: Join::Miter,
            miter_limit: 10.0,
            dash_array: dash.iter().copied().collect(),
            dash_offset: 0.0,
        };
        state
    }

    #[test]
    fn line_width_scales_with_the_transform() {
        let props = device_stroke_props(&state_with(2.0, &[], 3.0));
        assert_eq!(props.line_width, 6.0);
    }

    #[test]
    fn degenerate_line_width_is_clamped_visible() {
        let props = device_stroke_props(&state_with(0.0, &[], 1.0));
        assert_eq!(props.line_width, MIN_LINE_WIDTH);
    }

    #[test]
    fn dash_lengths_scale_and_clamp() {
        let props = device_stroke_props(&state_with(1.0, &[4.0, 0.001], 2.0));
        assert_eq!(props.dash_array.as_slice(), &[8.0, MIN_DASH_LENGTH]);
    }

    #[test]
    fn all_zero_dash_is_solid() {
        let props = device_stroke_props(&state_with(1.0, &[0.0, 0.0], 1.0));
        assert!(props.dash_array.is_empty());
    }

    #[test]
    fn non_finite_dash_is_solid() {
        let props = device_stroke_props(&state_with(1.0, &[f32::NAN, 3.0], 1.0));
        assert!(props.dash_array.is_empty());
    }
}
