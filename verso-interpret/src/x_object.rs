//! Form invocation and image placement.

use kurbo::{Affine, BezPath};

use crate::compositor;
use crate::context::Context;
use crate::device::{Device, LumaData, RgbaData};
use crate::error::Error;
use crate::interpret;
use crate::interpret::path::{append_rectangle, get_paint};
use crate::paint::FillRule;
use crate::resource::{FormXObject, ImageData, ImageXObject};

/// Draw a form XObject: recurse into its content stream with the form
/// matrix applied and the content clipped to the form's bounding box.
///
/// Forms carrying transparency-group attributes are composited through
/// an offscreen buffer when the surrounding state actually calls for
/// compositing (a soft mask or non-unit alpha); otherwise their content
/// draws inline and stays vector.
pub(crate) fn draw_form_xobject(
    form: &FormXObject,
    context: &mut Context,
    device: &mut impl Device,
) -> Result<(), Error> {
    context.save_state();
    context.pre_concat_transform(form.matrix);
    context.push_root_transform();

    let bbox_path = {
        let mut p = BezPath::new();
        append_rectangle(
            &mut p,
            form.bbox.x0,
            form.bbox.y0,
            form.bbox.width(),
            form.bbox.height(),
        );
        context.get().ctm * p
    };
    context.intersect_clip(bbox_path, FillRule::NonZero);

    let needs_compositing = form.group.is_some()
        && (context.get().soft_mask.is_some() || context.get().fill_alpha < 1.0);

    let result = if needs_compositing {
        compositor::draw_transparency_group(form, context, device)
    } else {
        interpret::interpret(&form.content, &*form.resources, context, device)
    };

    context.pop_root_transform();
    // The state (including the bbox clip) is restored on success and
    // failure alike.
    let _ = context.restore_state();

    result
}

/// Draw an image XObject at the unit square of the current space.
pub(crate) fn draw_image_xobject(
    image: &ImageXObject,
    context: &mut Context,
    device: &mut impl Device,
) -> Result<(), Error> {
    if image.width == 0 || image.height == 0 {
        return Ok(());
    }

    context.save_state();

    // Map image pixel space (top-left origin) onto the unit square.
    let pixel_to_unit = Affine::new([
        1.0 / image.width as f64,
        0.0,
        0.0,
        -1.0 / image.height as f64,
        0.0,
        1.0,
    ]);
    context.pre_concat_transform(pixel_to_unit);
    let transform = context.get().ctm;

    let result = draw_image_impl(image, context, device, transform);

    let _ = context.restore_state();

    result
}

fn draw_image_impl(
    image: &ImageXObject,
    context: &mut Context,
    device: &mut impl Device,
    transform: Affine,
) -> Result<(), Error> {
    if context.get().soft_mask.is_some() {
        return compositor::masked_image(image, context, device, transform);
    }

    context.sync_clip(device);

    match &image.data {
        ImageData::Stencil { coverage } => {
            let paint = get_paint(context, false)?;
            let stencil = LumaData {
                data: coverage.clone(),
                width: image.width,
                height: image.height,
                interpolate: image.interpolate,
            };
            device.draw_stencil(&stencil, transform, &paint);
        }
        ImageData::Rgb { .. } => {
            let rgba = RgbaData {
                data: image.to_rgba8(),
                width: image.width,
                height: image.height,
                interpolate: image.interpolate,
            };
            device.draw_image(&rgba, transform);
        }
    }

    Ok(())
}
